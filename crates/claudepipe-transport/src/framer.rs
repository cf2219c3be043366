//! Newline-delimited JSON framing
//!
//! The CLI emits one JSON object per line with no length prefix; `\n` is the
//! only record separator. A record may span any number of read chunks and
//! must never be decoded before its newline arrives. String fields may
//! contain escaped `\n` sequences; a literal newline never appears inside a
//! record.

use crate::error::{Result, TransportError};
use bytes::{Buf, BytesMut};
use serde_json::Value;

/// Default cap on buffered bytes awaiting a newline: 1 MiB.
pub const DEFAULT_MAX_BUFFER_SIZE: usize = 1024 * 1024;

/// Splits a raw byte stream into decoded JSON frames.
///
/// Feed chunks as they arrive, then pull frames with
/// [`next_frame`](LineFramer::next_frame); call [`flush`](LineFramer::flush)
/// once at end-of-stream to decode a final record with no trailing newline.
/// The set and order of decoded frames is independent of how the stream was
/// chunked.
#[derive(Debug)]
pub struct LineFramer {
    buf: BytesMut,
    max_buffer_size: usize,
}

impl LineFramer {
    /// Create a framer with the given buffer cap.
    pub fn new(max_buffer_size: usize) -> Self {
        Self {
            buf: BytesMut::new(),
            max_buffer_size,
        }
    }

    /// Append raw bytes from the stream.
    pub fn feed(&mut self, chunk: &[u8]) {
        self.buf.extend_from_slice(chunk);
    }

    /// Decode the next complete line, if one is buffered.
    ///
    /// Empty lines are skipped. A non-empty line that does not decode to a
    /// JSON object is a fatal [`TransportError::JsonDecode`] carrying the
    /// line text. When no newline is buffered and the buffer is over the cap,
    /// fails with [`TransportError::BufferOverflow`] — a newline anywhere in
    /// the buffer makes the cap irrelevant, since a complete frame is about
    /// to come out.
    pub fn next_frame(&mut self) -> Result<Option<Value>> {
        while let Some(pos) = self.buf.iter().position(|&b| b == b'\n') {
            let line = self.buf.split_to(pos + 1);
            let trimmed = line[..pos].trim_ascii();
            if trimmed.is_empty() {
                continue;
            }
            return decode_line(trimmed).map(Some);
        }

        if self.buf.len() > self.max_buffer_size {
            self.buf.clear();
            return Err(TransportError::BufferOverflow {
                limit: self.max_buffer_size,
            });
        }

        Ok(None)
    }

    /// Decode the residual buffer as one final record at end-of-stream.
    ///
    /// Whitespace-only residue yields `None`; anything else must decode under
    /// the same rule as a complete line.
    pub fn flush(&mut self) -> Result<Option<Value>> {
        let rest = self.buf.split();
        let trimmed = rest.trim_ascii();
        if trimmed.is_empty() {
            return Ok(None);
        }
        decode_line(trimmed).map(Some)
    }

    /// Bytes currently buffered awaiting a newline.
    pub fn buffered(&self) -> usize {
        self.buf.remaining()
    }
}

impl Default for LineFramer {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_BUFFER_SIZE)
    }
}

fn decode_line(line: &[u8]) -> Result<Value> {
    let decoded: Value = serde_json::from_slice(line).map_err(|source| {
        TransportError::JsonDecode {
            line: String::from_utf8_lossy(line).into_owned(),
            source: Some(source),
        }
    })?;
    if !decoded.is_object() {
        return Err(TransportError::JsonDecode {
            line: String::from_utf8_lossy(line).into_owned(),
            source: None,
        });
    }
    Ok(decoded)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use serde_json::json;

    fn drain(framer: &mut LineFramer) -> Vec<Value> {
        let mut out = Vec::new();
        while let Some(frame) = framer.next_frame().unwrap() {
            out.push(frame);
        }
        out
    }

    #[test]
    fn splits_multiple_objects() {
        let mut framer = LineFramer::default();
        framer.feed(b"{\"type\":\"message\",\"id\":\"m1\"}\n{\"type\":\"result\",\"id\":\"r1\"}\n");
        let frames = drain(&mut framer);
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0]["type"], "message");
        assert_eq!(frames[1]["type"], "result");
    }

    #[test]
    fn tolerates_consecutive_newlines() {
        let mut framer = LineFramer::default();
        framer.feed(b"{\"a\":1}\n\n\n{\"b\":2}\n");
        assert_eq!(drain(&mut framer).len(), 2);
    }

    #[test]
    fn preserves_embedded_escaped_newlines() {
        let frame = json!({"type": "message", "content": "Line 1\nLine 2\nLine 3"});
        let mut framer = LineFramer::default();
        framer.feed(serde_json::to_string(&frame).unwrap().as_bytes());
        framer.feed(b"\n");
        let frames = drain(&mut framer);
        assert_eq!(frames[0]["content"], "Line 1\nLine 2\nLine 3");
    }

    #[rstest]
    #[case(1)]
    #[case(7)]
    #[case(100)]
    #[case(300)]
    fn chunk_boundaries_do_not_matter(#[case] chunk_size: usize) {
        let stream = format!(
            "{}\n{}\n{}",
            json!({"type": "assistant", "text": "x".repeat(120)}),
            json!({"type": "user", "n": 1}),
            json!({"type": "result", "tail": true}),
        );
        let bytes = stream.as_bytes();

        let mut whole = LineFramer::default();
        whole.feed(bytes);
        let mut expected = drain(&mut whole);
        expected.extend(whole.flush().unwrap());

        let mut chunked = LineFramer::default();
        let mut got = Vec::new();
        for chunk in bytes.chunks(chunk_size) {
            chunked.feed(chunk);
            got.extend(drain(&mut chunked));
        }
        got.extend(chunked.flush().unwrap());

        assert_eq!(got, expected);
    }

    #[test]
    fn flush_decodes_record_without_trailing_newline() {
        let mut framer = LineFramer::default();
        framer.feed(b"{\"type\":\"tail\"}");
        assert!(framer.next_frame().unwrap().is_none());
        let frame = framer.flush().unwrap().unwrap();
        assert_eq!(frame["type"], "tail");
        assert!(framer.flush().unwrap().is_none());
    }

    #[test]
    fn malformed_line_is_a_fatal_decode_error() {
        let mut framer = LineFramer::default();
        framer.feed(b"{not json}\n");
        match framer.next_frame() {
            Err(TransportError::JsonDecode { line, .. }) => assert_eq!(line, "{not json}"),
            other => panic!("expected decode error, got {other:?}"),
        }
    }

    #[test]
    fn scalar_line_is_a_decode_error() {
        let mut framer = LineFramer::default();
        framer.feed(b"42\n");
        assert!(matches!(
            framer.next_frame(),
            Err(TransportError::JsonDecode { .. })
        ));
    }

    #[test]
    fn overflow_without_newline() {
        let mut framer = LineFramer::new(64);
        framer.feed(&[b'x'; 65]);
        assert!(matches!(
            framer.next_frame(),
            Err(TransportError::BufferOverflow { limit: 64 })
        ));
    }

    #[test]
    fn no_overflow_when_a_newline_is_buffered() {
        let mut framer = LineFramer::new(16);
        let frame = json!({"data": "y".repeat(64)});
        let mut bytes = serde_json::to_vec(&frame).unwrap();
        bytes.push(b'\n');
        framer.feed(&bytes);
        let decoded = framer.next_frame().unwrap().unwrap();
        assert_eq!(decoded, frame);
    }

    #[test]
    fn under_limit_partial_line_just_waits() {
        let mut framer = LineFramer::new(1024);
        framer.feed(b"{\"partial\":");
        assert!(framer.next_frame().unwrap().is_none());
        framer.feed(b"true}\n");
        assert_eq!(framer.next_frame().unwrap().unwrap()["partial"], true);
    }
}
