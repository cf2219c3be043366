//! Transport abstraction

use crate::error::Result;
use async_trait::async_trait;
use serde_json::Value;

/// A connected frame transport to the agent process.
///
/// Implementations are created already connected. The frame sequence is
/// forward-only with a single consumer: exactly one task may call
/// [`next_frame`](Transport::next_frame), and once it returns `Ok(None)` or
/// an error the sequence has ended permanently.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Serialize `frame` as one JSON line and enqueue it on the process's
    /// input. A no-op once input has been closed.
    async fn write(&self, frame: &Value) -> Result<()>;

    /// Pull the next decoded frame.
    ///
    /// `Ok(None)` is a clean, permanent end of stream. A framing or
    /// process-exit error also ends the sequence; process-exit is reported
    /// only after every buffered frame has been yielded.
    async fn next_frame(&self) -> Result<Option<Value>>;

    /// Close the process's input without terminating the process. Idempotent;
    /// later writes become no-ops.
    async fn close_input(&self);

    /// Force-terminate the process and release both stream handles.
    /// Idempotent; never fails on an already-closed transport.
    async fn close(&self);
}
