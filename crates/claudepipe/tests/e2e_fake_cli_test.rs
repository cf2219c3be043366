//! End-to-end: a real subprocess speaking the protocol.
//!
//! A small shell script stands in for the CLI: it answers the initialize
//! handshake by echoing the request id back, then emits a short conversation
//! and exits.

#![cfg(unix)]

use claudepipe::{AgentOptions, Client, Message};
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::PathBuf;
use tempfile::TempDir;

const FAKE_CLI: &str = r#"#!/bin/sh
# Answer the initialize control request, then run one scripted turn.
read line
rid=$(printf '%s' "$line" | sed -n 's/.*"request_id":"\([^"]*\)".*/\1/p')
printf '{"type":"control_response","response":{"subtype":"success","request_id":"%s","response":{}}}\n' "$rid"
printf '{"type":"system","subtype":"init","session_id":"s1"}\n'
printf '{"type":"assistant","message":{"content":[{"type":"text","text":"hello from the fake cli"}]}}\n'
printf '{"type":"result","subtype":"success","duration_ms":5,"duration_api_ms":3,"is_error":false,"num_turns":1,"session_id":"s1"}\n'
"#;

fn install_fake_cli(dir: &TempDir) -> PathBuf {
    let path = dir.path().join("fake-claude");
    fs::write(&path, FAKE_CLI).unwrap();
    fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
    path
}

#[tokio::test]
async fn streaming_session_against_a_real_process() {
    let dir = TempDir::new().unwrap();
    let cli = install_fake_cli(&dir);

    let mut client = Client::new(AgentOptions::new().with_cli_path(cli));
    // Streaming connect runs the initialize handshake against the script.
    client.connect(None).await.unwrap();

    let messages = client.receive_response().await.unwrap();
    let types: Vec<_> = messages.iter().map(Message::message_type).collect();
    assert_eq!(types, ["system", "assistant", "result"]);

    match &messages[2] {
        Message::Result(result) => {
            assert_eq!(result.session_id, "s1");
            assert!(!result.is_error);
        }
        other => panic!("expected result, got {other:?}"),
    }

    // Script exits 0 after the result: clean end of stream.
    assert!(client.next_message().await.unwrap().is_none());
    client.close().await;
}
