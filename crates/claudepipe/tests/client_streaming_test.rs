//! Message routing and the inbound control dispatcher: elision and ordering,
//! permission checks, hook callbacks, MCP bridging, and input-close behavior.

mod common;

use claudepipe::{
    AgentError, AgentOptions, Client, HookMatcher, HookOutput, Message, PermissionResult,
    PermissionResultAllow, PermissionResultDeny, Prompt, SdkMcpServer, TransportError, tool,
};
use common::fake_transport::{FakeTransport, result_frame};
use serde_json::{Value, json};
use std::sync::Arc;

fn assistant_frame(text: &str) -> Value {
    json!({
        "type": "assistant",
        "message": {"content": [{"type": "text", "text": text}]},
    })
}

/// Connect a streaming client over an auto-responding fake transport.
async fn connected(options: AgentOptions) -> (Client, Arc<FakeTransport>) {
    let transport = FakeTransport::auto_responding();
    let mut client = Client::with_transport(options, transport.clone());
    client.connect(None).await.unwrap();
    (client, transport)
}

#[tokio::test]
async fn control_traffic_is_elided_and_order_preserved() {
    let (mut client, transport) = connected(AgentOptions::new()).await;

    transport.push_frame(assistant_frame("first"));
    transport.push_frame(json!({
        "type": "control_response",
        "response": {"subtype": "success", "request_id": "req_99_zz", "response": {}},
    }));
    transport.push_frame(json!({"type": "control_cancel_request", "request_id": "req_99_zz"}));
    transport.push_frame(assistant_frame("second"));
    transport.push_frame(result_frame());
    transport.end_stream();

    let messages = client.receive_response().await.unwrap();
    let types: Vec<_> = messages.iter().map(Message::message_type).collect();
    assert_eq!(types, ["assistant", "assistant", "result"]);

    match (&messages[0], &messages[1]) {
        (Message::Assistant(first), Message::Assistant(second)) => {
            assert_eq!(first.raw["message"]["content"][0]["text"], "first");
            assert_eq!(second.raw["message"]["content"][0]["text"], "second");
        }
        other => panic!("expected assistant messages, got {other:?}"),
    }

    assert!(client.next_message().await.unwrap().is_none());
}

#[tokio::test]
async fn unknown_frame_types_are_delivered_not_dropped() {
    let (mut client, transport) = connected(AgentOptions::new()).await;

    transport.push_frame(json!({"type": "telemetry", "events": 3}));
    transport.end_stream();

    match client.next_message().await.unwrap().unwrap() {
        Message::Unknown { message_type, raw } => {
            assert_eq!(message_type, "telemetry");
            assert_eq!(raw["events"], 3);
        }
        other => panic!("expected unknown message, got {other:?}"),
    }
}

#[tokio::test]
async fn transport_failure_ends_the_message_stream() {
    let (mut client, transport) = connected(AgentOptions::new()).await;

    transport.push_frame(assistant_frame("before the crash"));
    transport.push_error(TransportError::ProcessExit { code: 2 });

    assert!(client.next_message().await.unwrap().is_some());
    let err = client.next_message().await.unwrap_err();
    match err {
        AgentError::Transport(TransportError::ProcessExit { code }) => assert_eq!(code, 2),
        other => panic!("expected process exit, got {other:?}"),
    }
    // After the error the stream is over.
    assert!(client.next_message().await.unwrap().is_none());
}

#[tokio::test]
async fn allow_decision_echoes_original_input() {
    let options = AgentOptions::new().with_can_use_tool(|tool_name, _input, context| async move {
        assert_eq!(tool_name, "Bash");
        assert!(context.blocked_path.is_none());
        Ok(PermissionResult::allow())
    });
    let transport = FakeTransport::auto_responding();
    let mut client = Client::with_transport(options, transport.clone());
    client.connect(None).await.unwrap();

    transport.push_frame(json!({
        "type": "control_request",
        "request_id": "inbound-1",
        "request": {
            "subtype": "can_use_tool",
            "tool_name": "Bash",
            "input": {"cmd": "ls"},
            "permission_suggestions": [],
            "blocked_path": null,
        },
    }));
    transport.push_frame(assistant_frame("after"));
    transport.end_stream();

    // The dispatcher answers before the next frame is routed, so once the
    // sentinel arrives the response has been written.
    assert!(client.next_message().await.unwrap().is_some());

    let responses = transport.control_responses();
    let response = responses
        .iter()
        .find(|r| r["request_id"] == "inbound-1")
        .unwrap();
    assert_eq!(response["subtype"], "success");
    assert_eq!(response["response"]["behavior"], "allow");
    assert_eq!(response["response"]["updatedInput"], json!({"cmd": "ls"}));
}

#[tokio::test]
async fn deny_decision_carries_message_and_interrupt() {
    let options = AgentOptions::new().with_can_use_tool(|_, _, _| async {
        Ok(PermissionResult::Deny(PermissionResultDeny {
            message: "shell access disabled".to_string(),
            interrupt: true,
        }))
    });
    let transport = FakeTransport::auto_responding();
    let mut client = Client::with_transport(options, transport.clone());
    client.connect(None).await.unwrap();

    transport.push_frame(json!({
        "type": "control_request",
        "request_id": "inbound-2",
        "request": {"subtype": "can_use_tool", "tool_name": "Bash", "input": {}},
    }));
    transport.push_frame(assistant_frame("after"));
    transport.end_stream();
    client.next_message().await.unwrap();

    let responses = transport.control_responses();
    let response = responses
        .iter()
        .find(|r| r["request_id"] == "inbound-2")
        .unwrap();
    assert_eq!(
        response["response"],
        json!({"behavior": "deny", "message": "shell access disabled", "interrupt": true})
    );
}

#[tokio::test]
async fn allow_with_updated_input_replaces_it() {
    let options = AgentOptions::new().with_can_use_tool(|_, _, _| async {
        Ok(PermissionResult::Allow(PermissionResultAllow {
            updated_input: Some(json!({"cmd": "ls -la"})),
            updated_permissions: None,
        }))
    });
    let transport = FakeTransport::auto_responding();
    let mut client = Client::with_transport(options, transport.clone());
    client.connect(None).await.unwrap();

    transport.push_frame(json!({
        "type": "control_request",
        "request_id": "inbound-3",
        "request": {"subtype": "can_use_tool", "tool_name": "Bash", "input": {"cmd": "ls"}},
    }));
    transport.push_frame(assistant_frame("after"));
    transport.end_stream();
    client.next_message().await.unwrap();

    let responses = transport.control_responses();
    let response = responses
        .iter()
        .find(|r| r["request_id"] == "inbound-3")
        .unwrap();
    assert_eq!(response["response"]["updatedInput"]["cmd"], "ls -la");
}

#[tokio::test]
async fn missing_permission_callback_is_an_error_response() {
    let (mut client, transport) = connected(AgentOptions::new()).await;

    transport.push_frame(json!({
        "type": "control_request",
        "request_id": "inbound-4",
        "request": {"subtype": "can_use_tool", "tool_name": "Bash", "input": {}},
    }));
    transport.push_frame(assistant_frame("after"));
    transport.end_stream();
    client.next_message().await.unwrap();

    let responses = transport.control_responses();
    let response = responses
        .iter()
        .find(|r| r["request_id"] == "inbound-4")
        .unwrap();
    assert_eq!(response["subtype"], "error");
    assert!(
        response["error"]
            .as_str()
            .unwrap()
            .contains("can_use_tool callback is not provided")
    );
}

#[tokio::test]
async fn unsupported_subtype_is_an_error_response() {
    let (mut client, transport) = connected(AgentOptions::new()).await;

    transport.push_frame(json!({
        "type": "control_request",
        "request_id": "inbound-5",
        "request": {"subtype": "set_thermostat", "degrees": 20},
    }));
    transport.push_frame(assistant_frame("after"));
    transport.end_stream();
    client.next_message().await.unwrap();

    let responses = transport.control_responses();
    let response = responses
        .iter()
        .find(|r| r["request_id"] == "inbound-5")
        .unwrap();
    assert_eq!(response["subtype"], "error");
    assert!(
        response["error"]
            .as_str()
            .unwrap()
            .contains("Unsupported control request subtype: set_thermostat")
    );
}

#[tokio::test]
async fn hook_callback_round_trip_restores_reserved_names() {
    let options = AgentOptions::new().with_hooks(
        "PreToolUse",
        [HookMatcher::for_tool("Bash").with_callback(|input, tool_use_id, _context| async move {
            assert_eq!(input["tool_name"], "Bash");
            assert_eq!(tool_use_id.as_deref(), Some("toolu_1"));
            Ok(HookOutput::new()
                .with_continue(true)
                .with_async(false)
                .with_field("systemMessage", json!("checked")))
        })],
    );
    let (mut client, transport) = connected(options).await;

    // The initialize request carries the registry ids for our callbacks.
    let init = transport
        .writes()
        .into_iter()
        .find(|w| w["request"]["subtype"] == "initialize")
        .unwrap();
    let callback_id = init["request"]["hooks"]["PreToolUse"][0]["hookCallbackIds"][0]
        .as_str()
        .unwrap()
        .to_string();
    assert_eq!(init["request"]["hooks"]["PreToolUse"][0]["matcher"], "Bash");

    transport.push_frame(json!({
        "type": "control_request",
        "request_id": "hook-req-1",
        "request": {
            "subtype": "hook_callback",
            "callback_id": callback_id,
            "input": {"tool_name": "Bash"},
            "tool_use_id": "toolu_1",
        },
    }));
    transport.push_frame(assistant_frame("after"));
    transport.end_stream();
    client.next_message().await.unwrap();

    let responses = transport.control_responses();
    let response = responses
        .iter()
        .find(|r| r["request_id"] == "hook-req-1")
        .unwrap();
    assert_eq!(response["subtype"], "success");
    let payload = &response["response"];
    // Reserved wire names restored; alias spellings never leak.
    assert_eq!(payload["continue"], true);
    assert_eq!(payload["async"], false);
    assert_eq!(payload["systemMessage"], "checked");
    assert!(payload.get("continue_").is_none());
    assert!(payload.get("async_").is_none());
}

#[tokio::test]
async fn unknown_hook_callback_id_is_an_error_response() {
    let options = AgentOptions::new().with_hooks(
        "PreToolUse",
        [HookMatcher::all().with_callback(|_, _, _| async { Ok(HookOutput::new()) })],
    );
    let (mut client, transport) = connected(options).await;

    transport.push_frame(json!({
        "type": "control_request",
        "request_id": "hook-req-2",
        "request": {"subtype": "hook_callback", "callback_id": "hook_404", "input": {}},
    }));
    transport.push_frame(assistant_frame("after"));
    transport.end_stream();
    client.next_message().await.unwrap();

    let responses = transport.control_responses();
    let response = responses
        .iter()
        .find(|r| r["request_id"] == "hook-req-2")
        .unwrap();
    assert_eq!(response["subtype"], "error");
    assert!(
        response["error"]
            .as_str()
            .unwrap()
            .contains("No hook callback found for ID: hook_404")
    );
}

#[tokio::test]
async fn mcp_message_is_bridged_to_the_sdk_server() {
    let server = SdkMcpServer::new(
        "sdk",
        "1.0.0",
        [tool("echo", "Echo", json!({"type": "object"}), |args: Value| async move {
            Ok(json!({"content": [{"type": "text", "text": args["input"]}]}))
        })],
    );
    let options = AgentOptions::new().with_sdk_mcp_server(server);
    let (mut client, transport) = connected(options).await;

    transport.push_frame(json!({
        "type": "control_request",
        "request_id": "mcp-1",
        "request": {
            "subtype": "mcp_message",
            "server_name": "sdk",
            "message": {"method": "tools/list", "id": 1},
        },
    }));
    transport.push_frame(assistant_frame("after"));
    transport.end_stream();
    client.next_message().await.unwrap();

    let responses = transport.control_responses();
    let response = responses.iter().find(|r| r["request_id"] == "mcp-1").unwrap();
    assert_eq!(response["subtype"], "success");
    let reply = &response["response"]["mcp_response"];
    assert_eq!(reply["result"]["tools"][0]["name"], "echo");
}

#[tokio::test]
async fn raw_mcp_handler_takes_precedence() {
    let options = AgentOptions::new()
        .with_sdk_mcp_server(SdkMcpServer::new("sdk", "1.0.0", []))
        .with_mcp_message_handler(|server_name, message| async move {
            Ok(json!({"handled_by": "raw", "server": server_name, "method": message["method"]}))
        });
    let (mut client, transport) = connected(options).await;

    transport.push_frame(json!({
        "type": "control_request",
        "request_id": "mcp-2",
        "request": {
            "subtype": "mcp_message",
            "server_name": "sdk",
            "message": {"method": "tools/list", "id": 2},
        },
    }));
    transport.push_frame(assistant_frame("after"));
    transport.end_stream();
    client.next_message().await.unwrap();

    let responses = transport.control_responses();
    let response = responses.iter().find(|r| r["request_id"] == "mcp-2").unwrap();
    assert_eq!(response["response"]["mcp_response"]["handled_by"], "raw");
}

#[tokio::test]
async fn mcp_message_without_any_handler_is_an_error_response() {
    let (mut client, transport) = connected(AgentOptions::new()).await;

    transport.push_frame(json!({
        "type": "control_request",
        "request_id": "mcp-3",
        "request": {
            "subtype": "mcp_message",
            "server_name": "ghost",
            "message": {"method": "tools/list", "id": 3},
        },
    }));
    transport.push_frame(assistant_frame("after"));
    transport.end_stream();
    client.next_message().await.unwrap();

    let responses = transport.control_responses();
    let response = responses.iter().find(|r| r["request_id"] == "mcp-3").unwrap();
    assert_eq!(response["subtype"], "error");
}

#[tokio::test]
async fn streamed_prompt_without_callbacks_closes_input_immediately() {
    let transport = FakeTransport::auto_responding();
    let mut client = Client::with_transport(AgentOptions::new(), transport.clone());
    client
        .connect(Some(Prompt::Messages(vec![json!({
            "type": "user",
            "message": {"role": "user", "content": "hello"},
            "session_id": "s1",
        })])))
        .await
        .unwrap();

    assert!(transport.input_closed());
    let user_writes: Vec<_> = transport
        .writes()
        .into_iter()
        .filter(|w| w["type"] == "user")
        .collect();
    assert_eq!(user_writes.len(), 1);
}

#[tokio::test]
async fn streamed_prompt_with_callbacks_closes_input_on_first_result() {
    let options = AgentOptions::new()
        .with_can_use_tool(|_, _, _| async { Ok(PermissionResult::allow()) });
    let transport = FakeTransport::auto_responding();
    let mut client = Client::with_transport(options, transport.clone());
    client
        .connect(Some(Prompt::Messages(vec![json!({
            "type": "user",
            "message": {"role": "user", "content": "hello"},
            "session_id": "s1",
        })])))
        .await
        .unwrap();

    // Input stays open so the CLI can still reach the permission callback.
    assert!(!transport.input_closed());

    transport.push_frame(assistant_frame("working"));
    assert!(client.next_message().await.unwrap().is_some());
    assert!(!transport.input_closed());

    transport.push_frame(result_frame());
    match client.next_message().await.unwrap().unwrap() {
        Message::Result(result) => assert_eq!(result.subtype, "success"),
        other => panic!("expected result, got {other:?}"),
    }
    // The result frame is still delivered, and input closed exactly once.
    assert!(transport.input_closed());

    transport.end_stream();
    assert!(client.next_message().await.unwrap().is_none());
}

#[tokio::test]
async fn query_stamps_missing_session_ids() {
    let (client, transport) = connected(AgentOptions::new()).await;

    client
        .query_messages(
            vec![
                json!({"type": "user", "message": {"role": "user", "content": "a"}}),
                json!({"type": "user", "message": {"role": "user", "content": "b"}, "session_id": "own"}),
            ],
            "sess_9",
        )
        .await
        .unwrap();

    let users: Vec<_> = transport
        .writes()
        .into_iter()
        .filter(|w| w["type"] == "user")
        .collect();
    assert_eq!(users[0]["session_id"], "sess_9");
    assert_eq!(users[1]["session_id"], "own");
}
