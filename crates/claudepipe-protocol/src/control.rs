//! Control-protocol frame bodies
//!
//! Control traffic shares the conversation stream and is distinguished by the
//! frame `type`: `control_request` / `control_response` in both directions,
//! correlated by `request_id`. Outbound envelopes are assembled inline by the
//! client; this module types the bodies that need parsing on arrival.

use serde::Deserialize;
use serde_json::Value;

fn empty_object() -> Value {
    Value::Object(serde_json::Map::new())
}

/// Body of a `control_response` frame (nested under `response`).
#[derive(Debug, Clone, Deserialize)]
pub struct ControlResponseBody {
    /// `success` or `error`.
    pub subtype: String,
    /// Id of the request this resolves.
    pub request_id: String,
    /// Result payload on success.
    #[serde(default)]
    pub response: Option<Value>,
    /// Error detail on failure; usually a string.
    #[serde(default)]
    pub error: Option<Value>,
}

impl ControlResponseBody {
    /// The error detail rendered as a message string.
    pub fn error_message(&self) -> String {
        match &self.error {
            Some(Value::String(s)) => s.clone(),
            Some(other) => other.to_string(),
            None => "Unknown error".to_string(),
        }
    }
}

/// An inbound `can_use_tool` request: the CLI asks whether a tool call may
/// proceed.
#[derive(Debug, Clone, Deserialize)]
pub struct CanUseToolRequest {
    /// Name of the tool about to run.
    #[serde(default)]
    pub tool_name: String,
    /// The proposed tool input.
    #[serde(default = "empty_object")]
    pub input: Value,
    /// Permission rule suggestions offered by the CLI.
    #[serde(default)]
    pub permission_suggestions: Vec<Value>,
    /// Path that triggered the check, when a path rule blocked it.
    #[serde(default)]
    pub blocked_path: Option<String>,
}

/// An inbound `hook_callback` request: the CLI invokes a hook registered at
/// initialize time.
#[derive(Debug, Clone, Deserialize)]
pub struct HookCallbackRequest {
    /// Registry id assigned when the hook configuration was built.
    pub callback_id: String,
    /// Hook input payload.
    #[serde(default)]
    pub input: Value,
    /// Tool use the hook fired for, when applicable.
    #[serde(default)]
    pub tool_use_id: Option<String>,
}

/// An inbound `mcp_message` request: the CLI bridges a JSON-RPC message to an
/// in-process MCP server.
#[derive(Debug, Clone, Deserialize)]
pub struct McpMessageRequest {
    /// Name of the target server.
    pub server_name: String,
    /// The JSON-RPC message.
    pub message: Value,
}
