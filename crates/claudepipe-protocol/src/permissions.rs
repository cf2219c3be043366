//! Tool permission types
//!
//! A `can_use_tool` control request is answered with a decision that the CLI
//! consumes in its `{behavior: "allow"|"deny", ...}` wire shape.

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::fmt;

/// How the CLI resolves tool-permission prompts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PermissionMode {
    /// Prompt for each sensitive tool use.
    Default,
    /// Auto-accept file edits.
    AcceptEdits,
    /// Plan mode: no tool execution.
    Plan,
    /// Skip all permission prompts.
    BypassPermissions,
}

impl PermissionMode {
    /// The wire string for this mode.
    pub fn as_str(&self) -> &'static str {
        match self {
            PermissionMode::Default => "default",
            PermissionMode::AcceptEdits => "acceptEdits",
            PermissionMode::Plan => "plan",
            PermissionMode::BypassPermissions => "bypassPermissions",
        }
    }
}

impl fmt::Display for PermissionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Context handed to a permission callback alongside the tool name and input.
#[derive(Debug, Clone, Default)]
pub struct ToolPermissionContext {
    /// Permission rule suggestions offered by the CLI.
    pub suggestions: Vec<Value>,
    /// Path that triggered the check, when a path rule blocked it.
    pub blocked_path: Option<String>,
}

/// Allow a tool call, optionally rewriting its input or permission rules.
#[derive(Debug, Clone, Default)]
pub struct PermissionResultAllow {
    /// Replacement tool input; the original input is echoed when absent.
    pub updated_input: Option<Value>,
    /// Replacement permission rules, when the decision also updates rules.
    pub updated_permissions: Option<Vec<Value>>,
}

/// Deny a tool call with a message shown to the model.
#[derive(Debug, Clone)]
pub struct PermissionResultDeny {
    /// Why the call was denied.
    pub message: String,
    /// Whether the current turn should also be interrupted.
    pub interrupt: bool,
}

impl PermissionResultDeny {
    /// Deny with a message and no interrupt.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            interrupt: false,
        }
    }
}

/// Outcome of a permission callback.
#[derive(Debug, Clone)]
pub enum PermissionResult {
    /// Let the tool call proceed.
    Allow(PermissionResultAllow),
    /// Block the tool call.
    Deny(PermissionResultDeny),
    /// A pre-shaped wire response passed through verbatim.
    Raw(serde_json::Map<String, Value>),
}

impl PermissionResult {
    /// Allow with the original input unchanged.
    pub fn allow() -> Self {
        PermissionResult::Allow(PermissionResultAllow::default())
    }

    /// Deny with a message.
    pub fn deny(message: impl Into<String>) -> Self {
        PermissionResult::Deny(PermissionResultDeny::new(message))
    }

    /// Render the decision into the CLI's wire shape.
    ///
    /// An allow with no replacement input echoes `original_input` back as
    /// `updatedInput`; a deny carries `interrupt` only when set.
    pub fn into_wire(self, original_input: &Value) -> Value {
        match self {
            PermissionResult::Allow(allow) => {
                let mut response = json!({
                    "behavior": "allow",
                    "updatedInput": allow
                        .updated_input
                        .unwrap_or_else(|| original_input.clone()),
                });
                if let Some(permissions) = allow.updated_permissions {
                    response["updatedPermissions"] = Value::Array(permissions);
                }
                response
            }
            PermissionResult::Deny(deny) => {
                let mut response = json!({
                    "behavior": "deny",
                    "message": deny.message,
                });
                if deny.interrupt {
                    response["interrupt"] = Value::Bool(true);
                }
                response
            }
            PermissionResult::Raw(map) => Value::Object(map),
        }
    }
}
