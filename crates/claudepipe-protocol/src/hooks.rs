//! Hook wire types
//!
//! Hook callbacks registered at initialize time are invoked by the CLI via
//! `hook_callback` control requests. Their output travels back on the wire
//! with two field names that are reserved words in Rust; those use
//! trailing-underscore names locally and serialize to the reserved spelling.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Output returned by a hook callback.
///
/// `continue_` and `async_` serialize as `continue` and `async`. Every other
/// field passes through `extra` unchanged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HookOutput {
    /// Whether the CLI should continue the current operation.
    #[serde(rename = "continue", skip_serializing_if = "Option::is_none")]
    pub continue_: Option<bool>,

    /// Whether the hook result applies asynchronously.
    #[serde(rename = "async", skip_serializing_if = "Option::is_none")]
    pub async_: Option<bool>,

    /// All remaining fields, forwarded verbatim.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

impl HookOutput {
    /// An empty output: continue with no directives.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the `continue` directive.
    pub fn with_continue(mut self, value: bool) -> Self {
        self.continue_ = Some(value);
        self
    }

    /// Set the `async` directive.
    pub fn with_async(mut self, value: bool) -> Self {
        self.async_ = Some(value);
        self
    }

    /// Attach an arbitrary passthrough field.
    pub fn with_field(mut self, key: impl Into<String>, value: Value) -> Self {
        self.extra.insert(key.into(), value);
        self
    }
}

/// One matcher entry in the hook configuration sent with `initialize`.
///
/// The callbacks themselves stay local; the wire carries only the registry
/// ids assigned to them.
#[derive(Debug, Clone, Serialize)]
pub struct HookMatcherConfig {
    /// Tool-name pattern the matcher applies to, or `None` for all.
    pub matcher: Option<String>,
    /// Registry ids of the callbacks to invoke.
    #[serde(rename = "hookCallbackIds")]
    pub hook_callback_ids: Vec<String>,
    /// Per-matcher timeout in seconds, when configured.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout: Option<f64>,
}
