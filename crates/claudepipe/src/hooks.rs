//! Hook callbacks and the registry built at initialize time
//!
//! Hooks are configured per event name (`PreToolUse`, `PostToolUse`,
//! `UserPromptSubmit`, ...) as lists of matchers, each carrying callbacks.
//! When the connection initializes, every callback is assigned an opaque
//! `hook_<n>` id; the wire configuration carries only the ids and the
//! registry maps them back for inbound `hook_callback` requests. The registry
//! is built once and never mutated afterwards.

use crate::error::Result;
use claudepipe_protocol::hooks::{HookMatcherConfig, HookOutput};
use futures::future::BoxFuture;
use serde_json::Value;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

/// Context passed to a hook callback alongside its input and tool-use id.
///
/// Currently carries no data; reserved for an abort signal.
#[derive(Debug, Clone, Default)]
#[non_exhaustive]
pub struct HookContext {}

/// An async hook callback: `(input, tool_use_id, context) -> HookOutput`.
pub type HookCallback =
    dyn Fn(Value, Option<String>, HookContext) -> BoxFuture<'static, Result<HookOutput>>
        + Send
        + Sync;

/// Wrap an async closure into a registrable [`HookCallback`].
pub fn hook_callback<F, Fut>(callback: F) -> Arc<HookCallback>
where
    F: Fn(Value, Option<String>, HookContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<HookOutput>> + Send + 'static,
{
    Arc::new(move |input, tool_use_id, context| Box::pin(callback(input, tool_use_id, context)))
}

/// One hook matcher: an optional tool-name pattern and the callbacks to run.
#[derive(Clone)]
pub struct HookMatcher {
    /// Tool-name pattern the matcher applies to, or `None` for all tools.
    pub matcher: Option<String>,
    /// Callbacks invoked when the matcher fires.
    pub callbacks: Vec<Arc<HookCallback>>,
    /// Per-matcher timeout in seconds, when configured.
    pub timeout: Option<f64>,
}

impl HookMatcher {
    /// A matcher that fires for every tool.
    pub fn all() -> Self {
        Self {
            matcher: None,
            callbacks: Vec::new(),
            timeout: None,
        }
    }

    /// A matcher scoped to a tool-name pattern.
    pub fn for_tool(pattern: impl Into<String>) -> Self {
        Self {
            matcher: Some(pattern.into()),
            callbacks: Vec::new(),
            timeout: None,
        }
    }

    /// Attach a callback.
    pub fn with_callback<F, Fut>(mut self, callback: F) -> Self
    where
        F: Fn(Value, Option<String>, HookContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<HookOutput>> + Send + 'static,
    {
        self.callbacks.push(hook_callback(callback));
        self
    }

    /// Set the matcher timeout in seconds.
    pub fn with_timeout(mut self, seconds: f64) -> Self {
        self.timeout = Some(seconds);
        self
    }
}

/// Assign registry ids to every configured callback and render the hook
/// configuration sent with the `initialize` control request.
///
/// Returns `None` when no hooks are configured (the wire carries `null`).
pub(crate) fn build_hooks_config(
    hooks: &HashMap<String, Vec<HookMatcher>>,
    registry: &mut HashMap<String, Arc<HookCallback>>,
) -> Option<Value> {
    if hooks.is_empty() {
        return None;
    }

    let mut next_id = 0usize;
    let mut config = serde_json::Map::new();
    for (event, matchers) in hooks {
        let mut entries = Vec::with_capacity(matchers.len());
        for matcher in matchers {
            let mut ids = Vec::with_capacity(matcher.callbacks.len());
            for callback in &matcher.callbacks {
                let id = format!("hook_{next_id}");
                next_id += 1;
                registry.insert(id.clone(), Arc::clone(callback));
                ids.push(id);
            }
            let entry = HookMatcherConfig {
                matcher: matcher.matcher.clone(),
                hook_callback_ids: ids,
                timeout: matcher.timeout,
            };
            entries.push(serde_json::to_value(entry).unwrap_or(Value::Null));
        }
        config.insert(event.clone(), Value::Array(entries));
    }

    Some(Value::Object(config))
}
