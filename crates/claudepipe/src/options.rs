//! Connection options
//!
//! Everything configurable about a connection: the flags forwarded to the
//! CLI, the inbound-control callbacks (permissions, hooks, MCP), and the
//! control-protocol timeouts. Options are plain data plus `Arc`'d closures,
//! so they clone cheaply.

use crate::error::Result;
use crate::hooks::HookMatcher;
use crate::mcp::SdkMcpServer;
use claudepipe_protocol::permissions::{PermissionMode, PermissionResult, ToolPermissionContext};
use futures::future::BoxFuture;
use serde_json::Value;
use std::collections::HashMap;
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Async permission callback: `(tool_name, input, context) -> decision`.
pub type PermissionCallback =
    dyn Fn(String, Value, ToolPermissionContext) -> BoxFuture<'static, Result<PermissionResult>>
        + Send
        + Sync;

/// Async raw MCP handler: `(server_name, message) -> reply`.
///
/// When set it takes precedence over registered SDK servers for every
/// `mcp_message` control request.
pub type McpMessageHandler =
    dyn Fn(String, Value) -> BoxFuture<'static, Result<Value>> + Send + Sync;

/// System prompt configuration.
#[derive(Debug, Clone)]
pub enum SystemPrompt {
    /// Replace the CLI's system prompt.
    Text(String),
    /// Keep the preset prompt and append to it.
    Preset {
        /// Text appended to the preset prompt.
        append: String,
    },
}

/// One entry in the MCP server map.
#[derive(Clone)]
pub enum McpServerConfig {
    /// External server configuration forwarded verbatim via `--mcp-config`.
    External(Value),
    /// In-process server bridged over the control protocol; never forwarded
    /// to the CLI as external configuration.
    Sdk(Arc<SdkMcpServer>),
}

/// Options for a connection to the agent CLI.
#[derive(Clone, Default)]
pub struct AgentOptions {
    /// Explicit CLI executable path; discovered on PATH and in well-known
    /// install locations when unset.
    pub cli_path: Option<PathBuf>,
    /// Working directory for the CLI process.
    pub cwd: Option<PathBuf>,
    /// System prompt configuration.
    pub system_prompt: Option<SystemPrompt>,
    /// Base tool set (`--tools`); `None` leaves the CLI default.
    pub tools: Option<Vec<String>>,
    /// Tools pre-approved for use without prompting.
    pub allowed_tools: Vec<String>,
    /// Tools removed from the set entirely.
    pub disallowed_tools: Vec<String>,
    /// Maximum conversation turns per request.
    pub max_turns: Option<u32>,
    /// Budget cap in USD.
    pub max_budget_usd: Option<f64>,
    /// Model override.
    pub model: Option<String>,
    /// Fallback model when the primary is overloaded.
    pub fallback_model: Option<String>,
    /// Beta feature flags.
    pub betas: Vec<String>,
    /// Tool the CLI should call for permission prompts. Mutually exclusive
    /// with [`AgentOptions::can_use_tool`], which forces `stdio` here.
    pub permission_prompt_tool_name: Option<String>,
    /// Permission mode for the session.
    pub permission_mode: Option<PermissionMode>,
    /// Continue the most recent conversation.
    pub continue_conversation: bool,
    /// Resume a specific session by id.
    pub resume: Option<String>,
    /// Settings payload or settings file path, forwarded verbatim.
    pub settings: Option<String>,
    /// Additional directories the CLI may access.
    pub add_dirs: Vec<PathBuf>,
    /// MCP servers by name: external configs and in-process SDK servers.
    pub mcp_servers: HashMap<String, McpServerConfig>,
    /// Emit `stream_event` frames for partial messages.
    pub include_partial_messages: bool,
    /// Fork the resumed session instead of appending to it.
    pub fork_session: bool,
    /// Cap on model thinking tokens.
    pub max_thinking_tokens: Option<u32>,
    /// Cap on buffered CLI output bytes awaiting a newline; defaults to the
    /// transport's 1 MiB.
    pub max_buffer_size: Option<usize>,
    /// Hook configuration: event name to matchers.
    pub hooks: HashMap<String, Vec<HookMatcher>>,
    /// Permission callback answering `can_use_tool` control requests.
    /// Requires streaming mode.
    pub can_use_tool: Option<Arc<PermissionCallback>>,
    /// Raw handler answering `mcp_message` control requests.
    pub mcp_message_handler: Option<Arc<McpMessageHandler>>,
    /// Deadline for ordinary control requests; default 60 s.
    pub control_request_timeout: Option<Duration>,
    /// Deadline for the initialize handshake; floored at 60 s to tolerate
    /// slow CLI startup.
    pub initialize_timeout: Option<Duration>,
    /// Environment overrides for the CLI process.
    pub env: HashMap<String, String>,
    /// Extra flags appended to the command line; `None` values are bare
    /// flags.
    pub extra_args: Vec<(String, Option<String>)>,
}

impl AgentOptions {
    /// Options with every field at its default.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the CLI executable path.
    pub fn with_cli_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.cli_path = Some(path.into());
        self
    }

    /// Set the CLI working directory.
    pub fn with_cwd(mut self, cwd: impl Into<PathBuf>) -> Self {
        self.cwd = Some(cwd.into());
        self
    }

    /// Replace the system prompt.
    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(SystemPrompt::Text(prompt.into()));
        self
    }

    /// Append to the preset system prompt.
    pub fn with_appended_system_prompt(mut self, append: impl Into<String>) -> Self {
        self.system_prompt = Some(SystemPrompt::Preset {
            append: append.into(),
        });
        self
    }

    /// Set the base tool set.
    pub fn with_tools<I, S>(mut self, tools: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tools = Some(tools.into_iter().map(Into::into).collect());
        self
    }

    /// Pre-approve tools.
    pub fn with_allowed_tools<I, S>(mut self, tools: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.allowed_tools = tools.into_iter().map(Into::into).collect();
        self
    }

    /// Remove tools from the set.
    pub fn with_disallowed_tools<I, S>(mut self, tools: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.disallowed_tools = tools.into_iter().map(Into::into).collect();
        self
    }

    /// Cap conversation turns.
    pub fn with_max_turns(mut self, turns: u32) -> Self {
        self.max_turns = Some(turns);
        self
    }

    /// Set the model.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Set the permission mode.
    pub fn with_permission_mode(mut self, mode: PermissionMode) -> Self {
        self.permission_mode = Some(mode);
        self
    }

    /// Resume a session by id.
    pub fn with_resume(mut self, session_id: impl Into<String>) -> Self {
        self.resume = Some(session_id.into());
        self
    }

    /// Add a directory the CLI may access.
    pub fn with_add_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.add_dirs.push(dir.into());
        self
    }

    /// Register an MCP server.
    pub fn with_mcp_server(mut self, name: impl Into<String>, config: McpServerConfig) -> Self {
        self.mcp_servers.insert(name.into(), config);
        self
    }

    /// Register an in-process SDK MCP server under its own name.
    pub fn with_sdk_mcp_server(mut self, server: SdkMcpServer) -> Self {
        let name = server.name().to_string();
        self.mcp_servers
            .insert(name, McpServerConfig::Sdk(Arc::new(server)));
        self
    }

    /// Emit partial-message stream events.
    pub fn with_partial_messages(mut self) -> Self {
        self.include_partial_messages = true;
        self
    }

    /// Override the output buffer cap.
    pub fn with_max_buffer_size(mut self, max: usize) -> Self {
        self.max_buffer_size = Some(max);
        self
    }

    /// Add hook matchers for an event.
    pub fn with_hooks(
        mut self,
        event: impl Into<String>,
        matchers: impl IntoIterator<Item = HookMatcher>,
    ) -> Self {
        self.hooks
            .entry(event.into())
            .or_default()
            .extend(matchers);
        self
    }

    /// Set the permission callback. Requires a streaming connection and is
    /// mutually exclusive with an explicit permission-prompt tool.
    pub fn with_can_use_tool<F, Fut>(mut self, callback: F) -> Self
    where
        F: Fn(String, Value, ToolPermissionContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<PermissionResult>> + Send + 'static,
    {
        let callback: Arc<PermissionCallback> =
            Arc::new(move |tool_name, input, context| Box::pin(callback(tool_name, input, context)));
        self.can_use_tool = Some(callback);
        self
    }

    /// Set the raw MCP message handler.
    pub fn with_mcp_message_handler<F, Fut>(mut self, handler: F) -> Self
    where
        F: Fn(String, Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value>> + Send + 'static,
    {
        let handler: Arc<McpMessageHandler> =
            Arc::new(move |server_name, message| Box::pin(handler(server_name, message)));
        self.mcp_message_handler = Some(handler);
        self
    }

    /// Override the ordinary control-request deadline.
    pub fn with_control_request_timeout(mut self, timeout: Duration) -> Self {
        self.control_request_timeout = Some(timeout);
        self
    }

    /// Override the initialize deadline (floored at 60 s).
    pub fn with_initialize_timeout(mut self, timeout: Duration) -> Self {
        self.initialize_timeout = Some(timeout);
        self
    }

    /// Set an environment variable for the CLI process.
    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    /// Append an extra CLI flag; pass `None` for a bare flag.
    pub fn with_extra_arg(mut self, flag: impl Into<String>, value: Option<String>) -> Self {
        self.extra_args.push((flag.into(), value));
        self
    }

    /// Whether any inbound-control callback is configured. Connections with
    /// callbacks keep input open until the first result.
    pub(crate) fn has_control_callbacks(&self) -> bool {
        !self.hooks.is_empty() || self.mcp_message_handler.is_some() || self.can_use_tool.is_some()
    }

    /// The in-process SDK servers, by name.
    pub(crate) fn sdk_mcp_servers(&self) -> HashMap<String, Arc<SdkMcpServer>> {
        self.mcp_servers
            .iter()
            .filter_map(|(name, config)| match config {
                McpServerConfig::Sdk(server) => Some((name.clone(), Arc::clone(server))),
                McpServerConfig::External(_) => None,
            })
            .collect()
    }
}
