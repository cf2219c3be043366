//! CLI command construction
//!
//! Pure mapping from [`AgentOptions`] to the CLI's argument vector and
//! environment, plus discovery of the executable when no path is configured.
//! No state lives here; the transport receives the finished vectors.

use crate::error::Result;
use crate::options::{AgentOptions, McpServerConfig, SystemPrompt};
use claudepipe_transport::TransportError;
use serde_json::{Value, json};
use std::collections::HashMap;
use std::path::PathBuf;

/// How the prompt reaches the CLI.
#[derive(Debug, Clone)]
pub enum Prompt {
    /// Single-shot: one complete prompt string; the control protocol is
    /// unavailable.
    Text(String),
    /// Streaming: message frames written after connect; input stays open.
    Messages(Vec<Value>),
}

/// Build the CLI argument vector for the given options and mode.
///
/// `single_shot_prompt` is `Some` only in single-shot mode and lands after
/// `--print --` at the very end, mirroring the CLI's expectations.
pub(crate) fn build_command(
    options: &AgentOptions,
    single_shot_prompt: Option<&str>,
) -> Vec<String> {
    let mut cmd: Vec<String> = vec![
        "--output-format".into(),
        "stream-json".into(),
        "--verbose".into(),
    ];

    match &options.system_prompt {
        None => {
            cmd.push("--system-prompt".into());
            cmd.push(String::new());
        }
        Some(SystemPrompt::Text(prompt)) => {
            cmd.push("--system-prompt".into());
            cmd.push(prompt.clone());
        }
        Some(SystemPrompt::Preset { append }) => {
            cmd.push("--append-system-prompt".into());
            cmd.push(append.clone());
        }
    }

    if let Some(tools) = &options.tools {
        cmd.push("--tools".into());
        cmd.push(tools.join(","));
    }

    if !options.allowed_tools.is_empty() {
        cmd.push("--allowedTools".into());
        cmd.push(options.allowed_tools.join(","));
    }

    if !options.disallowed_tools.is_empty() {
        cmd.push("--disallowedTools".into());
        cmd.push(options.disallowed_tools.join(","));
    }

    if let Some(max_turns) = options.max_turns {
        cmd.push("--max-turns".into());
        cmd.push(max_turns.to_string());
    }

    if let Some(budget) = options.max_budget_usd {
        cmd.push("--max-budget-usd".into());
        cmd.push(budget.to_string());
    }

    if let Some(model) = &options.model {
        cmd.push("--model".into());
        cmd.push(model.clone());
    }

    if let Some(fallback) = &options.fallback_model {
        cmd.push("--fallback-model".into());
        cmd.push(fallback.clone());
    }

    if !options.betas.is_empty() {
        cmd.push("--betas".into());
        cmd.push(options.betas.join(","));
    }

    if let Some(tool_name) = &options.permission_prompt_tool_name {
        cmd.push("--permission-prompt-tool".into());
        cmd.push(tool_name.clone());
    }

    if let Some(mode) = options.permission_mode {
        cmd.push("--permission-mode".into());
        cmd.push(mode.as_str().into());
    }

    if options.continue_conversation {
        cmd.push("--continue".into());
    }

    if let Some(resume) = &options.resume {
        cmd.push("--resume".into());
        cmd.push(resume.clone());
    }

    if let Some(settings) = &options.settings {
        cmd.push("--settings".into());
        cmd.push(settings.clone());
    }

    for dir in &options.add_dirs {
        cmd.push("--add-dir".into());
        cmd.push(dir.display().to_string());
    }

    let external_servers: serde_json::Map<String, Value> = options
        .mcp_servers
        .iter()
        .filter_map(|(name, config)| match config {
            McpServerConfig::External(value) => Some((name.clone(), value.clone())),
            // SDK servers live in-process and are bridged over the control
            // protocol, never spawned by the CLI.
            McpServerConfig::Sdk(_) => None,
        })
        .collect();
    if !external_servers.is_empty() {
        cmd.push("--mcp-config".into());
        cmd.push(json!({"mcpServers": external_servers}).to_string());
    }

    if options.include_partial_messages {
        cmd.push("--include-partial-messages".into());
    }

    if options.fork_session {
        cmd.push("--fork-session".into());
    }

    if let Some(tokens) = options.max_thinking_tokens {
        cmd.push("--max-thinking-tokens".into());
        cmd.push(tokens.to_string());
    }

    for (flag, value) in &options.extra_args {
        cmd.push(format!("--{flag}"));
        if let Some(value) = value {
            cmd.push(value.clone());
        }
    }

    match single_shot_prompt {
        Some(prompt) => {
            cmd.push("--print".into());
            cmd.push("--".into());
            cmd.push(prompt.to_string());
        }
        None => {
            cmd.push("--input-format".into());
            cmd.push("stream-json".into());
        }
    }

    cmd
}

/// Environment overrides for the CLI process, merged over the parent
/// environment by the transport.
pub(crate) fn build_env(options: &AgentOptions) -> HashMap<String, String> {
    let mut env = options.env.clone();
    if !env.contains_key("CLAUDE_CODE_ENTRYPOINT")
        && std::env::var_os("CLAUDE_CODE_ENTRYPOINT").is_none()
    {
        env.insert("CLAUDE_CODE_ENTRYPOINT".into(), "sdk-rust".into());
    }
    env
}

/// Resolve the CLI executable: the configured path (which must exist), then
/// `claude` on PATH, then well-known install locations.
pub(crate) fn resolve_cli(options: &AgentOptions) -> Result<PathBuf> {
    if let Some(path) = &options.cli_path {
        if !path.is_file() {
            return Err(TransportError::CliNotFound(path.display().to_string()).into());
        }
        return Ok(path.clone());
    }

    if let Some(paths) = std::env::var_os("PATH") {
        for dir in std::env::split_paths(&paths) {
            let candidate = dir.join("claude");
            if is_executable(&candidate) {
                return Ok(candidate);
            }
        }
    }

    let home = std::env::var_os("HOME").map(PathBuf::from);
    let mut candidates = vec![PathBuf::from("/usr/local/bin/claude")];
    if let Some(home) = home {
        candidates.extend([
            home.join(".npm-global/bin/claude"),
            home.join(".local/bin/claude"),
            home.join("node_modules/.bin/claude"),
            home.join(".yarn/bin/claude"),
            home.join(".claude/local/claude"),
        ]);
    }
    for candidate in candidates {
        if is_executable(&candidate) {
            return Ok(candidate);
        }
    }

    Err(TransportError::CliNotFound(
        "Claude Code CLI not found; set cli_path in the options".to_string(),
    )
    .into())
}

#[cfg(unix)]
fn is_executable(path: &std::path::Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    path.metadata()
        .map(|meta| meta.is_file() && meta.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &std::path::Path) -> bool {
    path.is_file()
}
