//! Drive the Claude Code CLI from Rust over its stdio control protocol
//!
//! The CLI multiplexes three traffic classes over one pair of pipes:
//! streamed conversation messages, outbound control requests with correlated
//! responses (initialize, interrupt, model and permission-mode changes), and
//! inbound control requests the CLI initiates (tool-permission checks, hook
//! callbacks, MCP bridge messages). This crate keeps all three flowing
//! without letting any of them block the others.
//!
//! # Architecture
//!
//! 1. **Protocol** (`claudepipe-protocol`): typed frames and wire shapes.
//! 2. **Transport** (`claudepipe-transport`): the subprocess, its framed
//!    stdout, and the independently closable stdin channel.
//! 3. **Client** (this crate): a reader task routes every inbound frame to
//!    the pending-request table, the inbound-control dispatcher, or the
//!    caller-visible message queue; control requests correlate by id with a
//!    timeout.
//!
//! # One-shot
//!
//! ```no_run
//! use claudepipe::{AgentOptions, query};
//!
//! # async fn example() -> claudepipe::Result<()> {
//! let messages = query("What is 2+2?", AgentOptions::new()).await?;
//! println!("{} messages", messages.len());
//! # Ok(())
//! # }
//! ```
//!
//! # Streaming with a permission callback
//!
//! ```no_run
//! use claudepipe::{AgentOptions, Client, PermissionResult, Prompt};
//!
//! # async fn example() -> claudepipe::Result<()> {
//! let options = AgentOptions::new().with_can_use_tool(|tool_name, _input, _context| async move {
//!     if tool_name == "Bash" {
//!         Ok(PermissionResult::deny("no shell access"))
//!     } else {
//!         Ok(PermissionResult::allow())
//!     }
//! });
//!
//! let mut client = Client::new(options);
//! client.connect(Some(Prompt::Messages(vec![]))).await?;
//! client.query("List the files in this directory").await?;
//! for message in client.receive_response().await? {
//!     println!("{}", message.message_type());
//! }
//! client.close().await;
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod client;
pub mod command;
pub mod error;
pub mod hooks;
pub mod mcp;
pub mod options;
pub mod query;
mod router;

pub use client::Client;
pub use command::Prompt;
pub use error::{AgentError, Result};
pub use hooks::{HookCallback, HookContext, HookMatcher, hook_callback};
pub use mcp::{SdkMcpServer, SdkTool, tool};
pub use options::{
    AgentOptions, McpMessageHandler, McpServerConfig, PermissionCallback, SystemPrompt,
};
pub use query::query;

pub use claudepipe_protocol::{
    ContentBlock, HookOutput, Message, PermissionMode, PermissionResult, PermissionResultAllow,
    PermissionResultDeny, ResultMessage, ToolPermissionContext,
};
pub use claudepipe_transport::{Transport, TransportError};
