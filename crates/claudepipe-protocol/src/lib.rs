//! Wire types for the claudepipe agent protocol
//!
//! The Claude Code CLI speaks newline-delimited JSON over stdin/stdout. Each
//! line is one frame: either a conversation message (`user`, `assistant`,
//! `system`, `result`, `stream_event`) or a control-protocol frame
//! (`control_request` / `control_response` / `control_cancel_request`) layered
//! over the same stream.
//!
//! This crate defines the typed views of those frames shared by the transport
//! and client crates. Frames the CLI may add in the future are representable:
//! unrecognized message and content-block types parse into `Unknown` variants
//! carrying the raw record rather than failing.

#![warn(missing_docs)]

pub mod content;
pub mod control;
pub mod error;
pub mod hooks;
pub mod message;
pub mod permissions;

pub use content::ContentBlock;
pub use control::{
    CanUseToolRequest, ControlResponseBody, HookCallbackRequest, McpMessageRequest,
};
pub use error::MessageParseError;
pub use hooks::{HookMatcherConfig, HookOutput};
pub use message::{
    AssistantMessage, Message, ResultMessage, StreamEvent, SystemMessage, UserContent, UserMessage,
};
pub use permissions::{
    PermissionMode, PermissionResult, PermissionResultAllow, PermissionResultDeny,
    ToolPermissionContext,
};
