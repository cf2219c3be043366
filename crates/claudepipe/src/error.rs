//! Client error types

use claudepipe_protocol::MessageParseError;
use claudepipe_transport::TransportError;

/// Result type for client operations.
pub type Result<T> = std::result::Result<T, AgentError>;

/// Errors surfaced by the client.
///
/// Transport errors (framing, process exit) end the message sequence.
/// `ControlTimeout` and `ControlRequest` are local to the call that issued
/// the control request; the connection stays usable. `Usage` is local to the
/// offending call.
#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    /// Framing, process, or I/O failure from the transport layer.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// An outbound control request did not resolve within its deadline.
    #[error("Control request timeout: {subtype}")]
    ControlTimeout {
        /// Subtype of the request that timed out.
        subtype: String,
    },

    /// The CLI answered a control request with an error.
    #[error("{0}")]
    ControlRequest(String),

    /// The connection closed while a control request was in flight.
    #[error("connection closed before the control request resolved")]
    ConnectionClosed,

    /// The operation is not legal in the current connection state.
    #[error("{0}")]
    Usage(String),

    /// A failure inside a permission, hook, or MCP handler.
    #[error("{0}")]
    Handler(String),

    /// A conversation frame could not be parsed into a typed message.
    #[error(transparent)]
    Parse(#[from] MessageParseError),

    /// JSON (de)serialization failure.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}
