//! Frame interpretation errors

use serde_json::Value;

/// Errors raised while interpreting a decoded frame as a typed message.
///
/// Each variant keeps the raw record so callers can log or inspect the frame
/// that failed to parse.
#[derive(Debug, thiserror::Error)]
pub enum MessageParseError {
    /// The frame has no string `type` field.
    #[error("message missing type field")]
    MissingType {
        /// The raw frame.
        raw: Value,
    },

    /// A required field of a known message type is absent.
    #[error("{kind} message missing field: {field}")]
    MissingField {
        /// Message type being parsed.
        kind: &'static str,
        /// Name of the absent field.
        field: &'static str,
        /// The raw frame.
        raw: Value,
    },

    /// A field is present but has the wrong shape.
    #[error("{kind} message has invalid field: {field}")]
    InvalidField {
        /// Message type being parsed.
        kind: &'static str,
        /// Name of the malformed field.
        field: &'static str,
        /// The raw frame.
        raw: Value,
    },
}
