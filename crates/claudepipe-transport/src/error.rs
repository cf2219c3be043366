//! Transport error types

/// Result type for transport operations.
pub type Result<T> = std::result::Result<T, TransportError>;

/// Errors that can occur in transport operations.
///
/// `JsonDecode` and `BufferOverflow` are framing errors: they end the frame
/// sequence and no partial frame is delivered. `ProcessExit` is raised only
/// after every frame the process produced has been yielded.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The configured CLI path does not exist, or no installation was found.
    #[error("Claude Code not found at: {0}")]
    CliNotFound(String),

    /// The process could not be started.
    #[error("failed to start Claude Code: {0}")]
    Spawn(String),

    /// A complete output line was not a JSON object.
    #[error("failed to decode JSON from CLI output: {line}")]
    JsonDecode {
        /// The offending line, whitespace-trimmed.
        line: String,
        /// The underlying decode failure, absent when the line decoded to a
        /// non-object value.
        #[source]
        source: Option<serde_json::Error>,
    },

    /// The peer emitted more than the configured limit without a newline.
    #[error("CLI output exceeded maximum buffer size of {limit} bytes")]
    BufferOverflow {
        /// The configured limit in bytes.
        limit: usize,
    },

    /// The process terminated with a non-zero status.
    #[error("Claude Code exited with code: {code}")]
    ProcessExit {
        /// The exit code.
        code: i32,
    },

    /// An outbound frame could not be serialized.
    #[error("failed to encode frame: {0}")]
    JsonEncode(#[from] serde_json::Error),

    /// I/O error on one of the process streams.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl TransportError {
    /// Whether this error ends the frame sequence.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            TransportError::JsonDecode { .. }
                | TransportError::BufferOverflow { .. }
                | TransportError::ProcessExit { .. }
                | TransportError::Io(_)
        )
    }
}
