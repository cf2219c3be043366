//! Subprocess stdio transport for the claudepipe agent protocol
//!
//! Owns the agent CLI process and its standard streams, and turns the raw
//! byte pipes into a frame interface:
//!
//! - [`LineFramer`] reassembles newline-delimited JSON from arbitrarily
//!   chunked reads, with a bounded buffer for pathological unterminated
//!   lines.
//! - [`SubprocessTransport`] spawns the process, pumps its stdout through the
//!   framer as a forward-only frame sequence, and runs a writer task that
//!   serializes outbound frames onto stdin. Input can be closed independently
//!   of process termination.
//! - [`Transport`] is the seam the client crate consumes, so tests can swap
//!   in a scripted double instead of a real process.

#![warn(missing_docs)]

pub mod error;
pub mod framer;
pub mod subprocess;
pub mod traits;

pub use error::{Result, TransportError};
pub use framer::{DEFAULT_MAX_BUFFER_SIZE, LineFramer};
pub use subprocess::{ProcessConfig, StdinMode, SubprocessTransport};
pub use traits::Transport;
