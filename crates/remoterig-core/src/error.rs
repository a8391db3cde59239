//! Error types for remoterig.
//!
//! All fallible operations across the library return [`Result<T>`], which
//! uses [`Error`] as the error type. Transport-layer, protocol-layer, and
//! engine-layer errors are all captured here.

/// The error type for all remoterig operations.
///
/// Variants cover the full range of failure modes encountered when talking
/// to a networked transceiver: socket failures, protocol decode errors,
/// timeouts, and authentication rejection.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A transport-level error (UDP socket, bind/connect failure).
    #[error("transport error: {0}")]
    Transport(String),

    /// A protocol-level error (malformed packet, unexpected reply).
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Timed out waiting for a reply from the radio.
    ///
    /// A single receive timeout is not fatal; the session layer only gives
    /// up after several in a row.
    #[error("timeout waiting for reply")]
    Timeout,

    /// The radio rejected the supplied username/password.
    #[error("invalid user/password")]
    AuthenticationFailed,

    /// An invalid parameter was passed to a command.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// No connection to the radio has been established.
    #[error("not connected")]
    NotConnected,

    /// The connection to the radio was lost (repeated receive timeouts or
    /// an unanswered stream request).
    #[error("connection lost")]
    ConnectionLost,

    /// An underlying I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// A convenience `Result` alias using [`Error`] as the error type.
pub type Result<T> = std::result::Result<T, Error>;
