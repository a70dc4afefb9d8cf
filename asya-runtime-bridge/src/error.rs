//! Errors raised while framing or exchanging messages with the runtime.

use thiserror::Error;

/// Result alias for runtime-bridge operations.
pub type BridgeResult<T> = Result<T, BridgeError>;

/// Errors from dispatching an envelope across the runtime bridge.
#[derive(Error, Debug)]
pub enum BridgeError {
    /// The underlying socket I/O failed.
    #[error("runtime bridge I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A frame could not be decoded as JSON.
    #[error("runtime bridge frame decode error: {0}")]
    Decode(#[from] serde_json::Error),

    /// The runtime closed the connection before sending a header frame.
    #[error("runtime closed the connection before responding")]
    ConnectionClosed,

    /// The runtime's header frame declared zero payload frames but did not
    /// send an error frame either.
    #[error("runtime header declared {declared} response frames but sent none")]
    EmptyResponse { declared: usize },

    /// The envelope's deadline (or the bridge's own timeout) elapsed while
    /// waiting for the runtime.
    #[error("runtime bridge dispatch timed out")]
    Timeout,

    /// The runtime returned a frame out of the expected sequence, e.g. a
    /// second header frame.
    #[error("unexpected frame from runtime: {detail}")]
    UnexpectedFrame { detail: String },
}

impl BridgeError {
    /// Returns true if this failure should be treated as a deadline
    /// expiry by the caller (routes to `error-end` with a timeout error).
    pub fn is_timeout(&self) -> bool {
        matches!(self, BridgeError::Timeout)
    }

    /// Short category tag for structured logging.
    pub fn category(&self) -> &'static str {
        match self {
            BridgeError::Io(_) => "io",
            BridgeError::Decode(_) => "decode",
            BridgeError::ConnectionClosed => "connection_closed",
            BridgeError::EmptyResponse { .. } => "empty_response",
            BridgeError::Timeout => "timeout",
            BridgeError::UnexpectedFrame { .. } => "unexpected_frame",
        }
    }
}
