//! Unified error types for the otpgate core.
//!
//! Transport errors cover the live messaging session; session errors cover
//! credential retrieval and storage. Both are non-fatal to the process: the
//! HTTP surface keeps serving and reports a disconnected gateway.

use thiserror::Error;

// =============================================================================
// Transport Errors
// =============================================================================

/// Errors that can occur on the live transport session.
#[derive(Debug, Clone, Error)]
pub enum TransportError {
    /// Establishing the session failed.
    #[error("connection failed: {reason}")]
    ConnectionFailed {
        /// Reason for failure.
        reason: String,
    },

    /// The session closed while an operation was in flight.
    #[error("connection closed: {reason}")]
    ConnectionClosed {
        /// Reason for closure.
        reason: String,
    },

    /// An outbound send was not acknowledged.
    #[error("failed to send message: {0}")]
    SendFailed(String),

    /// No transport session is currently open.
    #[error("transport is not connected")]
    NotConnected,

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(String),
}

impl From<std::io::Error> for TransportError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

// =============================================================================
// Session Errors
// =============================================================================

/// Errors that can occur while resolving or storing session credentials.
///
/// Fatal to transport bring-up, non-fatal to the process.
#[derive(Debug, Clone, Error)]
pub enum SessionError {
    /// No credential document exists for the given identifier.
    #[error("session not found: {0}")]
    NotFound(String),

    /// The credential document could not be decoded.
    #[error("invalid session format: {0}")]
    InvalidFormat(String),

    /// The storage backend could not be reached.
    #[error("session backend unreachable: {0}")]
    Unreachable(String),
}

impl From<serde_json::Error> for SessionError {
    fn from(err: serde_json::Error) -> Self {
        Self::InvalidFormat(err.to_string())
    }
}

// =============================================================================
// Result Type Aliases
// =============================================================================

/// Result type for transport operations.
pub type TransportResult<T> = Result<T, TransportError>;

/// Result type for session credential operations.
pub type SessionResult<T> = Result<T, SessionError>;
