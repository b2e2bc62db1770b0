//! Error types for handler registration and invocation.

use thiserror::Error;

use otpgate_core::TransportError;

/// Errors raised while building the handler registry.
#[derive(Debug, Clone, Error)]
pub enum RegistryError {
    /// Two handlers were registered under the same pattern.
    #[error("duplicate handler pattern '{0}'")]
    DuplicatePattern(String),

    /// An alias collides with an existing pattern or alias.
    #[error("duplicate handler alias '{0}'")]
    DuplicateAlias(String),

    /// A handler was registered with an empty pattern.
    #[error("handler pattern must not be empty")]
    EmptyPattern,
}

/// A fault raised by a single handler invocation.
///
/// Caught at the invocation boundary and logged; never propagates to other
/// handlers or later messages.
#[derive(Debug, Clone, Error)]
pub enum HandlerError {
    /// The handler failed to talk to the transport.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// Any other handler-specific fault.
    #[error("{0}")]
    Other(String),
}

impl HandlerError {
    /// Convenience constructor for ad-hoc handler faults.
    pub fn other(msg: impl Into<String>) -> Self {
        Self::Other(msg.into())
    }
}

/// Result type for handler invocations.
pub type HandlerResult = Result<(), HandlerError>;
