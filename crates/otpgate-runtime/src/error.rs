//! Runtime error types.

use thiserror::Error;

use otpgate_core::{SessionError, TransportError};
use otpgate_framework::RegistryError;

use crate::config::ConfigError;

/// Errors raised by gateway startup and orchestration.
#[derive(Debug, Error)]
pub enum RuntimeError {
    /// Configuration loading or validation failed.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Handler registration failed.
    #[error(transparent)]
    Registry(#[from] RegistryError),

    /// Session credentials could not be resolved.
    #[error(transparent)]
    Session(#[from] SessionError),

    /// The transport failed outside the reconnecting loop.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The HTTP listener could not be bound or served.
    #[error("HTTP surface failed: {0}")]
    Http(#[from] std::io::Error),
}

/// Result type for runtime operations.
pub type RuntimeResult<T> = Result<T, RuntimeError>;
