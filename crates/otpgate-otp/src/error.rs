//! OTP lifecycle errors.

use thiserror::Error;

use otpgate_core::TransportError;

/// Failures of OTP issuance and verification.
///
/// Each variant maps to one externally visible outcome; the HTTP surface
/// translates them into status codes and response bodies.
#[derive(Debug, Clone, Error)]
pub enum OtpError {
    /// The supplied number contains no digits.
    #[error("invalid phone number '{0}'")]
    InvalidNumber(String),

    /// The per-number request window is exhausted.
    #[error("too many requests for {phone_number}")]
    RateLimited {
        /// Canonical number the limit applies to.
        phone_number: String,
    },

    /// No pending code exists for the number.
    #[error("no OTP found or already verified")]
    NotFound,

    /// The code's validity window has passed.
    #[error("OTP has expired")]
    Expired,

    /// The attempt budget is exhausted.
    #[error("too many attempts, request a new OTP")]
    TooManyAttempts,

    /// The submitted code does not match.
    #[error("invalid OTP code")]
    Mismatch,

    /// Delivery over the messaging transport failed.
    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// Result type for OTP operations.
pub type OtpResult<T> = Result<T, OtpError>;
