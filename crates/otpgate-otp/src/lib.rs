//! # Otpgate OTP
//!
//! One-time-password lifecycle for the otpgate gateway: phone-number
//! canonicalization, code issuance and delivery, attempt-limited
//! verification and per-number rate limiting.
//!
//! The [`OtpEngine`] is the single entry point; the HTTP surface and the
//! messaging handlers both drive it. Codes live in an [`OtpStore`], which
//! the engine mutates through store-level atomic updates so concurrent
//! verification attempts cannot double-verify one code.

pub mod engine;
pub mod error;
pub mod phone;
pub mod ratelimit;
pub mod store;

pub use engine::{IssueKind, IssueReceipt, OtpEngine, OtpPolicy, VerifyReceipt};
pub use error::{OtpError, OtpResult};
pub use phone::DialPlan;
pub use ratelimit::RateLimiter;
pub use store::{MemoryOtpStore, OtpRecord, OtpStats, OtpStore, StoreDisposition};
