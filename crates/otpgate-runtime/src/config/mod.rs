//! Configuration management.
//!
//! Layered loading (defaults, TOML file, `OTPGATE_` environment variables)
//! with post-load validation.

pub mod error;
pub mod loader;
pub mod schema;
pub mod validation;

pub use error::{ConfigError, ConfigResult};
pub use loader::ConfigLoader;
pub use schema::{
    GatewayConfig, HttpConfig, LogFormat, LoggingConfig, OtpConfig, RateLimitConfig, SessionConfig,
};
pub use validation::validate_config;
