//! # Otpgate Runtime
//!
//! Process-level plumbing for the otpgate gateway: configuration loading,
//! logging setup, session-credential resolution, the connection lifecycle
//! manager, the HTTP control surface and the [`Gateway`] orchestrator that
//! ties them together.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use otpgate_runtime::{Gateway, config::ConfigLoader};
//!
//! let config = ConfigLoader::new().load()?;
//! let gateway = Gateway::new(config, transport, handlers)?;
//! gateway.run().await?;
//! ```

pub mod config;
pub mod connection;
pub mod error;
pub mod http;
pub mod logging;
pub mod runtime;
pub mod session;

pub use config::{ConfigError, ConfigLoader, ConfigResult, GatewayConfig};
pub use connection::{ConnectionManager, Link, LinkStatus};
pub use error::{RuntimeError, RuntimeResult};
pub use runtime::Gateway;
pub use session::{FileCredentialStore, SessionResolver};
