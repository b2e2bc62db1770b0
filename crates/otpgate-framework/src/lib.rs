//! # Otpgate Framework
//!
//! Event processing and routing for the otpgate gateway.
//!
//! Canonical messages flow from the connection layer into the [`Dispatcher`],
//! which enforces the deployment's mode policy, resolves at most one command
//! handler per message, and fans the message out to every matching
//! non-command trigger:
//!
//! ```text
//! ┌────────────┐     ┌────────────┐     ┌──────────────────┐
//! │ Normalizer │────▶│ Dispatcher │────▶│ command handler  │
//! │  (core)    │     │ (policy)   │────▶│ trigger handlers │
//! └────────────┘     └────────────┘     └──────────────────┘
//! ```
//!
//! Handlers are registered once at startup into a [`HandlerRegistry`]; the
//! registry is read-only during dispatch and validated for duplicate
//! patterns at build time.

pub mod builtin;
pub mod dispatch;
pub mod error;
pub mod handler;
pub mod registry;

pub use dispatch::{AuthContext, DispatchPolicy, DispatchSummary, Dispatcher, Mode};
pub use error::{HandlerError, HandlerResult, RegistryError};
pub use handler::{HandlerContext, HandlerSpec, Trigger};
pub use registry::HandlerRegistry;
