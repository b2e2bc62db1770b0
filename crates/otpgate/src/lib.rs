//! # Otpgate
//!
//! A persistent-session OTP gateway over a pluggable messaging transport.
//!
//! ## Overview
//!
//! Otpgate connects to a messaging network through an injected [`Transport`],
//! normalizes its heterogeneous events into one canonical message shape,
//! routes commands through a mode-gated dispatcher, and issues and verifies
//! one-time passwords over both chat and an HTTP control surface.
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────┐     ┌────────────┐     ┌────────────┐     ┌──────────┐
//! │ Transport │────▶│ Normalizer │────▶│ Dispatcher │────▶│ Handlers │
//! │ (events)  │     │   (core)   │     │ (framework)│     │          │
//! └───────────┘     └────────────┘     └────────────┘     └──────────┘
//!       ▲                                                      │
//!       │            ┌────────────┐     ┌───────────┐          │
//!       └────────────│ OtpEngine  │◀────│ HTTP API  │          │
//!         deliveries └────────────┘     └───────────┘          ▼
//!                          ▲                               transport
//!                          └────────── chat commands ──────────┘
//! ```
//!
//! - **core**: canonical message model, normalization, transport traits
//! - **framework**: handler registry and the mode-gated dispatcher
//! - **otp**: code issuance, verification, rate limiting, statistics
//! - **runtime**: config, logging, session resolution, connection driver,
//!   HTTP surface and the [`Gateway`] orchestrator
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use otpgate::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = ConfigLoader::new().load()?;
//!     let transport = my_transport(); // Arc<dyn Transport>
//!
//!     let gateway = Gateway::new(config, transport, default_handlers())?;
//!     gateway.run().await?;
//!     Ok(())
//! }
//! ```
//!
//! [`Transport`]: otpgate_core::Transport
//! [`Gateway`]: otpgate_runtime::Gateway

pub use otpgate_core as core;
pub use otpgate_framework as framework;
pub use otpgate_otp as otp;
pub use otpgate_runtime as runtime;

/// Prelude module for convenient imports.
///
/// This module provides all commonly used types for building a gateway:
///
/// ```rust,ignore
/// use otpgate::prelude::*;
/// ```
pub mod prelude {
    // Runtime - main entry point
    pub use otpgate_runtime::{ConfigLoader, Gateway, GatewayConfig};

    // Handler system - primary unit of message handling
    pub use otpgate_framework::{HandlerContext, HandlerSpec, Mode, Trigger};

    // Stock handlers shipped with the gateway
    pub use otpgate_framework::builtin::{
        copy_confirmation, default_handlers, jid_command, owner_react,
    };

    // OTP lifecycle - for custom issuance flows
    pub use otpgate_otp::{IssueKind, OtpEngine, OtpPolicy};

    // Transport traits - for wiring a concrete messaging client
    pub use otpgate_core::{
        Credentials, OutboundPayload, SendOptions, Transport, TransportHandle,
    };

    // Handler error plumbing
    pub use otpgate_framework::{HandlerError, HandlerResult};
}
