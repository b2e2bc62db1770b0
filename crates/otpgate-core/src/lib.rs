//! # Otpgate Core
//!
//! Foundation layer of the otpgate OTP gateway.
//!
//! This crate provides the building blocks shared by every other crate in the
//! workspace:
//!
//! - **Message model**: the canonical inbound unit ([`CanonicalMessage`]) and
//!   the heterogeneous raw payload shapes it is derived from ([`RawMessage`])
//! - **Normalization**: conversion of raw transport events into canonical
//!   messages ([`normalize`])
//! - **Transport abstractions**: the opaque messaging-network client
//!   ([`Transport`], [`TransportHandle`]) and its event stream
//! - **Credential storage**: the local durable store for session credentials
//!   ([`CredentialStore`])
//!
//! The gateway never speaks the messaging network's wire protocol itself; it
//! consumes typed events from a [`Transport`] and emits replies through a
//! [`TransportHandle`].

pub mod credentials;
pub mod error;
pub mod jid;
pub mod message;
pub mod normalize;
pub mod raw;
pub mod transport;

pub use credentials::{CredentialStore, Credentials};
pub use error::{SessionError, SessionResult, TransportError, TransportResult};
pub use message::{CanonicalMessage, ContentType, MessageKey};
pub use normalize::{NormalizeOutcome, normalize};
pub use raw::{
    CloseReason, ConnectionState, ConnectionUpdate, RawContent, RawKey, RawMessage, TransportEvent,
};
pub use transport::{
    Button, DeliveryAck, GroupMetadata, GroupParticipant, OutboundPayload, SendOptions, Transport,
    TransportHandle, TransportSession,
};
