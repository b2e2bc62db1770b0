//! Opaque transport abstractions.
//!
//! The messaging-protocol client is an external collaborator: the gateway
//! only needs connect/send/receive/disconnect primitives and a typed event
//! stream. [`Transport`] establishes sessions; [`TransportHandle`] is the
//! live send side of one session. A new session (and handle) replaces the
//! old one on every reconnect.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::credentials::Credentials;
use crate::error::TransportResult;
use crate::message::MessageKey;
use crate::raw::TransportEvent;

/// Factory for transport sessions.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Establishes a session with the given credentials.
    ///
    /// The returned session owns the event stream; dropping it tears the
    /// connection down.
    async fn connect(&self, credentials: Credentials) -> TransportResult<TransportSession>;
}

/// A live transport session: the send handle plus the inbound event stream.
pub struct TransportSession {
    /// Send side, shared with dispatch and the HTTP surface.
    pub handle: Arc<dyn TransportHandle>,
    /// Inbound events. Closed when the underlying connection dies.
    pub events: mpsc::Receiver<TransportEvent>,
}

/// The send side of a live session.
#[async_trait]
pub trait TransportHandle: Send + Sync {
    /// The bot's own (possibly device-qualified) identity on the network.
    fn identity(&self) -> String;

    /// Sends a payload to a conversation.
    async fn send(
        &self,
        conversation_id: &str,
        payload: OutboundPayload,
        options: SendOptions,
    ) -> TransportResult<DeliveryAck>;

    /// Relays a raw protocol payload without gateway-side shaping.
    async fn relay(&self, conversation_id: &str, raw: serde_json::Value) -> TransportResult<()>;

    /// Marks the given messages as read.
    async fn read_messages(&self, keys: &[MessageKey]) -> TransportResult<()>;

    /// Fetches group metadata for a group conversation.
    async fn group_metadata(&self, conversation_id: &str) -> TransportResult<GroupMetadata>;

    /// Tears the session down.
    async fn disconnect(&self);
}

/// Outbound message payloads the gateway produces.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutboundPayload {
    /// Plain text.
    Text { text: String },
    /// Text with footer and reply buttons.
    Interactive {
        text: String,
        footer: String,
        buttons: Vec<Button>,
    },
    /// Emoji reaction to an earlier message.
    Reaction { emoji: String, key: MessageKey },
}

impl OutboundPayload {
    /// Convenience constructor for a plain text payload.
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }
}

/// A tappable button attached to an interactive payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Button {
    /// Opaque id echoed back in the reply.
    pub id: String,
    /// Display label.
    pub label: String,
}

/// Per-send options.
#[derive(Debug, Clone, Default)]
pub struct SendOptions {
    /// Quote the given message.
    pub quote: Option<MessageKey>,
    /// Status-channel recipient list, for status reactions.
    pub status_jid_list: Vec<String>,
}

impl SendOptions {
    /// Options quoting the given message.
    pub fn quoting(key: MessageKey) -> Self {
        Self {
            quote: Some(key),
            ..Default::default()
        }
    }
}

/// Acknowledgement of a delivered message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryAck {
    /// Transport-assigned id of the delivered message.
    pub message_id: String,
}

/// Metadata of a group conversation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GroupMetadata {
    /// Group subject line.
    pub subject: String,
    /// Current participants.
    pub participants: Vec<GroupParticipant>,
}

impl GroupMetadata {
    /// Identifiers of participants holding admin rights.
    pub fn admin_ids(&self) -> Vec<String> {
        self.participants
            .iter()
            .filter(|p| p.admin)
            .map(|p| p.id.clone())
            .collect()
    }
}

/// A single group participant.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GroupParticipant {
    /// Participant identifier.
    pub id: String,
    /// Whether the participant holds admin or superadmin rights.
    pub admin: bool,
}
