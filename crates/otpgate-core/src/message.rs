//! Canonical message model.
//!
//! Every inbound event that survives normalization becomes exactly one
//! [`CanonicalMessage`]. The value is immutable after construction and is
//! discarded once dispatch completes.

use serde::{Deserialize, Serialize};

use crate::jid;

/// The addressing key of an inbound message, as the transport reported it.
///
/// Needed verbatim for quoting, reactions and mark-read calls.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageKey {
    /// Transport-assigned message identifier.
    pub id: String,
    /// The conversation the message belongs to.
    pub remote_jid: String,
    /// Whether the bot's own identity authored the message.
    #[serde(default)]
    pub from_me: bool,
    /// The authoring participant, present for group conversations.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub participant: Option<String>,
}

/// Broad classification of an inbound message's payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentType {
    Text,
    Image,
    Video,
    Sticker,
    Reaction,
    Other,
}

/// The normalized inbound unit produced by [`normalize`](crate::normalize).
///
/// `body` is derived from the raw payload by content-type priority; see the
/// normalizer for the extraction rules.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CanonicalMessage {
    /// The transport addressing key of the original event.
    pub key: MessageKey,
    /// The sender: the participant id in groups, the conversation id in
    /// direct chats, or the bot's normalized identity for self-authored
    /// messages.
    pub sender_id: String,
    /// Whether the conversation is a group.
    pub is_group: bool,
    /// Payload classification.
    pub content_type: ContentType,
    /// Extracted textual body (may be empty).
    pub body: String,
    /// The quoted message, if the payload carried one.
    pub quoted: Option<Box<CanonicalMessage>>,
    /// Whether the bot's own identity authored the message.
    pub is_from_self: bool,
    /// Display name the sender advertises, if any.
    pub push_name: Option<String>,
}

impl CanonicalMessage {
    /// The transport-assigned message identifier.
    pub fn id(&self) -> &str {
        &self.key.id
    }

    /// The conversation this message belongs to.
    pub fn conversation_id(&self) -> &str {
        &self.key.remote_jid
    }

    /// The sender's bare phone number.
    pub fn sender_number(&self) -> &str {
        jid::bare_number(&self.sender_id)
    }
}
