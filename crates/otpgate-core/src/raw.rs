//! Raw inbound event shapes.
//!
//! The transport delivers messages in a heterogeneous one-of shape: a single
//! payload object where exactly one content field is populated. The structs
//! here mirror that wire shape (camelCase field names) so adapter
//! implementations can deserialize transport JSON directly; the normalizer
//! flattens them into a [`CanonicalMessage`](crate::CanonicalMessage).

use serde::{Deserialize, Serialize};

use crate::credentials::Credentials;
use crate::message::MessageKey;

/// Re-exported for wire-shape symmetry with [`RawMessage`].
pub type RawKey = MessageKey;

/// A raw inbound message event, as emitted by the transport.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawMessage {
    /// Addressing key.
    pub key: RawKey,
    /// Sender display name, if advertised.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub push_name: Option<String>,
    /// The payload. Events without a payload are skipped by the normalizer.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<RawContent>,
}

/// The one-of payload object. Exactly one field is expected to be populated.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RawContent {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conversation: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extended_text_message: Option<ExtendedText>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_message: Option<MediaContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub video_message: Option<MediaContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sticker_message: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reaction_message: Option<ReactionContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub interactive_response_message: Option<InteractiveResponse>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub template_button_reply_message: Option<TemplateButtonReply>,
    /// Disappearing-message wrapper around the real payload.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ephemeral_message: Option<Box<EphemeralWrapper>>,
}

impl RawContent {
    /// Unwraps one level of ephemeral wrapping, if present.
    pub fn unwrap_ephemeral(&self) -> &RawContent {
        match &self.ephemeral_message {
            Some(wrapper) => wrapper.message.as_deref().unwrap_or(self),
            None => self,
        }
    }
}

/// Text with optional context (quoting).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtendedText {
    #[serde(default)]
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context_info: Option<ContextInfo>,
}

/// Quoting context attached to an extended-text payload.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContextInfo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stanza_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub participant: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quoted_message: Option<Box<RawContent>>,
}

/// Image or video payload; only the caption matters to the gateway.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaContent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub caption: Option<String>,
}

/// An emoji reaction to an earlier message.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReactionContent {
    #[serde(default)]
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<RawKey>,
}

/// Reply to an interactive (native-flow) message.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InteractiveResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub native_flow_response_message: Option<NativeFlowResponse>,
}

/// The inner native-flow reply carrying a JSON-encoded selection.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NativeFlowResponse {
    #[serde(default)]
    pub params_json: String,
}

impl InteractiveResponse {
    /// Extracts the selected option id from the embedded params JSON.
    pub fn selected_id(&self) -> Option<String> {
        let params = &self.native_flow_response_message.as_ref()?.params_json;
        let value: serde_json::Value = serde_json::from_str(params).ok()?;
        value.get("id")?.as_str().map(str::to_string)
    }
}

/// Reply to a template-button message.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplateButtonReply {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selected_id: Option<String>,
}

/// Wrapper placed around payloads in disappearing-message conversations.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EphemeralWrapper {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<Box<RawContent>>,
}

// =============================================================================
// Connection events
// =============================================================================

/// Classification of a transport disconnect.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CloseReason {
    /// The session was explicitly invalidated; never reconnect.
    LoggedOut,
    /// Any other closure; schedule a reconnect.
    Other(String),
}

impl CloseReason {
    /// Terminal closures purge local credentials and halt reconnection.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::LoggedOut)
    }
}

/// Coarse connection state reported by the transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionState {
    Connecting,
    Open,
    Close,
}

/// A transport-level connection notification.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionUpdate {
    pub state: ConnectionState,
    /// Populated when `state` is [`ConnectionState::Close`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub close_reason: Option<CloseReason>,
    /// Pairing QR payload, emitted while no credentials are registered.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub qr: Option<String>,
}

/// Every event the transport can emit on its stream.
#[derive(Debug, Clone)]
pub enum TransportEvent {
    ConnectionUpdate(ConnectionUpdate),
    Message(Box<RawMessage>),
    /// Refreshed credentials that must be persisted.
    CredentialsUpdate(Credentials),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_plain_conversation() {
        let json = r#"{
            "key": {"id": "ABC", "remoteJid": "263719000000@s.whatsapp.net", "fromMe": false},
            "pushName": "Frank",
            "message": {"conversation": "hello"}
        }"#;
        let raw: RawMessage = serde_json::from_str(json).unwrap();
        assert_eq!(raw.key.id, "ABC");
        assert_eq!(raw.push_name.as_deref(), Some("Frank"));
        assert_eq!(
            raw.message.unwrap().conversation.as_deref(),
            Some("hello")
        );
    }

    #[test]
    fn test_unwrap_ephemeral_one_level() {
        let inner = RawContent {
            conversation: Some("hidden".into()),
            ..Default::default()
        };
        let outer = RawContent {
            ephemeral_message: Some(Box::new(EphemeralWrapper {
                message: Some(Box::new(inner)),
            })),
            ..Default::default()
        };
        assert_eq!(
            outer.unwrap_ephemeral().conversation.as_deref(),
            Some("hidden")
        );
    }

    #[test]
    fn test_interactive_selected_id() {
        let reply = InteractiveResponse {
            native_flow_response_message: Some(NativeFlowResponse {
                params_json: r#"{"id":"copy_123456"}"#.into(),
            }),
        };
        assert_eq!(reply.selected_id().as_deref(), Some("copy_123456"));

        let empty = InteractiveResponse::default();
        assert_eq!(empty.selected_id(), None);
    }

    #[test]
    fn test_close_reason_terminality() {
        assert!(CloseReason::LoggedOut.is_terminal());
        assert!(!CloseReason::Other("stream errored".into()).is_terminal());
    }
}
