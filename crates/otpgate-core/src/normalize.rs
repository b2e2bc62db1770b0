//! Message normalization.
//!
//! Converts the heterogeneous raw payload shapes into one canonical value.
//! Body extraction priority, by content type: plain text, extended text,
//! image/video caption, interactive/template selected option id, empty
//! string otherwise.

use crate::jid;
use crate::message::{CanonicalMessage, ContentType, MessageKey};
use crate::raw::{RawContent, RawMessage};

/// Result of normalizing one raw event.
#[derive(Debug, Clone)]
pub enum NormalizeOutcome {
    /// A canonical message ready for dispatch.
    Message(CanonicalMessage),
    /// Status-channel event with auto-view enabled: the caller marks it read
    /// and reacts, then drops it. Never dispatched.
    StatusSideEffect(MessageKey),
    /// No payload, or a status-channel event with auto-view disabled.
    Skip,
}

/// Normalizes a raw inbound event.
///
/// `bot_identity` is the transport-reported own identity; self-authored
/// messages resolve their sender to its normalized form. `auto_view_status`
/// selects between skipping status-channel events outright and surfacing
/// them as a side effect.
pub fn normalize(
    raw: &RawMessage,
    bot_identity: &str,
    auto_view_status: bool,
) -> NormalizeOutcome {
    let Some(content) = &raw.message else {
        return NormalizeOutcome::Skip;
    };
    let content = content.unwrap_ephemeral();

    if jid::is_status(&raw.key.remote_jid) {
        if auto_view_status {
            return NormalizeOutcome::StatusSideEffect(raw.key.clone());
        }
        return NormalizeOutcome::Skip;
    }

    let is_group = jid::is_group(&raw.key.remote_jid);
    let sender_id = if raw.key.from_me {
        jid::normalize_identity(bot_identity)
    } else {
        raw.key
            .participant
            .clone()
            .unwrap_or_else(|| raw.key.remote_jid.clone())
    };

    let (content_type, body) = classify(content);
    let quoted = quoted_message(content, &raw.key, is_group);

    NormalizeOutcome::Message(CanonicalMessage {
        key: raw.key.clone(),
        sender_id,
        is_group,
        content_type,
        body,
        quoted,
        is_from_self: raw.key.from_me,
        push_name: raw.push_name.clone(),
    })
}

/// Classifies a payload and extracts its body.
fn classify(content: &RawContent) -> (ContentType, String) {
    if let Some(text) = &content.conversation {
        return (ContentType::Text, text.clone());
    }
    if let Some(extended) = &content.extended_text_message {
        return (ContentType::Text, extended.text.clone());
    }
    if let Some(image) = &content.image_message {
        return (
            ContentType::Image,
            image.caption.clone().unwrap_or_default(),
        );
    }
    if let Some(video) = &content.video_message {
        return (
            ContentType::Video,
            video.caption.clone().unwrap_or_default(),
        );
    }
    if content.sticker_message.is_some() {
        return (ContentType::Sticker, String::new());
    }
    if let Some(reaction) = &content.reaction_message {
        return (ContentType::Reaction, reaction.text.clone());
    }
    if let Some(interactive) = &content.interactive_response_message {
        return (
            ContentType::Text,
            interactive.selected_id().unwrap_or_default(),
        );
    }
    if let Some(template) = &content.template_button_reply_message {
        return (
            ContentType::Text,
            template.selected_id.clone().unwrap_or_default(),
        );
    }
    (ContentType::Other, String::new())
}

/// Builds the nested canonical form of a quoted message, if one is attached.
fn quoted_message(
    content: &RawContent,
    key: &MessageKey,
    is_group: bool,
) -> Option<Box<CanonicalMessage>> {
    let context = content
        .extended_text_message
        .as_ref()?
        .context_info
        .as_ref()?;
    let quoted_content = context.quoted_message.as_deref()?;
    let (content_type, body) = classify(quoted_content.unwrap_ephemeral());

    let sender_id = context
        .participant
        .clone()
        .unwrap_or_else(|| key.remote_jid.clone());

    Some(Box::new(CanonicalMessage {
        key: MessageKey {
            id: context.stanza_id.clone().unwrap_or_default(),
            remote_jid: key.remote_jid.clone(),
            from_me: false,
            participant: context.participant.clone(),
        },
        sender_id,
        is_group,
        content_type,
        body,
        quoted: None,
        is_from_self: false,
        push_name: None,
    }))
}
