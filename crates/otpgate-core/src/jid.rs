//! Conversation-identifier (JID) helpers.
//!
//! The messaging network addresses conversations with suffixed identifiers:
//! direct chats end in `@s.whatsapp.net`, groups in `@g.us`, and the status
//! channel is the fixed `status@broadcast` address. Device-qualified
//! identities carry a `:device` segment before the suffix.

/// Suffix of direct (one-to-one) conversation identifiers.
pub const USER_SUFFIX: &str = "@s.whatsapp.net";

/// Suffix of group conversation identifiers.
pub const GROUP_SUFFIX: &str = "@g.us";

/// The broadcast/status channel address.
pub const STATUS_BROADCAST: &str = "status@broadcast";

/// Returns true if the conversation identifier addresses a group.
pub fn is_group(conversation_id: &str) -> bool {
    conversation_id.ends_with(GROUP_SUFFIX)
}

/// Returns true if the conversation identifier is the status channel.
pub fn is_status(conversation_id: &str) -> bool {
    conversation_id == STATUS_BROADCAST
}

/// Renders a bare phone number as a direct-conversation identifier.
pub fn user_jid(number: &str) -> String {
    format!("{number}{USER_SUFFIX}")
}

/// Extracts the bare number from an identifier, dropping any `:device`
/// qualifier and the domain suffix.
pub fn bare_number(id: &str) -> &str {
    let before_domain = id.split('@').next().unwrap_or(id);
    before_domain.split(':').next().unwrap_or(before_domain)
}

/// Normalizes a (possibly device-qualified) identity to its canonical
/// direct-conversation form, e.g. `263719000000:12@s.whatsapp.net` becomes
/// `263719000000@s.whatsapp.net`.
pub fn normalize_identity(id: &str) -> String {
    user_jid(bare_number(id))
}
