//! Command dispatcher.
//!
//! One [`Dispatcher::dispatch`] call handles exactly one canonical message:
//! it classifies the sender, applies the deployment's mode gate, resolves at
//! most one command handler, and fans out to every matching non-command
//! trigger. Handler invocations run as independent tasks; a failing or
//! panicking handler never affects the others.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tracing::{debug, error, trace};

use otpgate_core::{CanonicalMessage, GroupMetadata, TransportHandle, jid};

use crate::handler::{HandlerContext, HandlerSpec};
use crate::registry::HandlerRegistry;

/// The deployment operating mode.
///
/// Filters the entire message before any handler runs, unless the sender
/// qualifies as owner/operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Mode {
    /// Only owners/operators are served.
    #[default]
    Private,
    /// Direct conversations only.
    InboxOnly,
    /// Group conversations only.
    GroupsOnly,
    /// Everyone is served.
    Public,
}

impl Mode {
    /// Whether a message passes the gate.
    pub fn allows(&self, is_group: bool, is_operator: bool) -> bool {
        if is_operator {
            return true;
        }
        match self {
            Self::Private => false,
            Self::InboxOnly => !is_group,
            Self::GroupsOnly => is_group,
            Self::Public => true,
        }
    }
}

/// Static dispatch policy, injected at construction.
#[derive(Debug, Clone, Default)]
pub struct DispatchPolicy {
    /// Command prefix, e.g. `.`.
    pub prefix: String,
    /// Operating mode gate.
    pub mode: Mode,
    /// Configured owner numbers.
    pub owner_numbers: Vec<String>,
    /// Configured operator allow-list.
    pub sudo_numbers: Vec<String>,
}

/// Authorization classification of one message's sender.
#[derive(Debug, Clone, Default)]
pub struct AuthContext {
    /// Bare sender number.
    pub sender_number: String,
    /// The bot's own bare number.
    pub bot_number: String,
    /// Whether the bot authored the message.
    pub is_self: bool,
    /// Owner/operator classification: configured owners ∪ the bot's own
    /// number ∪ the configured allow-list.
    pub is_operator: bool,
    /// Whether the sender is an admin of the group conversation.
    pub is_group_admin: bool,
    /// Whether the bot is an admin of the group conversation.
    pub is_bot_admin: bool,
}

impl AuthContext {
    fn classify(
        message: &CanonicalMessage,
        bot_identity: &str,
        group: Option<&GroupMetadata>,
        policy: &DispatchPolicy,
    ) -> Self {
        let sender_number = message.sender_number().to_string();
        let bot_number = jid::bare_number(bot_identity).to_string();
        let is_operator = sender_number == bot_number
            || policy.owner_numbers.contains(&sender_number)
            || policy.sudo_numbers.contains(&sender_number);

        let bot_jid = jid::normalize_identity(bot_identity);
        let (is_group_admin, is_bot_admin) = match group {
            Some(meta) => {
                let admins = meta.admin_ids();
                (
                    admins.contains(&message.sender_id),
                    admins.contains(&bot_jid),
                )
            }
            None => (false, false),
        };

        Self {
            sender_number,
            bot_number,
            is_self: message.is_from_self,
            is_operator,
            is_group_admin,
            is_bot_admin,
        }
    }
}

/// What one dispatch call did, for logging and tests.
#[derive(Debug, Clone, Default)]
pub struct DispatchSummary {
    /// Pattern of the command handler that ran, if any.
    pub command: Option<String>,
    /// Number of fan-out handlers invoked.
    pub fan_out: usize,
    /// Whether the mode gate filtered the message out.
    pub gated: bool,
}

/// Resolves canonical messages to registered handlers.
pub struct Dispatcher {
    registry: Arc<HandlerRegistry>,
    policy: DispatchPolicy,
}

impl Dispatcher {
    /// Creates a dispatcher over a registry with the given policy.
    pub fn new(registry: Arc<HandlerRegistry>, policy: DispatchPolicy) -> Self {
        Self { registry, policy }
    }

    /// The dispatch policy.
    pub fn policy(&self) -> &DispatchPolicy {
        &self.policy
    }

    /// Dispatches one message.
    ///
    /// Waits for every spawned handler invocation to finish; the caller
    /// decides whether to await or detach the whole dispatch.
    pub async fn dispatch(
        &self,
        message: CanonicalMessage,
        handle: Arc<dyn TransportHandle>,
    ) -> DispatchSummary {
        let message = Arc::new(message);
        let bot_identity = handle.identity();

        let group = if message.is_group {
            match handle.group_metadata(message.conversation_id()).await {
                Ok(meta) => Some(Arc::new(meta)),
                Err(e) => {
                    debug!(
                        conversation = %message.conversation_id(),
                        error = %e,
                        "Failed to fetch group metadata"
                    );
                    None
                }
            }
        } else {
            None
        };

        let auth = AuthContext::classify(&message, &bot_identity, group.as_deref(), &self.policy);
        let gated = !self.policy.mode.allows(message.is_group, auth.is_operator);

        let command = parse_command(&message.body, &self.policy.prefix);
        let args: Vec<String> = message
            .body
            .split_whitespace()
            .skip(1)
            .map(str::to_string)
            .collect();

        let ctx = HandlerContext::new(
            Arc::clone(&message),
            command.clone(),
            args,
            self.policy.prefix.clone(),
            auth,
            group,
            Arc::clone(&handle),
        );

        let mut summary = DispatchSummary {
            gated,
            ..Default::default()
        };
        let mut tasks: Vec<JoinHandle<()>> = Vec::new();

        if gated {
            trace!(
                sender = %ctx.auth.sender_number,
                mode = ?self.policy.mode,
                "Message filtered by mode gate"
            );
        } else {
            // At most one command handler per message: exact pattern
            // first, then alias membership.
            if let Some(name) = &command
                && let Some(spec) = self.registry.lookup_command(name)
            {
                summary.command = Some(spec.pattern.clone());
                if let Some(emoji) = &spec.react
                    && let Err(e) = ctx.react(emoji.clone()).await
                {
                    debug!(handler = %spec.pattern, error = %e, "Reaction send failed");
                }
                tasks.push(spawn_invocation(Arc::clone(spec), ctx.clone()));
            }
        }

        // Independent fan-out over non-command triggers. Ungated handlers
        // still run for gated messages, so interactive replies from
        // recipients outside the operator set get acknowledged.
        for spec in self.registry.iter() {
            if (!gated || spec.ungated) && spec.trigger.matches(&message) {
                summary.fan_out += 1;
                tasks.push(spawn_invocation(Arc::clone(spec), ctx.clone()));
            }
        }

        for task in tasks {
            if task.await.is_err() {
                error!("Handler task panicked");
            }
        }

        summary
    }
}

/// Runs one handler as its own task so a fault cannot leak out.
fn spawn_invocation(spec: Arc<HandlerSpec>, ctx: HandlerContext) -> JoinHandle<()> {
    tokio::spawn(async move {
        if let Err(e) = spec.invoke(ctx).await {
            error!(handler = %spec.pattern, error = %e, "Handler invocation failed");
        }
    })
}

/// Extracts the command token: the lower-cased first whitespace-delimited
/// token after the prefix, if the body begins with the prefix.
pub fn parse_command(body: &str, prefix: &str) -> Option<String> {
    if prefix.is_empty() {
        return None;
    }
    let rest = body.strip_prefix(prefix)?;
    let token = rest.trim().split_whitespace().next()?;
    Some(token.to_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use parking_lot::Mutex;

    use otpgate_core::{
        ContentType, DeliveryAck, GroupParticipant, MessageKey, OutboundPayload, SendOptions,
        TransportError, TransportResult,
    };

    use crate::handler::Trigger;

    const BOT_IDENTITY: &str = "263719000000:7@s.whatsapp.net";

    struct MockHandle {
        sends: Mutex<Vec<(String, OutboundPayload)>>,
        group: Option<GroupMetadata>,
    }

    impl MockHandle {
        fn new() -> Self {
            Self {
                sends: Mutex::new(Vec::new()),
                group: None,
            }
        }
    }

    #[async_trait]
    impl TransportHandle for MockHandle {
        fn identity(&self) -> String {
            BOT_IDENTITY.to_string()
        }

        async fn send(
            &self,
            conversation_id: &str,
            payload: OutboundPayload,
            _options: SendOptions,
        ) -> TransportResult<DeliveryAck> {
            self.sends
                .lock()
                .push((conversation_id.to_string(), payload));
            Ok(DeliveryAck {
                message_id: "SENT".into(),
            })
        }

        async fn relay(
            &self,
            _conversation_id: &str,
            _raw: serde_json::Value,
        ) -> TransportResult<()> {
            Ok(())
        }

        async fn read_messages(&self, _keys: &[MessageKey]) -> TransportResult<()> {
            Ok(())
        }

        async fn group_metadata(&self, _conversation_id: &str) -> TransportResult<GroupMetadata> {
            self.group
                .clone()
                .ok_or(TransportError::NotConnected)
        }

        async fn disconnect(&self) {}
    }

    fn text_message(body: &str, sender: &str) -> CanonicalMessage {
        CanonicalMessage {
            key: MessageKey {
                id: "M1".into(),
                remote_jid: sender.to_string(),
                from_me: false,
                participant: None,
            },
            sender_id: sender.to_string(),
            is_group: false,
            content_type: ContentType::Text,
            body: body.to_string(),
            quoted: None,
            is_from_self: false,
            push_name: None,
        }
    }

    fn counting_command(pattern: &str, counter: Arc<AtomicUsize>) -> HandlerSpec {
        HandlerSpec::command(pattern, move |_ctx| {
            let counter = Arc::clone(&counter);
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        })
    }

    fn policy(mode: Mode) -> DispatchPolicy {
        DispatchPolicy {
            prefix: ".".into(),
            mode,
            owner_numbers: vec!["263719647303".into()],
            sudo_numbers: Vec::new(),
        }
    }

    #[test]
    fn test_parse_command() {
        assert_eq!(parse_command(".jid", "."), Some("jid".into()));
        assert_eq!(parse_command(".JID extra args", "."), Some("jid".into()));
        assert_eq!(parse_command("jid", "."), None);
        assert_eq!(parse_command(".", "."), None);
        assert_eq!(parse_command("!jid", "!"), Some("jid".into()));
    }

    #[tokio::test]
    async fn test_command_invoked_exactly_once_without_fanout() {
        let counter = Arc::new(AtomicUsize::new(0));
        let registry = Arc::new(
            HandlerRegistry::build(vec![counting_command("jid", Arc::clone(&counter))]).unwrap(),
        );
        let dispatcher = Dispatcher::new(registry, policy(Mode::Public));

        let msg = text_message(".jid", "263770000000@s.whatsapp.net");
        let summary = dispatcher.dispatch(msg, Arc::new(MockHandle::new())).await;

        assert_eq!(summary.command.as_deref(), Some("jid"));
        assert_eq!(summary.fan_out, 0);
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_alias_resolves_same_handler() {
        let counter = Arc::new(AtomicUsize::new(0));
        let registry = Arc::new(
            HandlerRegistry::build(vec![
                counting_command("jid", Arc::clone(&counter)).alias("id"),
            ])
            .unwrap(),
        );
        let dispatcher = Dispatcher::new(registry, policy(Mode::Public));

        let msg = text_message(".id", "263770000000@s.whatsapp.net");
        let summary = dispatcher.dispatch(msg, Arc::new(MockHandle::new())).await;

        assert_eq!(summary.command.as_deref(), Some("jid"));
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_fanout_runs_alongside_command() {
        let cmd_counter = Arc::new(AtomicUsize::new(0));
        let body_counter = Arc::new(AtomicUsize::new(0));
        let body_counter2 = Arc::clone(&body_counter);

        let registry = Arc::new(
            HandlerRegistry::build(vec![
                counting_command("jid", Arc::clone(&cmd_counter)),
                HandlerSpec::with_trigger("log-bodies", Trigger::Body, move |_ctx| {
                    let counter = Arc::clone(&body_counter2);
                    async move {
                        counter.fetch_add(1, Ordering::SeqCst);
                        Ok(())
                    }
                }),
            ])
            .unwrap(),
        );
        let dispatcher = Dispatcher::new(registry, policy(Mode::Public));

        let msg = text_message(".jid", "263770000000@s.whatsapp.net");
        let summary = dispatcher.dispatch(msg, Arc::new(MockHandle::new())).await;

        assert_eq!(summary.command.as_deref(), Some("jid"));
        assert_eq!(summary.fan_out, 1);
        assert_eq!(cmd_counter.load(Ordering::SeqCst), 1);
        assert_eq!(body_counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_private_mode_gates_non_operator() {
        let counter = Arc::new(AtomicUsize::new(0));
        let registry = Arc::new(
            HandlerRegistry::build(vec![counting_command("jid", Arc::clone(&counter))]).unwrap(),
        );
        let dispatcher = Dispatcher::new(registry, policy(Mode::Private));

        let msg = text_message(".jid", "263770000000@s.whatsapp.net");
        let summary = dispatcher.dispatch(msg, Arc::new(MockHandle::new())).await;
        assert!(summary.gated);
        assert_eq!(counter.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_private_mode_admits_owner() {
        let counter = Arc::new(AtomicUsize::new(0));
        let registry = Arc::new(
            HandlerRegistry::build(vec![counting_command("jid", Arc::clone(&counter))]).unwrap(),
        );
        let dispatcher = Dispatcher::new(registry, policy(Mode::Private));

        let msg = text_message(".jid", "263719647303@s.whatsapp.net");
        let summary = dispatcher.dispatch(msg, Arc::new(MockHandle::new())).await;
        assert!(!summary.gated);
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_ungated_handler_runs_for_gated_message() {
        let gated_counter = Arc::new(AtomicUsize::new(0));
        let gated_counter2 = Arc::clone(&gated_counter);
        let ungated_counter = Arc::new(AtomicUsize::new(0));
        let ungated_counter2 = Arc::clone(&ungated_counter);

        let registry = Arc::new(
            HandlerRegistry::build(vec![
                HandlerSpec::with_trigger("log-bodies", Trigger::Body, move |_ctx| {
                    let counter = Arc::clone(&gated_counter2);
                    async move {
                        counter.fetch_add(1, Ordering::SeqCst);
                        Ok(())
                    }
                }),
                HandlerSpec::with_trigger("copy-ack", Trigger::Body, move |_ctx| {
                    let counter = Arc::clone(&ungated_counter2);
                    async move {
                        counter.fetch_add(1, Ordering::SeqCst);
                        Ok(())
                    }
                })
                .ungated(),
            ])
            .unwrap(),
        );
        let dispatcher = Dispatcher::new(registry, policy(Mode::Private));

        // An OTP recipient tapping the copy button is not an operator.
        let msg = text_message("copy_123456", "263770000000@s.whatsapp.net");
        let summary = dispatcher.dispatch(msg, Arc::new(MockHandle::new())).await;

        assert!(summary.gated);
        assert_eq!(summary.fan_out, 1);
        assert_eq!(gated_counter.load(Ordering::SeqCst), 0);
        assert_eq!(ungated_counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_handler_error_does_not_affect_others() {
        let counter = Arc::new(AtomicUsize::new(0));
        let counter2 = Arc::clone(&counter);

        let registry = Arc::new(
            HandlerRegistry::build(vec![
                HandlerSpec::command("boom", |_ctx| async {
                    Err(crate::error::HandlerError::other("deliberate failure"))
                }),
                HandlerSpec::with_trigger("observer", Trigger::Body, move |_ctx| {
                    let counter = Arc::clone(&counter2);
                    async move {
                        counter.fetch_add(1, Ordering::SeqCst);
                        Ok(())
                    }
                }),
            ])
            .unwrap(),
        );
        let dispatcher = Dispatcher::new(registry, policy(Mode::Public));

        let msg = text_message(".boom", "263770000000@s.whatsapp.net");
        let summary = dispatcher.dispatch(msg, Arc::new(MockHandle::new())).await;

        assert_eq!(summary.command.as_deref(), Some("boom"));
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_group_admin_classification() {
        let admin_jid = "263770000000@s.whatsapp.net";
        let mut handle = MockHandle::new();
        handle.group = Some(GroupMetadata {
            subject: "Ops".into(),
            participants: vec![
                GroupParticipant {
                    id: admin_jid.into(),
                    admin: true,
                },
                GroupParticipant {
                    id: "263719000000@s.whatsapp.net".into(),
                    admin: false,
                },
            ],
        });

        let seen_admin = Arc::new(AtomicUsize::new(0));
        let seen_admin2 = Arc::clone(&seen_admin);
        let registry = Arc::new(
            HandlerRegistry::build(vec![HandlerSpec::with_trigger(
                "admin-probe",
                Trigger::Body,
                move |ctx| {
                    let seen = Arc::clone(&seen_admin2);
                    async move {
                        if ctx.auth.is_group_admin {
                            seen.fetch_add(1, Ordering::SeqCst);
                        }
                        Ok(())
                    }
                },
            )])
            .unwrap(),
        );
        let dispatcher = Dispatcher::new(registry, policy(Mode::Public));

        let mut msg = text_message("hello", admin_jid);
        msg.is_group = true;
        msg.key.remote_jid = "12036304-163@g.us".into();
        msg.key.participant = Some(admin_jid.into());

        dispatcher.dispatch(msg, Arc::new(handle)).await;
        assert_eq!(seen_admin.load(Ordering::SeqCst), 1);
    }
}
