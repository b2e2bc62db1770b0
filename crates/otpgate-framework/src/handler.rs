//! Handler specifications and the invocation context.
//!
//! A [`HandlerSpec`] is a registered capability: a primary trigger pattern,
//! an alias set, a trigger kind and the callable itself. Specs are built
//! once at startup and never mutated afterwards.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};

use otpgate_core::{
    CanonicalMessage, ContentType, DeliveryAck, GroupMetadata, OutboundPayload, SendOptions,
    TransportHandle,
};

use crate::dispatch::AuthContext;
use crate::error::{HandlerError, HandlerResult};

/// The type-erased handler callable.
pub type HandlerFn = Arc<dyn Fn(HandlerContext) -> BoxFuture<'static, HandlerResult> + Send + Sync>;

/// The condition under which a registered handler is invoked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Trigger {
    /// Invoked when the command token matches the pattern or an alias.
    /// At most one command handler runs per message.
    Command,
    /// Invoked for every message with a non-empty body (fan-out).
    Body,
    /// Invoked for every text message (fan-out).
    Text,
    /// Invoked for every image message (fan-out).
    Image,
    /// Invoked for every sticker message (fan-out).
    Sticker,
}

impl Trigger {
    /// Whether a message matches this non-command trigger.
    ///
    /// Always false for [`Trigger::Command`]; command resolution is a
    /// separate, mutually exclusive path.
    pub fn matches(&self, message: &CanonicalMessage) -> bool {
        match self {
            Self::Command => false,
            Self::Body => !message.body.is_empty(),
            Self::Text => message.content_type == ContentType::Text,
            Self::Image => message.content_type == ContentType::Image,
            Self::Sticker => message.content_type == ContentType::Sticker,
        }
    }
}

/// A registered handler with its trigger attributes.
#[derive(Clone)]
pub struct HandlerSpec {
    /// Primary trigger string; unique across the registry.
    pub pattern: String,
    /// Additional trigger strings for command handlers.
    pub aliases: Vec<String>,
    /// When the handler fires.
    pub trigger: Trigger,
    /// Emoji reaction sent before a command handler is invoked.
    pub react: Option<String>,
    /// Whether the handler also fires for messages the mode gate filters
    /// out. Only meaningful for non-command triggers.
    pub ungated: bool,
    handler: HandlerFn,
}

impl HandlerSpec {
    /// Creates a command handler from an async closure.
    pub fn command<F, Fut>(pattern: impl Into<String>, f: F) -> Self
    where
        F: Fn(HandlerContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        Self::with_trigger(pattern, Trigger::Command, f)
    }

    /// Creates a handler bound to a non-command trigger.
    pub fn with_trigger<F, Fut>(pattern: impl Into<String>, trigger: Trigger, f: F) -> Self
    where
        F: Fn(HandlerContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        Self {
            pattern: pattern.into(),
            aliases: Vec::new(),
            trigger,
            react: None,
            ungated: false,
            handler: Arc::new(move |ctx| Box::pin(f(ctx))),
        }
    }

    /// Adds an alias (builder pattern).
    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        self.aliases.push(alias.into());
        self
    }

    /// Sets the pre-invocation reaction emoji (builder pattern).
    pub fn react(mut self, emoji: impl Into<String>) -> Self {
        self.react = Some(emoji.into());
        self
    }

    /// Lets the handler fire even for mode-gated messages (builder
    /// pattern). Command resolution is never exempt from the gate.
    pub fn ungated(mut self) -> Self {
        self.ungated = true;
        self
    }

    /// Invokes the handler.
    pub fn invoke(&self, ctx: HandlerContext) -> BoxFuture<'static, HandlerResult> {
        (self.handler)(ctx)
    }
}

impl fmt::Debug for HandlerSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerSpec")
            .field("pattern", &self.pattern)
            .field("aliases", &self.aliases)
            .field("trigger", &self.trigger)
            .field("react", &self.react)
            .field("ungated", &self.ungated)
            .finish_non_exhaustive()
    }
}

/// The fixed context bundle passed to every handler invocation.
#[derive(Clone)]
pub struct HandlerContext {
    /// The dispatched message.
    pub message: Arc<CanonicalMessage>,
    /// Resolved command token, if the body began with the prefix.
    pub command: Option<String>,
    /// Whitespace-delimited tokens after the first.
    pub args: Vec<String>,
    /// The args re-joined with single spaces.
    pub arg_text: String,
    /// The configured command prefix.
    pub prefix: String,
    /// Authorization classification of the sender.
    pub auth: AuthContext,
    /// Group metadata, for group conversations.
    pub group: Option<Arc<GroupMetadata>>,
    handle: Arc<dyn TransportHandle>,
}

impl HandlerContext {
    /// Builds a context around a message and a live transport handle.
    pub fn new(
        message: Arc<CanonicalMessage>,
        command: Option<String>,
        args: Vec<String>,
        prefix: String,
        auth: AuthContext,
        group: Option<Arc<GroupMetadata>>,
        handle: Arc<dyn TransportHandle>,
    ) -> Self {
        let arg_text = args.join(" ");
        Self {
            message,
            command,
            args,
            arg_text,
            prefix,
            auth,
            group,
            handle,
        }
    }

    /// The live transport handle.
    pub fn transport(&self) -> &Arc<dyn TransportHandle> {
        &self.handle
    }

    /// Replies with text in the originating conversation, quoting the
    /// dispatched message.
    pub async fn reply(&self, text: impl Into<String>) -> Result<DeliveryAck, HandlerError> {
        let ack = self
            .handle
            .send(
                self.message.conversation_id(),
                OutboundPayload::text(text),
                SendOptions::quoting(self.message.key.clone()),
            )
            .await?;
        Ok(ack)
    }

    /// Reacts to the dispatched message with an emoji.
    pub async fn react(&self, emoji: impl Into<String>) -> Result<(), HandlerError> {
        self.handle
            .send(
                self.message.conversation_id(),
                OutboundPayload::Reaction {
                    emoji: emoji.into(),
                    key: self.message.key.clone(),
                },
                SendOptions::default(),
            )
            .await?;
        Ok(())
    }
}

impl fmt::Debug for HandlerContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerContext")
            .field("message_id", &self.message.id())
            .field("command", &self.command)
            .field("args", &self.args)
            .field("auth", &self.auth)
            .finish_non_exhaustive()
    }
}
