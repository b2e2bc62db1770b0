//! Built-in handlers shipped with every deployment.

use tracing::debug;

use crate::error::HandlerResult;
use crate::handler::{HandlerContext, HandlerSpec, Trigger};

/// `jid`: replies with the identifier of the originating conversation.
///
/// Useful when wiring a new group or contact into configuration.
pub fn jid_command() -> HandlerSpec {
    HandlerSpec::command("jid", |ctx: HandlerContext| async move {
        ctx.reply(ctx.message.conversation_id()).await?;
        Ok(())
    })
}

/// Confirms interactive copy-button taps.
///
/// Tapping the copy button on a verification message surfaces as a plain
/// body of the form `copy_<code>`; this handler acknowledges the tap so the
/// user knows the code reached their clipboard. Registered ungated: OTP
/// recipients are rarely in the operator set, so the acknowledgement must
/// survive the mode gate.
pub fn copy_confirmation() -> HandlerSpec {
    HandlerSpec::with_trigger("copy-confirm", Trigger::Body, |ctx: HandlerContext| async move {
        let Some(code) = ctx.message.body.strip_prefix("copy_") else {
            return Ok(());
        };
        debug!(sender = %ctx.auth.sender_number, "Copy button acknowledged");
        ctx.reply(format!("✅ OTP code {code} copied successfully!"))
            .await?;
        Ok(())
    })
    .ungated()
}

/// Reacts to every message from a specific number with a fixed emoji.
pub fn owner_react(number: impl Into<String>, emoji: impl Into<String>) -> HandlerSpec {
    let number = number.into();
    let emoji = emoji.into();
    HandlerSpec::with_trigger("owner-react", Trigger::Body, move |ctx: HandlerContext| {
        let number = number.clone();
        let emoji = emoji.clone();
        async move {
            if ctx.auth.sender_number == number {
                ctx.react(emoji).await?;
            }
            Ok(())
        }
    })
}

/// The default registration list.
pub fn default_handlers() -> Vec<HandlerSpec> {
    vec![jid_command(), copy_confirmation()]
}
