//! Routes slash-command interactions to their registered handler.
//!
//! The dispatcher itself never replies on success. When a handler fails it
//! sends one ephemeral error message: as a follow-up if the interaction was
//! already answered or deferred, otherwise as the initial reply.

use std::panic::AssertUnwindSafe;

use async_trait::async_trait;
use futures_util::FutureExt;
use tracing::{debug, error, warn};

use crate::binder::EventListener;
use crate::context::AppContext;
use crate::error::HandlerResult;
use crate::events::GatewayEvent;
use crate::interaction::{AckState, InteractionHandle};
use crate::tags::Tag;
use crate::types::InteractionCallbackData;

/// Sent to the user when a command handler fails.
pub const ERROR_REPLY: &str = "There was an error while executing this command!";

/// Which channel the error message went out on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorReply {
    Initial,
    FollowUp,
}

/// What happened to one interaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// Not a chat-input command.
    Ignored,
    /// No handler registered under this name. Nothing is sent.
    UnknownCommand { name: String },
    Completed { name: String },
    /// The handler failed. `reply` is `None` if the error message could not
    /// be delivered either.
    Failed {
        name: String,
        error: String,
        reply: Option<ErrorReply>,
    },
}

/// Handles `INTERACTION_CREATE`.
#[derive(Debug, Default, Clone, Copy)]
pub struct InteractionDispatcher;

impl InteractionDispatcher {
    pub async fn dispatch(&self, ctx: &AppContext, handle: &InteractionHandle) -> DispatchOutcome {
        if !handle.interaction().is_chat_input_command() {
            return DispatchOutcome::Ignored;
        }
        let Some(name) = handle.command_name().map(str::to_string) else {
            return DispatchOutcome::Ignored;
        };

        let Some(definition) = ctx.commands.get(&name) else {
            warn!(tag = %Tag::Commands, command = %name, "no command matching {name} was found");
            return DispatchOutcome::UnknownCommand { name };
        };

        debug!(tag = %Tag::Commands, command = %name, "executing command");
        let run = AssertUnwindSafe(definition.handler.execute(ctx, handle)).catch_unwind();
        let error = match run.await {
            Ok(Ok(())) => return DispatchOutcome::Completed { name },
            Ok(Err(e)) => format!("{e:#}"),
            Err(_) => "handler panicked".to_string(),
        };
        error!(tag = %Tag::Commands, command = %name, error = %error, "command failed");

        let reply = send_error_reply(handle).await;
        DispatchOutcome::Failed { name, error, reply }
    }
}

async fn send_error_reply(handle: &InteractionHandle) -> Option<ErrorReply> {
    let message = InteractionCallbackData::text(ERROR_REPLY).ephemeral();
    let (channel, sent) = match handle.state() {
        AckState::Pending => (ErrorReply::Initial, handle.reply(message).await.map(|_| ())),
        AckState::Deferred | AckState::Replied => {
            (ErrorReply::FollowUp, handle.follow_up(message).await.map(|_| ()))
        }
    };
    match sent {
        Ok(()) => Some(channel),
        Err(e) => {
            warn!(tag = %Tag::Commands, error = %e, "could not deliver error reply");
            None
        }
    }
}

#[async_trait]
impl EventListener for InteractionDispatcher {
    fn name(&self) -> &str {
        "INTERACTION_CREATE"
    }

    async fn execute(&self, ctx: &AppContext, event: &GatewayEvent) -> HandlerResult {
        if let GatewayEvent::InteractionCreate(interaction) = event {
            let handle = InteractionHandle::new(interaction.clone(), ctx.api.clone());
            self.dispatch(ctx, &handle).await;
        }
        Ok(())
    }
}
