//! A received interaction plus the means to answer it.
//!
//! The platform allows exactly one initial response per interaction; after
//! that, further messages must go out as follow-ups. [`InteractionHandle`]
//! tracks which phase the interaction is in so callers can pick the right
//! call, the same way the dispatcher does when a handler fails.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

use crate::error::InteractionError;
use crate::http::DiscordApi;
use crate::types::*;

/// Acknowledgement phase of an interaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum AckState {
    Pending = 0,
    Deferred = 1,
    Replied = 2,
}

impl AckState {
    fn from_u8(raw: u8) -> Self {
        match raw {
            1 => AckState::Deferred,
            2 => AckState::Replied,
            _ => AckState::Pending,
        }
    }
}

/// An inbound interaction with reply/defer/follow-up operations.
pub struct InteractionHandle {
    interaction: Interaction,
    api: Arc<dyn DiscordApi>,
    state: AtomicU8,
}

impl InteractionHandle {
    pub fn new(interaction: Interaction, api: Arc<dyn DiscordApi>) -> Self {
        Self {
            interaction,
            api,
            state: AtomicU8::new(AckState::Pending as u8),
        }
    }

    pub fn interaction(&self) -> &Interaction {
        &self.interaction
    }

    /// Command data of a command interaction.
    pub fn data(&self) -> Option<&InteractionData> {
        self.interaction.data.as_ref()
    }

    pub fn command_name(&self) -> Option<&str> {
        self.interaction.command_name()
    }

    pub fn author(&self) -> Option<&User> {
        self.interaction.author()
    }

    pub fn state(&self) -> AckState {
        AckState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// An initial reply has been sent (directly or by a follow-up).
    pub fn replied(&self) -> bool {
        self.state() == AckState::Replied
    }

    /// A deferred response is pending.
    pub fn deferred(&self) -> bool {
        self.state() == AckState::Deferred
    }

    /// Claim the initial-response slot, moving to `next`.
    fn acknowledge(&self, next: AckState) -> Result<(), InteractionError> {
        self.state
            .compare_exchange(
                AckState::Pending as u8,
                next as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .map(|_| ())
            .map_err(|_| InteractionError::AlreadyAcknowledged)
    }

    /// Send the initial response.
    pub async fn reply(&self, data: InteractionCallbackData) -> Result<(), InteractionError> {
        self.respond(
            AckState::Replied,
            InteractionResponse {
                kind: InteractionCallbackType::ChannelMessageWithSource,
                data: Some(data),
            },
        )
        .await
    }

    /// Acknowledge now and answer later with [`follow_up`](Self::follow_up)
    /// or [`edit_reply`](Self::edit_reply).
    pub async fn defer(&self, ephemeral: bool) -> Result<(), InteractionError> {
        let data = ephemeral.then(|| InteractionCallbackData::default().ephemeral());
        self.respond(
            AckState::Deferred,
            InteractionResponse {
                kind: InteractionCallbackType::DeferredChannelMessageWithSource,
                data,
            },
        )
        .await
    }

    async fn respond(
        &self,
        next: AckState,
        response: InteractionResponse,
    ) -> Result<(), InteractionError> {
        self.acknowledge(next)?;
        let sent = self
            .api
            .create_interaction_response(&self.interaction.id, &self.interaction.token, &response)
            .await;
        if sent.is_err() {
            // The slot was never used; let a later reply try again.
            self.state.store(AckState::Pending as u8, Ordering::Release);
        }
        Ok(sent?)
    }

    /// Send an additional message after the interaction was acknowledged.
    pub async fn follow_up(&self, data: InteractionCallbackData) -> Result<Message, InteractionError> {
        let message = self
            .api
            .create_followup_message(&self.interaction.application_id, &self.interaction.token, &data)
            .await?;
        self.state.store(AckState::Replied as u8, Ordering::Release);
        Ok(message)
    }

    /// Replace the content of the initial (or deferred) response.
    pub async fn edit_reply(&self, data: InteractionCallbackData) -> Result<Message, InteractionError> {
        let message = self
            .api
            .edit_original_interaction_response(
                &self.interaction.application_id,
                &self.interaction.token,
                &data,
            )
            .await?;
        self.state.store(AckState::Replied as u8, Ordering::Release);
        Ok(message)
    }
}

impl std::fmt::Debug for InteractionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InteractionHandle")
            .field("id", &self.interaction.id)
            .field("command", &self.interaction.command_name())
            .field("state", &self.state())
            .finish()
    }
}
