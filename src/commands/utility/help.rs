use async_trait::async_trait;

use crate::command::{CommandRegistry, SlashCommand};
use crate::context::AppContext;
use crate::error::HandlerResult;
use crate::interaction::InteractionHandle;
use crate::types::*;

/// `/help`: lists every registered command.
pub struct Help;

#[async_trait]
impl SlashCommand for Help {
    fn data(&self) -> ApplicationCommand {
        ApplicationCommandBuilder::chat_input("help", "Show available commands").build()
    }

    async fn execute(&self, ctx: &AppContext, interaction: &InteractionHandle) -> HandlerResult {
        let text = help_text(&ctx.commands);
        interaction
            .reply(InteractionCallbackData::text(text).ephemeral())
            .await?;
        Ok(())
    }
}

fn help_text(registry: &CommandRegistry) -> String {
    let mut text = String::from("🤖 **Available Commands:**");
    for def in registry.iter() {
        text.push_str(&format!("\n• `/{}` — {}", def.name(), def.schema.description));
    }
    text
}
