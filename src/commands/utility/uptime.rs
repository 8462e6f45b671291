use std::time::Duration;

use async_trait::async_trait;

use crate::command::SlashCommand;
use crate::context::AppContext;
use crate::error::HandlerResult;
use crate::interaction::InteractionHandle;
use crate::types::*;

/// `/uptime`: how long the process has been running.
pub struct Uptime;

#[async_trait]
impl SlashCommand for Uptime {
    fn data(&self) -> ApplicationCommand {
        ApplicationCommandBuilder::chat_input("uptime", "See how long the bot has been running").build()
    }

    async fn execute(&self, ctx: &AppContext, interaction: &InteractionHandle) -> HandlerResult {
        let text = format_uptime(ctx.started_at.elapsed());
        interaction.reply(InteractionCallbackData::text(text)).await?;
        Ok(())
    }
}

fn format_uptime(elapsed: Duration) -> String {
    let secs = elapsed.as_secs();
    let (days, hours, minutes, seconds) = (secs / 86_400, (secs % 86_400) / 3600, (secs % 3600) / 60, secs % 60);
    if days > 0 {
        format!("⏱️ Bot uptime: {days}d {hours}h {minutes}m {seconds}s")
    } else {
        format!("⏱️ Bot uptime: {hours}h {minutes}m {seconds}s")
    }
}
