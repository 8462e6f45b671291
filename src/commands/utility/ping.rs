use async_trait::async_trait;
use tracing::warn;

use crate::command::SlashCommand;
use crate::context::AppContext;
use crate::error::HandlerResult;
use crate::interaction::InteractionHandle;
use crate::tags::Tag;
use crate::types::*;

/// `/ping`: replies with the cache-store round-trip time.
pub struct Ping;

#[async_trait]
impl SlashCommand for Ping {
    fn data(&self) -> ApplicationCommand {
        ApplicationCommandBuilder::chat_input("ping", "Check bot latency").build()
    }

    async fn execute(&self, ctx: &AppContext, interaction: &InteractionHandle) -> HandlerResult {
        let text = match ctx.cache.ping().await {
            Ok(rtt) => format!("🏓 Pong! Cache latency: {}ms", rtt.as_millis()),
            Err(e) => {
                warn!(tag = %Tag::Redis, error = %e, "ping failed");
                "🏓 Pong! (cache unreachable)".to_string()
            }
        };
        interaction.reply(InteractionCallbackData::text(text)).await?;
        Ok(())
    }
}
