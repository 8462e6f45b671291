use async_trait::async_trait;
use tracing::info;

use crate::binder::EventListener;
use crate::context::AppContext;
use crate::error::HandlerResult;
use crate::events::GatewayEvent;
use crate::tags::Tag;

/// Logs the bot identity once the first session is established.
pub struct Ready;

#[async_trait]
impl EventListener for Ready {
    fn name(&self) -> &str {
        "READY"
    }

    fn once(&self) -> bool {
        true
    }

    async fn execute(&self, ctx: &AppContext, event: &GatewayEvent) -> HandlerResult {
        if let GatewayEvent::Ready(ready) = event {
            info!(
                tag = %Tag::Events,
                user = %ready.user.tag(),
                guilds = ready.guilds.len(),
                commands = ctx.commands.len(),
                "ready! logged in"
            );
        }
        Ok(())
    }
}
