use async_trait::async_trait;
use tracing::info;

use crate::binder::EventListener;
use crate::context::AppContext;
use crate::error::HandlerResult;
use crate::events::GatewayEvent;
use crate::tags::Tag;

/// Counts joins per guild in the cache store.
pub struct MemberJoin;

fn join_counter_key(guild_id: &str) -> String {
    format!("guild:{guild_id}:joins")
}

#[async_trait]
impl EventListener for MemberJoin {
    fn name(&self) -> &str {
        "GUILD_MEMBER_ADD"
    }

    async fn execute(&self, ctx: &AppContext, event: &GatewayEvent) -> HandlerResult {
        let GatewayEvent::GuildMemberAdd(join) = event else {
            return Ok(());
        };
        let user = join
            .member
            .user
            .as_ref()
            .map(|u| u.tag())
            .unwrap_or_else(|| "<unknown>".to_string());

        let total = ctx.cache.incr(&join_counter_key(&join.guild_id), 1).await?;
        info!(tag = %Tag::Events, guild = %join.guild_id, user = %user, total, "member joined");
        Ok(())
    }
}
