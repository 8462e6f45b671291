use async_trait::async_trait;
use tracing::info;

use crate::command::SlashCommand;
use crate::context::AppContext;
use crate::error::HandlerResult;
use crate::interaction::InteractionHandle;
use crate::tags::Tag;
use crate::types::*;

const DEFAULT_REASON: &str = "No reason provided";

/// `/warn <user> [reason]`: records a warning in the `warns` table.
pub struct Warn;

#[derive(Debug, PartialEq, Eq)]
struct WarnRequest {
    user_id: Snowflake,
    by_user_id: Snowflake,
    reason: String,
}

/// Pull the target, moderator and reason out of the interaction, or return
/// the message to show the moderator instead.
fn parse_request(interaction: &Interaction) -> Result<WarnRequest, &'static str> {
    if interaction.guild_id.is_none() {
        return Err("❌ This command only works in a server.");
    }
    let data = interaction.data.as_ref().ok_or("❌ Missing command data.")?;
    let user_id = data.option_str("user").ok_or("❌ Pick a user to warn.")?;
    let by_user_id = interaction
        .author()
        .map(|u| u.id.clone())
        .ok_or("❌ Couldn't determine who you are.")?;
    if user_id == by_user_id {
        return Err("❌ You can't warn yourself.");
    }
    let reason = data
        .option_str("reason")
        .map(str::trim)
        .filter(|r| !r.is_empty())
        .unwrap_or(DEFAULT_REASON);

    Ok(WarnRequest {
        user_id: user_id.to_string(),
        by_user_id,
        reason: reason.to_string(),
    })
}

#[async_trait]
impl SlashCommand for Warn {
    fn data(&self) -> ApplicationCommand {
        ApplicationCommandBuilder::chat_input("warn", "Warn a member")
            .simple_option(CommandOptionType::User, "user", "Member to warn", true)
            .simple_option(CommandOptionType::String, "reason", "Why they are being warned", false)
            .default_member_permissions(Permissions::MODERATE_MEMBERS)
            .dm_permission(false)
            .build()
    }

    async fn execute(&self, ctx: &AppContext, interaction: &InteractionHandle) -> HandlerResult {
        let request = match parse_request(interaction.interaction()) {
            Ok(request) => request,
            Err(message) => {
                interaction
                    .reply(InteractionCallbackData::text(message).ephemeral())
                    .await?;
                return Ok(());
            }
        };

        sqlx::query("INSERT INTO warns (user_id, by_user_id, reason) VALUES (?, ?, ?)")
            .bind(&request.user_id)
            .bind(&request.by_user_id)
            .bind(&request.reason)
            .execute(ctx.db.pool())
            .await?;
        info!(
            tag = %Tag::Mysql,
            user = %request.user_id,
            by = %request.by_user_id,
            "warning recorded"
        );

        let text = format!("⚠️ Warned <@{}>: {}", request.user_id, request.reason);
        interaction
            .reply(InteractionCallbackData::text(text).ephemeral())
            .await?;
        Ok(())
    }
}
