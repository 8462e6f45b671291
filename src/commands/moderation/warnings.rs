use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::command::SlashCommand;
use crate::context::AppContext;
use crate::error::HandlerResult;
use crate::interaction::InteractionHandle;
use crate::types::*;

const LIMIT: i64 = 10;

/// `/warnings <user>`: the most recent warnings recorded for a member.
pub struct Warnings;

#[derive(Debug, Clone, sqlx::FromRow)]
struct WarnRow {
    by_user_id: String,
    reason: Option<String>,
    date: DateTime<Utc>,
}

#[async_trait]
impl SlashCommand for Warnings {
    fn data(&self) -> ApplicationCommand {
        ApplicationCommandBuilder::chat_input("warnings", "List a member's recent warnings")
            .simple_option(CommandOptionType::User, "user", "Member to look up", true)
            .default_member_permissions(Permissions::MODERATE_MEMBERS)
            .dm_permission(false)
            .build()
    }

    async fn execute(&self, ctx: &AppContext, interaction: &InteractionHandle) -> HandlerResult {
        let Some(user_id) = interaction.data().and_then(|d| d.option_str("user")) else {
            interaction
                .reply(InteractionCallbackData::text("❌ Pick a user to look up.").ephemeral())
                .await?;
            return Ok(());
        };

        // The query can outlast the initial-response window.
        interaction.defer(true).await?;

        let rows: Vec<WarnRow> = sqlx::query_as(
            "SELECT by_user_id, reason, date FROM warns WHERE user_id = ? ORDER BY date DESC LIMIT ?",
        )
        .bind(user_id)
        .bind(LIMIT)
        .fetch_all(ctx.db.pool())
        .await?;

        let embed = warnings_embed(user_id, &rows);
        interaction
            .edit_reply(InteractionCallbackData::default().embed(embed))
            .await?;
        Ok(())
    }
}

fn warnings_embed(user_id: &str, rows: &[WarnRow]) -> Embed {
    let embed = Embed::new()
        .title("Warnings")
        .color(0xF1C40F)
        .timestamp(Utc::now().to_rfc3339());

    if rows.is_empty() {
        return embed.description(format!("<@{user_id}> has no warnings."));
    }

    let embed = embed.description(format!("Latest {} warning(s) for <@{user_id}>", rows.len()));
    rows.iter().fold(embed, |embed, row| {
        embed.field(
            row.date.format("%B %d, %Y at %H:%M UTC").to_string(),
            format!(
                "{}\n(by <@{}>)",
                row.reason.as_deref().unwrap_or("No reason provided"),
                row.by_user_id
            ),
            false,
        )
    })
}
