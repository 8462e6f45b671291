use tracing::{error, info};

use crate::config::CommandScope;
use crate::error::HttpError;
use crate::http::DiscordApi;
use crate::tags::Tag;
use crate::types::ApplicationCommand;

/// Replace the remote command set for `scope` with `payload`.
///
/// Returns how many commands the platform accepted. The caller decides
/// whether a failure matters; startup only logs it.
pub async fn publish_commands(
    api: &dyn DiscordApi,
    application_id: &str,
    scope: &CommandScope,
    payload: &[ApplicationCommand],
) -> Result<usize, HttpError> {
    info!(
        tag = %Tag::Commands,
        count = payload.len(),
        scope = ?scope,
        "started refreshing application (/) commands"
    );

    match api.bulk_overwrite_commands(application_id, scope, payload).await {
        Ok(accepted) => {
            info!(tag = %Tag::Commands, count = accepted.len(), "successfully reloaded application (/) commands");
            Ok(accepted.len())
        }
        Err(e) => {
            error!(tag = %Tag::Commands, error = %e, "failed to reload application (/) commands");
            Err(e)
        }
    }
}
