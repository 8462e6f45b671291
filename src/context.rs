use std::sync::Arc;
use std::time::Instant;

use crate::command::CommandRegistry;
use crate::http::DiscordApi;
use crate::stores::{CacheStore, Database};
use crate::types::Snowflake;

/// Shared state handed to every command and event handler.
///
/// Built once after the stores are open and the command registry is loaded.
/// Nothing in here is mutated after startup.
#[derive(Clone)]
pub struct AppContext {
    pub commands: Arc<CommandRegistry>,
    pub cache: CacheStore,
    pub db: Database,
    pub api: Arc<dyn DiscordApi>,
    pub application_id: Snowflake,
    pub started_at: Instant,
}

impl std::fmt::Debug for AppContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppContext")
            .field("commands", &self.commands)
            .field("cache", &self.cache)
            .field("application_id", &self.application_id)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use static_assertions::assert_impl_all;

    assert_impl_all!(AppContext: Send, Sync, Clone);

    #[tokio::test]
    async fn clones_share_the_registry() {
        let ctx = crate::testing::context(crate::testing::RecordingApi::new(), CommandRegistry::default());
        let clone = ctx.clone();
        assert!(Arc::ptr_eq(&ctx.commands, &clone.commands));
    }
}
