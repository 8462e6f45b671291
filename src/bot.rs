//! Startup sequence and the main event loop.
//!
//! Order: stores, command registry, context, publish, listeners, gateway.
//! Each gateway event is emitted on its own task so a slow handler never
//! blocks the next event.

use std::sync::Arc;
use std::time::Instant;

use tracing::{info, warn};

use crate::binder::{EventBus, EventDefinition};
use crate::config::BotConfig;
use crate::context::AppContext;
use crate::dispatcher::InteractionDispatcher;
use crate::error::{BotError, GatewayError};
use crate::events::GatewayEvent;
use crate::gateway::{self, GatewayConfig};
use crate::http::{DiscordApi, DiscordHttpClient};
use crate::tags::Tag;
use crate::types::{ApplicationCommand, Intents};
use crate::{commands, listeners, loader, publisher, stores};

/// Gateway intents the built-in listeners need.
pub fn gateway_intents() -> Intents {
    Intents::default()
}

/// Bring the bot up and run until Ctrl-C or the gateway gives up.
pub async fn start(config: BotConfig) -> Result<(), BotError> {
    let started_at = Instant::now();
    let stores = stores::bootstrap(&config).await?;
    let api: Arc<dyn DiscordApi> = Arc::new(DiscordHttpClient::new(&config.token));

    let loaded = loader::load_commands(commands::catalog());
    let payload = loaded.payload();
    let ctx = Arc::new(AppContext {
        commands: Arc::new(loaded.registry),
        cache: stores.cache,
        db: stores.db,
        api: api.clone(),
        application_id: config.application_id.clone(),
        started_at,
    });

    publish(api.as_ref(), &config, &payload).await;

    let bus = Arc::new(EventBus::new());
    bus.bind_all(loader::load_listeners(listeners::catalog()).definitions)
        .await;
    bus.subscribe(EventDefinition::new(Arc::new(InteractionDispatcher)))
        .await;

    let gw = gateway::connect(GatewayConfig {
        token: config.token.clone(),
        intents: gateway_intents(),
        shard: None,
    });
    info!(tag = %Tag::Gateway, "gateway driver started, entering event loop");

    let result = run_event_loop(ctx, bus, gw.events).await;
    gw.driver.abort();
    result
}

/// Publish `payload`, returning whether the platform accepted it.
///
/// A failed publish leaves the previous remote set in place, so startup
/// carries on either way.
async fn publish(api: &dyn DiscordApi, config: &BotConfig, payload: &[ApplicationCommand]) -> bool {
    let published = publisher::publish_commands(api, &config.application_id, &config.command_scope, payload)
        .await
        .is_ok();
    if !published {
        warn!(tag = %Tag::Commands, "continuing with the previously published command set");
    }
    published
}

async fn run_event_loop(
    ctx: Arc<AppContext>,
    bus: Arc<EventBus>,
    events: async_channel::Receiver<GatewayEvent>,
) -> Result<(), BotError> {
    loop {
        tokio::select! {
            event = events.recv() => {
                let Ok(event) = event else {
                    warn!(tag = %Tag::Gateway, "event stream closed");
                    return Err(GatewayError::Closed.into());
                };
                let (ctx, bus) = (ctx.clone(), bus.clone());
                tokio::spawn(async move {
                    bus.emit(&ctx, &event).await;
                });
            }
            _ = tokio::signal::ctrl_c() => {
                info!("shutdown signal received");
                return Ok(());
            }
        }
    }
}
