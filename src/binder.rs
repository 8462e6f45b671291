//! Event listeners and the bus that routes gateway events to them.
//!
//! Listeners subscribe by dispatch event name. A `once` listener is removed
//! from the table in the same critical section that selects it, so it runs
//! at most once even when two events of its kind arrive together.

use std::sync::Arc;

use async_lock::Mutex;
use async_trait::async_trait;
use futures_util::future::join_all;
use tracing::{error, info, warn};

use crate::context::AppContext;
use crate::error::HandlerResult;
use crate::events::{is_known_dispatch_event, GatewayEvent};
use crate::tags::Tag;

/// A handler bound to one dispatch event.
#[async_trait]
pub trait EventListener: Send + Sync {
    /// Dispatch event identifier, e.g. `READY` or `GUILD_MEMBER_ADD`.
    fn name(&self) -> &str;

    /// Fire only for the first occurrence of the event.
    fn once(&self) -> bool {
        false
    }

    async fn execute(&self, ctx: &AppContext, event: &GatewayEvent) -> HandlerResult;
}

/// A listener together with its subscription parameters.
#[derive(Clone)]
pub struct EventDefinition {
    pub name: String,
    pub once: bool,
    pub listener: Arc<dyn EventListener>,
}

impl EventDefinition {
    pub fn new(listener: Arc<dyn EventListener>) -> Self {
        Self {
            name: listener.name().to_string(),
            once: listener.once(),
            listener,
        }
    }
}

impl std::fmt::Debug for EventDefinition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventDefinition")
            .field("name", &self.name)
            .field("once", &self.once)
            .finish()
    }
}

/// Subscription table for gateway dispatch events.
#[derive(Default)]
pub struct EventBus {
    subscriptions: Mutex<Vec<EventDefinition>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe `definition`. Returns `false` (and logs) if its event name
    /// is not one the gateway delivers.
    pub async fn subscribe(&self, definition: EventDefinition) -> bool {
        if !is_known_dispatch_event(&definition.name) {
            warn!(tag = %Tag::Events, event = %definition.name, "unknown event name; listener not bound");
            return false;
        }
        self.subscriptions.lock().await.push(definition);
        true
    }

    /// Subscribe every definition, returning how many were bound.
    pub async fn bind_all(&self, definitions: impl IntoIterator<Item = EventDefinition>) -> usize {
        let mut bound = 0;
        for definition in definitions {
            if self.subscribe(definition).await {
                bound += 1;
            }
        }
        info!(tag = %Tag::Events, bound, "all event handlers bound");
        bound
    }

    /// Number of live subscriptions for `name`.
    pub async fn subscription_count(&self, name: &str) -> usize {
        self.subscriptions
            .lock()
            .await
            .iter()
            .filter(|d| d.name == name)
            .count()
    }

    /// Run every listener subscribed to `event` and return how many ran.
    ///
    /// Listener errors are logged and never propagate.
    pub async fn emit(&self, ctx: &AppContext, event: &GatewayEvent) -> usize {
        let Some(name) = event.name() else {
            return 0;
        };

        let selected = {
            let mut subscriptions = self.subscriptions.lock().await;
            let mut selected = Vec::new();
            subscriptions.retain(|d| {
                if d.name != name {
                    return true;
                }
                selected.push(d.clone());
                !d.once
            });
            selected
        };

        let runs = selected.iter().map(|d| async move {
            if let Err(e) = d.listener.execute(ctx, event).await {
                error!(tag = %Tag::Events, event = %d.name, error = %e, "event handler failed");
            }
        });
        join_all(runs).await;

        selected.len()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::command::CommandRegistry;
    use crate::testing::{context, RecordingApi};
    use crate::types::GuildMemberAdd;

    struct Counter {
        event: &'static str,
        once: bool,
        hits: AtomicUsize,
        fail: bool,
    }

    impl Counter {
        fn new(event: &'static str, once: bool) -> Arc<Self> {
            Arc::new(Self {
                event,
                once,
                hits: AtomicUsize::new(0),
                fail: false,
            })
        }

        fn failing(event: &'static str) -> Arc<Self> {
            Arc::new(Self {
                event,
                once: false,
                hits: AtomicUsize::new(0),
                fail: true,
            })
        }

        fn hits(&self) -> usize {
            self.hits.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl EventListener for Counter {
        fn name(&self) -> &str {
            self.event
        }

        fn once(&self) -> bool {
            self.once
        }

        async fn execute(&self, _ctx: &AppContext, _event: &GatewayEvent) -> HandlerResult {
            self.hits.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                anyhow::bail!("listener exploded");
            }
            Ok(())
        }
    }

    fn member_add() -> GatewayEvent {
        let member: GuildMemberAdd = serde_json::from_value(serde_json::json!({
            "guild_id": "1",
            "user": { "id": "2", "username": "bob", "discriminator": "0", "avatar": null },
            "roles": []
        }))
        .unwrap();
        GatewayEvent::GuildMemberAdd(member)
    }

    fn ready_dispatch() -> GatewayEvent {
        GatewayEvent::Dispatch {
            name: "READY".to_string(),
            data: None,
        }
    }

    #[tokio::test]
    async fn once_listener_fires_exactly_once() {
        let ctx = context(RecordingApi::new(), CommandRegistry::default());
        let bus = EventBus::new();
        let ready = Counter::new("READY", true);
        bus.subscribe(EventDefinition::new(ready.clone())).await;

        assert_eq!(bus.emit(&ctx, &ready_dispatch()).await, 1);
        assert_eq!(bus.emit(&ctx, &ready_dispatch()).await, 0);
        assert_eq!(ready.hits(), 1);
        assert_eq!(bus.subscription_count("READY").await, 0);
    }

    #[tokio::test]
    async fn on_listener_fires_every_time() {
        let ctx = context(RecordingApi::new(), CommandRegistry::default());
        let bus = EventBus::new();
        let joins = Counter::new("GUILD_MEMBER_ADD", false);
        bus.subscribe(EventDefinition::new(joins.clone())).await;

        for _ in 0..3 {
            bus.emit(&ctx, &member_add()).await;
        }
        assert_eq!(joins.hits(), 3);
    }

    #[tokio::test]
    async fn events_only_reach_their_subscribers() {
        let ctx = context(RecordingApi::new(), CommandRegistry::default());
        let bus = EventBus::new();
        let ready = Counter::new("READY", false);
        let joins = Counter::new("GUILD_MEMBER_ADD", false);
        bus.bind_all([
            EventDefinition::new(ready.clone()),
            EventDefinition::new(joins.clone()),
        ])
        .await;

        bus.emit(&ctx, &member_add()).await;
        assert_eq!((ready.hits(), joins.hits()), (0, 1));
    }

    #[tokio::test]
    async fn failing_listener_does_not_stop_others() {
        let ctx = context(RecordingApi::new(), CommandRegistry::default());
        let bus = EventBus::new();
        let bad = Counter::failing("READY");
        let good = Counter::new("READY", false);
        bus.bind_all([EventDefinition::new(bad.clone()), EventDefinition::new(good.clone())])
            .await;

        assert_eq!(bus.emit(&ctx, &ready_dispatch()).await, 2);
        assert_eq!(bad.hits(), 1);
        assert_eq!(good.hits(), 1);
    }

    #[tokio::test]
    async fn unknown_event_names_are_not_bound() {
        let bus = EventBus::new();
        let stray = Counter::new("NOT_A_REAL_EVENT", false);
        assert!(!bus.subscribe(EventDefinition::new(stray)).await);
        assert_eq!(bus.subscription_count("NOT_A_REAL_EVENT").await, 0);
    }

    #[tokio::test]
    async fn non_dispatch_events_reach_nobody() {
        let ctx = context(RecordingApi::new(), CommandRegistry::default());
        let bus = EventBus::new();
        bus.subscribe(EventDefinition::new(Counter::new("READY", false))).await;
        assert_eq!(bus.emit(&ctx, &GatewayEvent::HeartbeatAck).await, 0);
    }
}
