//! Test doubles shared by the unit tests.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Instant;

use async_trait::async_trait;
use serde_json::json;
use tracing::field::{Field, Visit};
use tracing::subscriber::DefaultGuard;
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::layer::{Context, SubscriberExt};
use tracing_subscriber::Layer;

use crate::command::CommandRegistry;
use crate::config::{CommandScope, DatabaseConfig};
use crate::context::AppContext;
use crate::error::HttpError;
use crate::http::DiscordApi;
use crate::stores::{CacheStore, Database};
use crate::types::*;

/// One recorded REST call.
#[derive(Debug, Clone)]
pub enum Sent {
    Response {
        kind: InteractionCallbackType,
        content: Option<String>,
        ephemeral: bool,
    },
    FollowUp {
        content: Option<String>,
        ephemeral: bool,
    },
    Edit {
        content: Option<String>,
    },
    Publish {
        application_id: String,
        scope: CommandScope,
        names: Vec<String>,
    },
}

/// A [`DiscordApi`] that records every call instead of sending it.
#[derive(Default)]
pub struct RecordingApi {
    sent: Mutex<Vec<Sent>>,
    fail_responses: AtomicBool,
    fail_publish: AtomicBool,
}

impl RecordingApi {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn sent(&self) -> Vec<Sent> {
        self.sent.lock().unwrap().clone()
    }

    /// Make initial responses and follow-ups fail with HTTP 500.
    pub fn fail_responses(&self, fail: bool) {
        self.fail_responses.store(fail, Ordering::SeqCst);
    }

    pub fn fail_publish(&self, fail: bool) {
        self.fail_publish.store(fail, Ordering::SeqCst);
    }

    fn record(&self, sent: Sent) {
        self.sent.lock().unwrap().push(sent);
    }

    fn server_error(route: &str) -> HttpError {
        HttpError::Api {
            status: 500,
            body: "internal error".to_string(),
            route: route.to_string(),
        }
    }

    fn message(content: Option<String>) -> Message {
        Message {
            id: "900".to_string(),
            channel_id: "800".to_string(),
            guild_id: None,
            author: User {
                id: "1".to_string(),
                username: "bot".to_string(),
                discriminator: None,
                avatar: None,
                bot: true,
                global_name: None,
            },
            content: content.unwrap_or_default(),
            timestamp: None,
            flags: None,
        }
    }
}

#[async_trait]
impl DiscordApi for RecordingApi {
    async fn bulk_overwrite_commands(
        &self,
        application_id: &str,
        scope: &CommandScope,
        commands: &[ApplicationCommand],
    ) -> Result<Vec<ApplicationCommand>, HttpError> {
        if self.fail_publish.load(Ordering::SeqCst) {
            return Err(Self::server_error("PUT /applications/commands"));
        }
        self.record(Sent::Publish {
            application_id: application_id.to_string(),
            scope: scope.clone(),
            names: commands.iter().map(|c| c.name.clone()).collect(),
        });
        Ok(commands.to_vec())
    }

    async fn create_interaction_response(
        &self,
        _interaction_id: &str,
        _interaction_token: &str,
        response: &InteractionResponse,
    ) -> Result<(), HttpError> {
        if self.fail_responses.load(Ordering::SeqCst) {
            return Err(Self::server_error("POST /interactions/callback"));
        }
        self.record(Sent::Response {
            kind: response.kind,
            content: response.data.as_ref().and_then(|d| d.content.clone()),
            ephemeral: response.data.as_ref().is_some_and(|d| d.is_ephemeral()),
        });
        Ok(())
    }

    async fn create_followup_message(
        &self,
        _application_id: &str,
        _interaction_token: &str,
        data: &InteractionCallbackData,
    ) -> Result<Message, HttpError> {
        if self.fail_responses.load(Ordering::SeqCst) {
            return Err(Self::server_error("POST /webhooks/interaction"));
        }
        self.record(Sent::FollowUp {
            content: data.content.clone(),
            ephemeral: data.is_ephemeral(),
        });
        Ok(Self::message(data.content.clone()))
    }

    async fn edit_original_interaction_response(
        &self,
        _application_id: &str,
        _interaction_token: &str,
        data: &InteractionCallbackData,
    ) -> Result<Message, HttpError> {
        self.record(Sent::Edit {
            content: data.content.clone(),
        });
        Ok(Self::message(data.content.clone()))
    }
}

/// A guild slash-command interaction for `name` with no options.
pub fn command_interaction(name: &str) -> Interaction {
    command_interaction_with(name, json!([]))
}

/// A guild slash-command interaction for `name` with raw `options`.
pub fn command_interaction_with(name: &str, options: serde_json::Value) -> Interaction {
    serde_json::from_value(json!({
        "id": "100",
        "application_id": "200",
        "type": 2,
        "token": "interaction-token",
        "guild_id": "300",
        "channel_id": "400",
        "data": { "id": "500", "name": name, "type": 1, "options": options },
        "member": {
            "user": { "id": "600", "username": "alice", "discriminator": "0", "avatar": null },
            "roles": []
        }
    }))
    .expect("valid interaction JSON")
}

/// A context whose stores are configured but never connected.
///
/// Must be called inside a tokio runtime (the MySQL pool spawns its reaper).
pub fn context(api: Arc<dyn DiscordApi>, commands: CommandRegistry) -> AppContext {
    AppContext {
        commands: Arc::new(commands),
        cache: CacheStore::open("redis://127.0.0.1:6379/").expect("valid redis url"),
        db: Database::lazy(&DatabaseConfig {
            host: "127.0.0.1".to_string(),
            port: 3306,
            user: "root".to_string(),
            password: String::new(),
            database: None,
        }),
        api,
        application_id: "200".to_string(),
        started_at: Instant::now(),
    }
}

/// Records the level and message of every event emitted on this thread.
#[derive(Clone, Default)]
pub struct LogCapture {
    events: Arc<Mutex<Vec<(Level, String)>>>,
}

impl LogCapture {
    /// Install a capture as the thread's default subscriber until the guard
    /// is dropped.
    pub fn install() -> (Self, DefaultGuard) {
        let capture = Self::default();
        let guard = tracing::subscriber::set_default(tracing_subscriber::registry().with(capture.clone()));
        (capture, guard)
    }

    /// Messages logged at exactly `level`.
    pub fn messages(&self, level: Level) -> Vec<String> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter(|(l, _)| *l == level)
            .map(|(_, m)| m.clone())
            .collect()
    }

    pub fn levels(&self) -> Vec<Level> {
        self.events.lock().unwrap().iter().map(|(l, _)| *l).collect()
    }
}

impl<S: Subscriber> Layer<S> for LogCapture {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let mut message = MessageField::default();
        event.record(&mut message);
        self.events
            .lock()
            .unwrap()
            .push((*event.metadata().level(), message.0));
    }
}

#[derive(Default)]
struct MessageField(String);

impl Visit for MessageField {
    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        if field.name() == "message" {
            self.0 = format!("{value:?}");
        }
    }
}
