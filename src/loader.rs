//! Turns the compiled-in command and listener catalogs into a registry and a
//! list of event definitions.
//!
//! Loading is fail-open per unit: a module with an invalid schema or an
//! unknown event name is skipped with a warning and the rest still load.

use std::sync::Arc;

use thiserror::Error;
use tracing::{info, warn};

use crate::binder::{EventDefinition, EventListener};
use crate::command::{validate_schema, CommandDefinition, CommandRegistry, SchemaError, SlashCommand};
use crate::events::is_known_dispatch_event;
use crate::tags::Tag;
use crate::types::ApplicationCommand;

/// One entry of the command catalog.
pub struct CommandModule {
    /// Where the command lives, e.g. `utility/ping`.
    pub source: &'static str,
    pub command: Arc<dyn SlashCommand>,
}

impl CommandModule {
    pub fn new(source: &'static str, command: impl SlashCommand + 'static) -> Self {
        Self {
            source,
            command: Arc::new(command),
        }
    }
}

/// One entry of the listener catalog.
pub struct ListenerModule {
    pub source: &'static str,
    pub listener: Arc<dyn EventListener>,
}

impl ListenerModule {
    pub fn new(source: &'static str, listener: impl EventListener + 'static) -> Self {
        Self {
            source,
            listener: Arc::new(listener),
        }
    }
}

/// Why a module was not loaded.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SkipReason {
    #[error(transparent)]
    InvalidSchema(#[from] SchemaError),

    #[error("unknown event name `{0}`")]
    UnknownEvent(String),
}

/// Per-module result of a load pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadOutcome {
    Loaded { source: String, name: String },
    Skipped { source: String, reason: SkipReason },
}

impl LoadOutcome {
    pub fn is_loaded(&self) -> bool {
        matches!(self, LoadOutcome::Loaded { .. })
    }
}

/// Result of loading the command catalog.
#[derive(Debug)]
pub struct LoadedCommands {
    pub registry: CommandRegistry,
    pub outcomes: Vec<LoadOutcome>,
}

impl LoadedCommands {
    /// The replace-all publish payload, one schema per registry entry.
    pub fn payload(&self) -> Vec<ApplicationCommand> {
        self.registry.schemas()
    }
}

/// Result of loading the listener catalog.
#[derive(Debug)]
pub struct LoadedListeners {
    pub definitions: Vec<EventDefinition>,
    pub outcomes: Vec<LoadOutcome>,
}

/// Validate each command module and build the registry.
///
/// On a name collision the later module wins; the entry keeps the position of
/// the first one.
pub fn load_commands(modules: impl IntoIterator<Item = CommandModule>) -> LoadedCommands {
    info!(tag = %Tag::Commands, "loading command handlers");

    let mut builder = CommandRegistry::builder();
    let mut outcomes = Vec::new();

    for module in modules {
        let schema = module.command.data();
        if let Err(e) = validate_schema(&schema) {
            warn!(tag = %Tag::Commands, source = module.source, reason = %e, "skipping command module");
            outcomes.push(LoadOutcome::Skipped {
                source: module.source.to_string(),
                reason: e.into(),
            });
            continue;
        }

        let name = schema.name.clone();
        let replaced = builder.insert(CommandDefinition {
            schema,
            handler: module.command,
        });
        if replaced.is_some() {
            warn!(tag = %Tag::Commands, command = %name, source = module.source, "duplicate command name; later module wins");
        }
        outcomes.push(LoadOutcome::Loaded {
            source: module.source.to_string(),
            name,
        });
    }

    let registry = builder.build();
    if registry.is_empty() {
        warn!(tag = %Tag::Commands, "no command handlers loaded");
    }
    info!(tag = %Tag::Commands, count = registry.len(), "all command handlers loaded");
    LoadedCommands { registry, outcomes }
}

/// Validate each listener module and produce its event definition.
pub fn load_listeners(modules: impl IntoIterator<Item = ListenerModule>) -> LoadedListeners {
    info!(tag = %Tag::Events, "loading event handlers");

    let mut definitions = Vec::new();
    let mut outcomes = Vec::new();

    for module in modules {
        let definition = EventDefinition::new(module.listener);
        if !is_known_dispatch_event(&definition.name) {
            warn!(tag = %Tag::Events, source = module.source, event = %definition.name, "skipping event module");
            outcomes.push(LoadOutcome::Skipped {
                source: module.source.to_string(),
                reason: SkipReason::UnknownEvent(definition.name),
            });
            continue;
        }
        outcomes.push(LoadOutcome::Loaded {
            source: module.source.to_string(),
            name: definition.name.clone(),
        });
        definitions.push(definition);
    }

    info!(tag = %Tag::Events, count = definitions.len(), "all event handlers loaded");
    LoadedListeners { definitions, outcomes }
}
