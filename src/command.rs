//! Slash-command capability trait, schema validation and the command registry.
//!
//! The registry is built once at startup and read-only afterwards: build it
//! with [`CommandRegistryBuilder`], then share the result behind an `Arc`.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use crate::context::AppContext;
use crate::error::HandlerResult;
use crate::interaction::InteractionHandle;
use crate::types::{ApplicationCommand, CommandType};

/// A slash command: a declarative schema plus an executor.
#[async_trait]
pub trait SlashCommand: Send + Sync {
    /// The schema published to the remote command registry.
    fn data(&self) -> ApplicationCommand;

    /// Run the command. The handler owns every user-visible reply.
    async fn execute(&self, ctx: &AppContext, interaction: &InteractionHandle) -> HandlerResult;
}

// ---------------------------------------------------------------------------
// Schema validation
// ---------------------------------------------------------------------------

const MAX_NAME_LEN: usize = 32;
const MAX_DESCRIPTION_LEN: usize = 100;
const MAX_OPTIONS: usize = 25;

/// Why a command schema would be rejected by the platform.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaError {
    #[error("invalid command name `{0}`")]
    InvalidName(String),

    #[error("command `{name}` needs a description of 1-100 characters")]
    InvalidDescription { name: String },

    #[error("command `{name}` has {count} options (max 25)")]
    TooManyOptions { name: String, count: usize },

    #[error("command `{command}` has an invalid option `{option}`")]
    InvalidOption { command: String, option: String },
}

/// 1-32 characters; lowercase letters, digits, `-`, `_` or `'`.
pub fn is_valid_command_name(name: &str) -> bool {
    let len = name.chars().count();
    (1..=MAX_NAME_LEN).contains(&len)
        && name.chars().all(|c| {
            matches!(c, '-' | '_' | '\'') || c.is_numeric() || (c.is_alphabetic() && !c.is_uppercase())
        })
}

fn is_valid_description(description: &str) -> bool {
    (1..=MAX_DESCRIPTION_LEN).contains(&description.chars().count())
}

/// Check `schema` against the platform's registration rules.
pub fn validate_schema(schema: &ApplicationCommand) -> Result<(), SchemaError> {
    if !is_valid_command_name(&schema.name) {
        return Err(SchemaError::InvalidName(schema.name.clone()));
    }
    if schema.kind == CommandType::ChatInput && !is_valid_description(&schema.description) {
        return Err(SchemaError::InvalidDescription {
            name: schema.name.clone(),
        });
    }
    if schema.options.len() > MAX_OPTIONS {
        return Err(SchemaError::TooManyOptions {
            name: schema.name.clone(),
            count: schema.options.len(),
        });
    }
    if let Some(bad) = schema
        .options
        .iter()
        .find(|o| !is_valid_command_name(&o.name) || !is_valid_description(&o.description))
    {
        return Err(SchemaError::InvalidOption {
            command: schema.name.clone(),
            option: bad.name.clone(),
        });
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

/// A loaded command: its validated schema and its executor.
#[derive(Clone)]
pub struct CommandDefinition {
    pub schema: ApplicationCommand,
    pub handler: Arc<dyn SlashCommand>,
}

impl CommandDefinition {
    pub fn name(&self) -> &str {
        &self.schema.name
    }
}

/// Command name → definition. Keys are unique; publish order is the order
/// in which names were first inserted.
#[derive(Clone, Default)]
pub struct CommandRegistry {
    order: Vec<String>,
    commands: HashMap<String, CommandDefinition>,
}

impl CommandRegistry {
    pub fn builder() -> CommandRegistryBuilder {
        CommandRegistryBuilder::default()
    }

    pub fn get(&self, name: &str) -> Option<&CommandDefinition> {
        self.commands.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.commands.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Definitions in publish order.
    pub fn iter(&self) -> impl Iterator<Item = &CommandDefinition> {
        self.order.iter().filter_map(|name| self.commands.get(name))
    }

    /// The replace-all payload: exactly one schema per entry.
    pub fn schemas(&self) -> Vec<ApplicationCommand> {
        self.iter().map(|def| def.schema.clone()).collect()
    }
}

impl std::fmt::Debug for CommandRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(&self.order).finish()
    }
}

/// Accumulates definitions; call [`build`](Self::build) to freeze.
#[derive(Default)]
pub struct CommandRegistryBuilder {
    registry: CommandRegistry,
}

impl CommandRegistryBuilder {
    /// Insert `definition`, returning the one it replaced on a name collision.
    pub fn insert(&mut self, definition: CommandDefinition) -> Option<CommandDefinition> {
        let name = definition.name().to_string();
        let previous = self.registry.commands.insert(name.clone(), definition);
        if previous.is_none() {
            self.registry.order.push(name);
        }
        previous
    }

    pub fn build(self) -> CommandRegistry {
        self.registry
    }
}
