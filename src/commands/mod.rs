//! Built-in slash commands, grouped by category.
//!
//! Each category is a directory; each command a file exposing one
//! [`SlashCommand`](crate::command::SlashCommand) implementor.

pub mod fun;
pub mod moderation;
pub mod utility;

use crate::loader::CommandModule;

/// Every compiled-in command, in publish order.
pub fn catalog() -> Vec<CommandModule> {
    vec![
        CommandModule::new("utility/ping", utility::ping::Ping),
        CommandModule::new("utility/uptime", utility::uptime::Uptime),
        CommandModule::new("utility/help", utility::help::Help),
        CommandModule::new("fun/roll", fun::roll::Roll),
        CommandModule::new("moderation/warn", moderation::warn::Warn),
        CommandModule::new("moderation/warnings", moderation::warnings::Warnings),
    ]
}
