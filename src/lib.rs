//! A slash-command bot runtime: connection bootstrap, command and listener
//! loading, command publishing, event binding and interaction dispatch.
//!
//! Transport lives in `gateway` (WebSocket) and `http` (REST); everything the
//! bot does with an event goes through the [`binder::EventBus`] and, for
//! slash commands, the [`dispatcher::InteractionDispatcher`].

pub mod binder;
pub mod bot;
pub mod command;
pub mod commands;
pub mod config;
pub mod context;
pub mod dispatcher;
pub mod error;
pub mod events;
pub mod gateway;
pub mod http;
pub mod interaction;
pub mod listeners;
pub mod loader;
pub mod publisher;
pub mod stores;
pub mod tags;
pub mod types;

#[cfg(test)]
mod testing;
