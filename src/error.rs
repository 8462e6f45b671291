//! Error taxonomy.
//!
//! Failures are contained at the boundary closest to where they happen:
//! per-unit load problems become `LoadOutcome::Skipped`, handler failures
//! become `DispatchOutcome::Failed`, publish failures are logged. Only the
//! errors in [`BotError`] escape to process exit.

use thiserror::Error;

/// Missing or malformed process configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("environment variable `{0}` is not set")]
    Missing(&'static str),

    #[error("environment variable `{var}` has an invalid value `{value}`")]
    Invalid { var: &'static str, value: String },
}

/// Cache-store or relational-store failure.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("mysql error: {0}")]
    Sql(#[from] sqlx::Error),
}

/// REST API failure.
#[derive(Debug, Error)]
pub enum HttpError {
    /// Non-success status from the platform.
    #[error("API error {status} on {route}: {body}")]
    Api {
        status: u16,
        body: String,
        route: String,
    },

    /// Transport / network error.
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// Serialisation error.
    #[error("serialisation error: {0}")]
    Serde(String),
}

/// Gateway (WebSocket) failure.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("timed out waiting for HELLO")]
    HelloTimeout,

    #[error("stream ended before HELLO")]
    StreamEnded,

    #[error("gateway connection closed")]
    Closed,

    #[error("unexpected gateway payload: {0}")]
    Protocol(String),

    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("malformed gateway JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Failure while acknowledging or answering an interaction.
#[derive(Debug, Error)]
pub enum InteractionError {
    #[error("interaction has already been acknowledged")]
    AlreadyAcknowledged,

    #[error(transparent)]
    Http(#[from] HttpError),
}

/// Startup failures that stop the process.
#[derive(Debug, Error)]
pub enum BotError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Gateway(#[from] GatewayError),
}

/// Result type returned by command and event handlers.
pub type HandlerResult = anyhow::Result<()>;
