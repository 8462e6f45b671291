//! Cache-store and relational-store connections opened at startup.
//!
//! The bot core never queries these itself; they are handed to command and
//! event handlers through [`AppContext`](crate::context::AppContext).

use std::sync::Arc;
use std::time::{Duration, Instant};

use redis::aio::MultiplexedConnection;
use redis::AsyncCommands;
use sqlx::mysql::{MySqlConnectOptions, MySqlPool, MySqlPoolOptions};
use tokio::sync::OnceCell;
use tracing::{error, info};

use crate::config::{BotConfig, DatabaseConfig};
use crate::error::StoreError;
use crate::tags::Tag;

// ---------------------------------------------------------------------------
// Cache store (redis)
// ---------------------------------------------------------------------------

/// Shared redis handle. Cheap to clone; all clones share one multiplexed
/// connection, established on first use.
#[derive(Clone)]
pub struct CacheStore {
    client: redis::Client,
    conn: Arc<OnceCell<MultiplexedConnection>>,
}

impl CacheStore {
    /// Parse `url` without connecting.
    pub fn open(url: &str) -> Result<Self, StoreError> {
        Ok(Self {
            client: redis::Client::open(url)?,
            conn: Arc::new(OnceCell::new()),
        })
    }

    /// Parse `url` and establish the connection now.
    pub async fn connect(url: &str) -> Result<Self, StoreError> {
        let store = Self::open(url)?;
        store.connection().await?;
        Ok(store)
    }

    /// Whether the shared connection has been established.
    pub fn is_connected(&self) -> bool {
        self.conn.initialized()
    }

    /// A handle to the shared connection, connecting if needed.
    pub async fn connection(&self) -> Result<MultiplexedConnection, StoreError> {
        let conn = self
            .conn
            .get_or_try_init(|| self.client.get_multiplexed_async_connection())
            .await?;
        Ok(conn.clone())
    }

    /// Round-trip time of a `PING`.
    pub async fn ping(&self) -> Result<Duration, StoreError> {
        let mut conn = self.connection().await?;
        let started = Instant::now();
        let _: String = redis::cmd("PING").query_async(&mut conn).await?;
        Ok(started.elapsed())
    }

    /// `INCRBY key by`, returning the new value.
    pub async fn incr(&self, key: &str, by: i64) -> Result<i64, StoreError> {
        let mut conn = self.connection().await?;
        let value: i64 = conn.incr(key, by).await?;
        Ok(value)
    }
}

impl std::fmt::Debug for CacheStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheStore")
            .field("connected", &self.is_connected())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Relational store (MySQL)
// ---------------------------------------------------------------------------

/// Shared MySQL pool. Cheap to clone.
#[derive(Debug, Clone)]
pub struct Database {
    pool: MySqlPool,
}

impl Database {
    /// Build a pool that connects on first query.
    pub fn lazy(config: &DatabaseConfig) -> Self {
        let pool = MySqlPoolOptions::new()
            .max_connections(5)
            .acquire_timeout(Duration::from_secs(10))
            .connect_lazy_with(connect_options(config));
        Self { pool }
    }

    pub fn pool(&self) -> &MySqlPool {
        &self.pool
    }

    /// `SELECT version()`; used as the startup connectivity check.
    pub async fn server_version(&self) -> Result<String, StoreError> {
        let (version,): (String,) = sqlx::query_as("SELECT version()")
            .fetch_one(&self.pool)
            .await?;
        Ok(version)
    }
}

fn connect_options(config: &DatabaseConfig) -> MySqlConnectOptions {
    let options = MySqlConnectOptions::new()
        .host(&config.host)
        .port(config.port)
        .username(&config.user)
        .password(&config.password);
    match &config.database {
        Some(name) => options.database(name),
        None => options,
    }
}

// ---------------------------------------------------------------------------
// Bootstrap
// ---------------------------------------------------------------------------

/// Both store handles.
#[derive(Debug, Clone)]
pub struct Stores {
    pub cache: CacheStore,
    pub db: Database,
}

/// Open both stores.
///
/// A cache-store failure is returned (the bot cannot start without it). A
/// database failure is only logged; the pool keeps retrying on later queries.
pub async fn bootstrap(config: &BotConfig) -> Result<Stores, StoreError> {
    let cache = match CacheStore::connect(&config.redis_url).await {
        Ok(cache) => {
            info!(tag = %Tag::Redis, "connected");
            cache
        }
        Err(e) => {
            error!(tag = %Tag::Redis, error = %e, "client error occurred");
            return Err(e);
        }
    };

    let db = Database::lazy(&config.database);
    match db.server_version().await {
        Ok(version) => info!(tag = %Tag::Mysql, version = %version, "connected"),
        Err(e) => error!(tag = %Tag::Mysql, error = %e, "client error occurred"),
    }

    Ok(Stores { cache, db })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn db_config() -> DatabaseConfig {
        DatabaseConfig {
            host: "127.0.0.1".to_string(),
            port: 3306,
            user: "root".to_string(),
            password: String::new(),
            database: Some("bot".to_string()),
        }
    }

    #[test]
    fn open_parses_without_connecting() {
        let store = CacheStore::open("redis://127.0.0.1:6379/").expect("valid url");
        assert!(!store.is_connected());
    }

    #[test]
    fn open_rejects_invalid_url() {
        assert!(matches!(
            CacheStore::open("definitely not a url"),
            Err(StoreError::Redis(_))
        ));
    }

    #[test]
    fn clones_share_the_connection_cell() {
        let store = CacheStore::open("redis://127.0.0.1:6379/").unwrap();
        let clone = store.clone();
        assert!(Arc::ptr_eq(&store.conn, &clone.conn));
    }

    #[tokio::test]
    async fn lazy_pool_opens_no_connections() {
        let db = Database::lazy(&db_config());
        assert_eq!(db.pool().size(), 0);
    }
}
