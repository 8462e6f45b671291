//! Process configuration read from the environment (and `.env`).

use std::fmt;

use crate::error::ConfigError;
use crate::types::Snowflake;

const DEFAULT_REDIS_URL: &str = "redis://127.0.0.1:6379/";
const DEFAULT_MYSQL_PORT: u16 = 3306;

/// Where application commands get published.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandScope {
    /// Every guild the application is installed in.
    Global,
    /// A single guild; propagates immediately.
    Guild(Snowflake),
}

/// Relational store connection settings.
#[derive(Clone, PartialEq, Eq)]
pub struct DatabaseConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub database: Option<String>,
}

impl fmt::Debug for DatabaseConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatabaseConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .field("database", &self.database)
            .finish()
    }
}

/// Everything the bot needs to start.
#[derive(Clone)]
pub struct BotConfig {
    pub token: String,
    pub application_id: Snowflake,
    pub command_scope: CommandScope,
    pub redis_url: String,
    pub database: DatabaseConfig,
}

impl fmt::Debug for BotConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BotConfig")
            .field("token", &"<redacted>")
            .field("application_id", &self.application_id)
            .field("command_scope", &self.command_scope)
            .field("redis_url", &self.redis_url)
            .field("database", &self.database)
            .finish()
    }
}

impl BotConfig {
    /// Load from the process environment, reading `.env` first if present.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load using an arbitrary variable lookup. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let token = get("bot_token").ok_or(ConfigError::Missing("bot_token"))?;
        let application_id = get("bot_client_id").ok_or(ConfigError::Missing("bot_client_id"))?;

        let command_scope = match get("bot_guild_id") {
            Some(guild_id) => CommandScope::Guild(guild_id),
            None => CommandScope::Global,
        };

        let port = match get("mysql_port") {
            Some(raw) => raw.trim().parse::<u16>().map_err(|_| ConfigError::Invalid {
                var: "mysql_port",
                value: raw.clone(),
            })?,
            None => DEFAULT_MYSQL_PORT,
        };

        Ok(Self {
            token,
            application_id,
            command_scope,
            redis_url: get("redis_url").unwrap_or_else(|| DEFAULT_REDIS_URL.to_string()),
            database: DatabaseConfig {
                host: get("mysql_host").unwrap_or_else(|| "localhost".to_string()),
                port,
                user: get("mysql_user").unwrap_or_else(|| "root".to_string()),
                password: lookup("mysql_pass").unwrap_or_default(),
                database: get("mysql_db"),
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn minimal_config_uses_defaults() {
        let config =
            BotConfig::from_lookup(lookup(&[("bot_token", "t0k"), ("bot_client_id", "42")]))
                .expect("config");
        assert_eq!(config.token, "t0k");
        assert_eq!(config.application_id, "42");
        assert_eq!(config.command_scope, CommandScope::Global);
        assert_eq!(config.redis_url, DEFAULT_REDIS_URL);
        assert_eq!(config.database.port, 3306);
        assert_eq!(config.database.host, "localhost");
        assert!(config.database.database.is_none());
    }

    #[test]
    fn missing_token_is_an_error() {
        let err = BotConfig::from_lookup(lookup(&[("bot_client_id", "42")])).unwrap_err();
        assert!(matches!(err, ConfigError::Missing("bot_token")));
    }

    #[test]
    fn blank_client_id_counts_as_missing() {
        let err = BotConfig::from_lookup(lookup(&[("bot_token", "t"), ("bot_client_id", "  ")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::Missing("bot_client_id")));
    }

    #[test]
    fn guild_id_selects_guild_scope() {
        let config = BotConfig::from_lookup(lookup(&[
            ("bot_token", "t"),
            ("bot_client_id", "1"),
            ("bot_guild_id", "99"),
        ]))
        .expect("config");
        assert_eq!(config.command_scope, CommandScope::Guild("99".to_string()));
    }

    #[test]
    fn database_settings_are_read() {
        let config = BotConfig::from_lookup(lookup(&[
            ("bot_token", "t"),
            ("bot_client_id", "1"),
            ("mysql_host", "db.internal"),
            ("mysql_port", "3307"),
            ("mysql_user", "bot"),
            ("mysql_pass", "hunter2"),
            ("mysql_db", "guild_data"),
        ]))
        .expect("config");
        assert_eq!(config.database.host, "db.internal");
        assert_eq!(config.database.port, 3307);
        assert_eq!(config.database.user, "bot");
        assert_eq!(config.database.password, "hunter2");
        assert_eq!(config.database.database.as_deref(), Some("guild_data"));
    }

    #[test]
    fn invalid_port_is_rejected() {
        let err = BotConfig::from_lookup(lookup(&[
            ("bot_token", "t"),
            ("bot_client_id", "1"),
            ("mysql_port", "not-a-port"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { var: "mysql_port", .. }));
    }

    #[test]
    fn debug_output_redacts_secrets() {
        let config = BotConfig::from_lookup(lookup(&[
            ("bot_token", "super-secret"),
            ("bot_client_id", "1"),
            ("mysql_pass", "hunter2"),
        ]))
        .expect("config");
        let rendered = format!("{config:?}");
        assert!(!rendered.contains("super-secret"));
        assert!(!rendered.contains("hunter2"));
        assert!(rendered.contains("<redacted>"));
    }
}
