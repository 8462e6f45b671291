//! HTTP client for the platform REST API.
//!
//! All outbound HTTP calls go through [`DiscordHttpClient`] so that auth
//! headers, rate-limit back-off, and error handling live in one place. The
//! rest of the bot talks to it through the [`DiscordApi`] trait, which tests
//! replace with a recording fake.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_lock::Mutex;
use async_trait::async_trait;
use reqwest::header::{HeaderMap, AUTHORIZATION, USER_AGENT};
use reqwest::{Method, StatusCode};
use tracing::{debug, warn};

use crate::config::CommandScope;
use crate::error::HttpError;
use crate::types::*;

const BASE_URL: &str = "https://discord.com/api/v10";
const USER_AGENT_VALUE: &str = concat!(
    "DiscordBot (https://github.com/switchboard-rs/switchboard, ",
    env!("CARGO_PKG_VERSION"),
    ")"
);
const MAX_RETRIES: u32 = 5;

// ---------------------------------------------------------------------------
// The seam the bot depends on
// ---------------------------------------------------------------------------

/// REST operations the bot core consumes.
#[async_trait]
pub trait DiscordApi: Send + Sync {
    /// Replace every registered command in `scope` with `commands`.
    /// Returns the commands the platform accepted.
    async fn bulk_overwrite_commands(
        &self,
        application_id: &str,
        scope: &CommandScope,
        commands: &[ApplicationCommand],
    ) -> Result<Vec<ApplicationCommand>, HttpError>;

    /// Send the initial response to an interaction.
    async fn create_interaction_response(
        &self,
        interaction_id: &str,
        interaction_token: &str,
        response: &InteractionResponse,
    ) -> Result<(), HttpError>;

    /// Send a follow-up message for an already-acknowledged interaction.
    async fn create_followup_message(
        &self,
        application_id: &str,
        interaction_token: &str,
        data: &InteractionCallbackData,
    ) -> Result<Message, HttpError>;

    /// Edit the original interaction response.
    async fn edit_original_interaction_response(
        &self,
        application_id: &str,
        interaction_token: &str,
        data: &InteractionCallbackData,
    ) -> Result<Message, HttpError>;
}

// ---------------------------------------------------------------------------
// Rate-limit tracker (per-bucket)
// ---------------------------------------------------------------------------

/// Rate-limit info parsed from response headers.
#[derive(Debug, Clone, Default)]
struct RateLimitInfo {
    remaining: Option<u32>,
    reset_after: Option<f64>,
    bucket: Option<String>,
    is_global: bool,
}

impl RateLimitInfo {
    fn from_headers(headers: &HeaderMap) -> Self {
        let get = |name: &str| headers.get(name).and_then(|v| v.to_str().ok());
        Self {
            remaining: get("x-ratelimit-remaining").and_then(|s| s.parse().ok()),
            reset_after: get("x-ratelimit-reset-after").and_then(|s| s.parse().ok()),
            bucket: get("x-ratelimit-bucket").map(str::to_string),
            is_global: get("x-ratelimit-global") == Some("true"),
        }
    }
}

#[derive(Debug, Clone)]
struct BucketState {
    remaining: u32,
    resets_at: Instant,
}

#[derive(Debug, Default)]
struct RateLimiter {
    /// Route-key → bucket id.
    route_buckets: HashMap<String, String>,
    /// Bucket id → state.
    buckets: HashMap<String, BucketState>,
    /// No requests may be sent until this instant.
    global_until: Option<Instant>,
}

impl RateLimiter {
    /// How long to wait before sending on `route_key`, or `None` to send now.
    fn delay_for(&self, route_key: &str, now: Instant) -> Option<Duration> {
        if let Some(until) = self.global_until {
            if until > now {
                return Some(until - now);
            }
        }

        let bucket_id = self.route_buckets.get(route_key)?;
        let state = self.buckets.get(bucket_id)?;

        if state.remaining == 0 && state.resets_at > now {
            return Some(state.resets_at - now);
        }
        None
    }

    fn update(&mut self, route_key: &str, info: &RateLimitInfo, now: Instant) {
        let reset_in = info
            .reset_after
            .map(Duration::from_secs_f64)
            .unwrap_or(Duration::from_secs(1));

        if info.is_global {
            self.global_until = Some(now + reset_in);
        }

        if let Some(bucket) = &info.bucket {
            self.route_buckets
                .insert(route_key.to_string(), bucket.clone());
            self.buckets.insert(
                bucket.clone(),
                BucketState {
                    remaining: info.remaining.unwrap_or(1),
                    resets_at: now + reset_in,
                },
            );
        }
    }
}

// ---------------------------------------------------------------------------
// DiscordHttpClient
// ---------------------------------------------------------------------------

/// A rate-limit–aware client for the REST API. Cheap to clone.
#[derive(Clone)]
pub struct DiscordHttpClient {
    client: reqwest::Client,
    token: String,
    limiter: Arc<Mutex<RateLimiter>>,
}

impl DiscordHttpClient {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            token: token.into(),
            limiter: Arc::new(Mutex::new(RateLimiter::default())),
        }
    }

    /// Send a request to `{BASE_URL}/{path}` and return the raw body.
    ///
    /// `route_key` groups requests for rate-limit bucketing, e.g.
    /// `PUT /applications/{id}/commands`.
    pub async fn request(
        &self,
        method: Method,
        path: &str,
        route_key: &str,
        body: Option<&serde_json::Value>,
    ) -> Result<Vec<u8>, HttpError> {
        let url = format!("{}/{}", BASE_URL, path.trim_start_matches('/'));

        for attempt in 0..=MAX_RETRIES {
            let wait = self.limiter.lock().await.delay_for(route_key, Instant::now());
            if let Some(delay) = wait {
                let delay = delay.min(Duration::from_secs(60));
                debug!(
                    route = route_key,
                    delay_ms = delay.as_millis() as u64,
                    "rate-limit pre-emptive backoff"
                );
                tokio::time::sleep(delay).await;
            }

            let mut req = self
                .client
                .request(method.clone(), &url)
                .header(AUTHORIZATION, format!("Bot {}", self.token))
                .header(USER_AGENT, USER_AGENT_VALUE);
            if let Some(json) = body {
                req = req.json(json);
            }

            let resp = req.send().await?;
            let status = resp.status();
            let rl_info = RateLimitInfo::from_headers(resp.headers());

            self.limiter
                .lock()
                .await
                .update(route_key, &rl_info, Instant::now());

            if status == StatusCode::TOO_MANY_REQUESTS && attempt < MAX_RETRIES {
                let retry_after = rl_info.reset_after.unwrap_or(1.0).min(60.0);
                warn!(
                    route = route_key,
                    attempt,
                    retry_after_s = retry_after,
                    global = rl_info.is_global,
                    "rate-limited, backing off"
                );
                tokio::time::sleep(Duration::from_secs_f64(retry_after)).await;
                continue;
            }

            let bytes = resp.bytes().await?;
            if status.is_success() {
                return Ok(bytes.to_vec());
            }
            return Err(HttpError::Api {
                status: status.as_u16(),
                body: String::from_utf8_lossy(&bytes).into_owned(),
                route: route_key.to_string(),
            });
        }

        Err(HttpError::Api {
            status: StatusCode::TOO_MANY_REQUESTS.as_u16(),
            body: "rate-limited after max retries".to_string(),
            route: route_key.to_string(),
        })
    }

    /// Like [`request`](Self::request) but deserialises the body as JSON.
    pub async fn request_json<T: serde::de::DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        route_key: &str,
        body: Option<&serde_json::Value>,
    ) -> Result<T, HttpError> {
        let bytes = self.request(method, path, route_key, body).await?;
        serde_json::from_slice(&bytes).map_err(|e| {
            let raw = String::from_utf8_lossy(&bytes);
            HttpError::Serde(format!("{}: {}", e, &raw[..raw.len().min(200)]))
        })
    }
}

fn to_json<T: serde::Serialize>(value: &T) -> Result<serde_json::Value, HttpError> {
    serde_json::to_value(value).map_err(|e| HttpError::Serde(e.to_string()))
}

/// Path and rate-limit route key for a bulk overwrite in `scope`.
fn commands_route(application_id: &str, scope: &CommandScope) -> (String, String) {
    let path = match scope {
        CommandScope::Global => format!("applications/{}/commands", application_id),
        CommandScope::Guild(guild_id) => {
            format!("applications/{}/guilds/{}/commands", application_id, guild_id)
        }
    };
    let route_key = format!("PUT /{}", path);
    (path, route_key)
}

#[async_trait]
impl DiscordApi for DiscordHttpClient {
    async fn bulk_overwrite_commands(
        &self,
        application_id: &str,
        scope: &CommandScope,
        commands: &[ApplicationCommand],
    ) -> Result<Vec<ApplicationCommand>, HttpError> {
        let (path, route_key) = commands_route(application_id, scope);
        let body = to_json(&commands)?;
        self.request_json(Method::PUT, &path, &route_key, Some(&body))
            .await
    }

    async fn create_interaction_response(
        &self,
        interaction_id: &str,
        interaction_token: &str,
        response: &InteractionResponse,
    ) -> Result<(), HttpError> {
        let path = format!("interactions/{}/{}/callback", interaction_id, interaction_token);
        let body = to_json(response)?;
        // 204 No Content on success.
        self.request(Method::POST, &path, "POST /interactions/callback", Some(&body))
            .await?;
        Ok(())
    }

    async fn create_followup_message(
        &self,
        application_id: &str,
        interaction_token: &str,
        data: &InteractionCallbackData,
    ) -> Result<Message, HttpError> {
        let path = format!("webhooks/{}/{}", application_id, interaction_token);
        let body = to_json(data)?;
        self.request_json(Method::POST, &path, "POST /webhooks/interaction", Some(&body))
            .await
    }

    async fn edit_original_interaction_response(
        &self,
        application_id: &str,
        interaction_token: &str,
        data: &InteractionCallbackData,
    ) -> Result<Message, HttpError> {
        let path = format!(
            "webhooks/{}/{}/messages/@original",
            application_id, interaction_token
        );
        let body = to_json(data)?;
        self.request_json(
            Method::PATCH,
            &path,
            "PATCH /webhooks/interaction/messages/@original",
            Some(&body),
        )
        .await
    }
}

impl std::fmt::Debug for DiscordHttpClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DiscordHttpClient")
            .field("token", &"<redacted>")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::HeaderValue;

    fn headers(pairs: &[(&'static str, &'static str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (k, v) in pairs {
            map.insert(*k, HeaderValue::from_static(v));
        }
        map
    }

    #[test]
    fn parses_rate_limit_headers() {
        let info = RateLimitInfo::from_headers(&headers(&[
            ("x-ratelimit-remaining", "0"),
            ("x-ratelimit-reset-after", "1.5"),
            ("x-ratelimit-bucket", "abc"),
            ("x-ratelimit-global", "true"),
        ]));
        assert_eq!(info.remaining, Some(0));
        assert_eq!(info.reset_after, Some(1.5));
        assert_eq!(info.bucket.as_deref(), Some("abc"));
        assert!(info.is_global);
    }

    #[test]
    fn missing_headers_parse_as_empty() {
        let info = RateLimitInfo::from_headers(&HeaderMap::new());
        assert!(info.remaining.is_none());
        assert!(info.bucket.is_none());
        assert!(!info.is_global);
    }

    #[test]
    fn exhausted_bucket_delays_its_route_only() {
        let now = Instant::now();
        let mut limiter = RateLimiter::default();
        limiter.update(
            "PUT /applications/1/commands",
            &RateLimitInfo {
                remaining: Some(0),
                reset_after: Some(2.0),
                bucket: Some("b1".to_string()),
                is_global: false,
            },
            now,
        );

        let delay = limiter
            .delay_for("PUT /applications/1/commands", now)
            .expect("route should be limited");
        assert!(delay <= Duration::from_secs(2) && delay > Duration::from_secs(1));
        assert!(limiter.delay_for("POST /interactions/callback", now).is_none());
        assert!(limiter
            .delay_for("PUT /applications/1/commands", now + Duration::from_secs(3))
            .is_none());
    }

    #[test]
    fn global_limit_delays_every_route() {
        let now = Instant::now();
        let mut limiter = RateLimiter::default();
        limiter.update(
            "anything",
            &RateLimitInfo {
                reset_after: Some(5.0),
                is_global: true,
                ..Default::default()
            },
            now,
        );
        assert!(limiter.delay_for("POST /interactions/callback", now).is_some());
    }

    #[test]
    fn bucket_with_remaining_requests_is_not_delayed() {
        let now = Instant::now();
        let mut limiter = RateLimiter::default();
        limiter.update(
            "r",
            &RateLimitInfo {
                remaining: Some(3),
                reset_after: Some(10.0),
                bucket: Some("b".to_string()),
                is_global: false,
            },
            now,
        );
        assert!(limiter.delay_for("r", now).is_none());
    }

    #[test]
    fn command_routes_follow_scope() {
        let (path, key) = commands_route("123", &CommandScope::Global);
        assert_eq!(path, "applications/123/commands");
        assert_eq!(key, "PUT /applications/123/commands");

        let (path, _) = commands_route("123", &CommandScope::Guild("9".to_string()));
        assert_eq!(path, "applications/123/guilds/9/commands");
    }

    #[test]
    fn debug_redacts_token() {
        let client = DiscordHttpClient::new("very-secret");
        assert!(!format!("{client:?}").contains("very-secret"));
    }
}
