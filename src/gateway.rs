//! Gateway (WebSocket) transport.
//!
//! This module owns the WebSocket connection lifecycle:
//!   - connect → receive HELLO → send IDENTIFY (or RESUME)
//!   - background heartbeat task
//!   - sequence number + session_id tracking
//!   - automatic reconnect + RESUME on disconnect
//!   - gateway send rate limiting (120 events / 60s)
//!
//! The rest of the bot consumes a channel of [`GatewayEvent`] values and never
//! touches `tokio_tungstenite` directly.

use std::sync::Arc;
use std::time::{Duration, Instant};

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use serde_json::json;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, Mutex};
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tracing::{debug, error, info, warn};

use crate::error::GatewayError;
use crate::events::GatewayEvent;
use crate::tags::Tag;
use crate::types::{GatewayPayload, Intents};

const DEFAULT_GATEWAY_URL: &str = "wss://gateway.discord.gg/?v=10&encoding=json";

/// At most 120 gateway sends per 60 seconds.
const SEND_BUDGET_MAX: usize = 120;
const SEND_BUDGET_WINDOW: Duration = Duration::from_secs(60);

const MAX_RECONNECT_ATTEMPTS: u32 = 8;
const HELLO_TIMEOUT: Duration = Duration::from_secs(30);

type WsSink = SplitSink<WebSocketStream<MaybeTlsStream<TcpStream>>, WsMessage>;
type WsStream = SplitStream<WebSocketStream<MaybeTlsStream<TcpStream>>>;

// ---------------------------------------------------------------------------
// Gateway send rate limiter
// ---------------------------------------------------------------------------

/// Sliding-window rate limiter for outbound gateway messages.
struct SendRateLimiter {
    timestamps: Vec<Instant>,
    budget: usize,
    window: Duration,
}

impl SendRateLimiter {
    fn new(budget: usize, window: Duration) -> Self {
        Self {
            timestamps: Vec::with_capacity(budget),
            budget,
            window,
        }
    }

    /// How long to wait before the next send, or `None` to send now.
    fn delay(&self, now: Instant) -> Option<Duration> {
        let in_window: Vec<Instant> = self
            .timestamps
            .iter()
            .copied()
            .filter(|&t| now.duration_since(t) < self.window)
            .collect();

        if in_window.len() < self.budget {
            return None;
        }

        let oldest = in_window.into_iter().min()?;
        let expires_at = oldest + self.window;
        (expires_at > now).then(|| expires_at - now)
    }

    /// Record a send and prune entries outside the window.
    fn record(&mut self, now: Instant) {
        let window = self.window;
        self.timestamps.retain(|&t| now.duration_since(t) < window);
        self.timestamps.push(now);
    }
}

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Options for connecting to the gateway.
#[derive(Clone)]
pub struct GatewayConfig {
    pub token: String,
    pub intents: Intents,
    /// Optional `[shard_id, num_shards]`.
    pub shard: Option<[u32; 2]>,
}

impl std::fmt::Debug for GatewayConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewayConfig")
            .field("token", &"<redacted>")
            .field("intents", &self.intents)
            .field("shard", &self.shard)
            .finish()
    }
}

#[derive(Debug, Clone, Default)]
struct SessionState {
    session_id: Option<String>,
    resume_gateway_url: Option<String>,
    sequence: Option<u64>,
}

impl SessionState {
    fn resumable(&self) -> Option<(&str, u64)> {
        Some((self.session_id.as_deref()?, self.sequence?))
    }
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Handle to a running gateway connection.
///
/// The background driver keeps running until every receiver of `events` is
/// dropped or an unrecoverable error occurs.
pub struct GatewayHandle {
    /// Send raw JSON payloads on the gateway (rate-limited).
    pub sender: mpsc::Sender<serde_json::Value>,
    /// Typed events.
    pub events: async_channel::Receiver<GatewayEvent>,
    /// The background driver task.
    pub driver: tokio::task::JoinHandle<()>,
}

/// Spawn the gateway driver and return its [`GatewayHandle`].
pub fn connect(config: GatewayConfig) -> GatewayHandle {
    let (event_tx, event_rx) = async_channel::bounded::<GatewayEvent>(256);
    let (send_tx, send_rx) = mpsc::channel::<serde_json::Value>(64);

    let driver = tokio::spawn(gateway_driver(config, event_tx, send_rx));

    GatewayHandle {
        sender: send_tx,
        events: event_rx,
        driver,
    }
}

// ---------------------------------------------------------------------------
// Driver loop (runs in a spawned task)
// ---------------------------------------------------------------------------

#[derive(Debug, PartialEq, Eq)]
enum DisconnectReason {
    ShouldResume,
    ShouldReidentify,
    Fatal,
    EventChannelClosed,
}

/// Map a server close code to what the driver should do next.
fn close_code_reason(code: u16) -> DisconnectReason {
    match code {
        // Authentication failed, invalid shard, sharding required,
        // invalid API version, invalid or disallowed intents.
        4004 | 4010 | 4011 | 4012 | 4013 | 4014 => DisconnectReason::Fatal,
        // Invalid seq or session timed out.
        4007 | 4009 => DisconnectReason::ShouldReidentify,
        _ => DisconnectReason::ShouldResume,
    }
}

fn identify_payload(config: &GatewayConfig) -> serde_json::Value {
    let mut identify = json!({
        "op": 2,
        "d": {
            "token": config.token,
            "properties": {
                "os": std::env::consts::OS,
                "browser": "switchboard",
                "device": "switchboard"
            },
            "intents": config.intents.bits(),
        }
    });
    if let Some([id, count]) = config.shard {
        identify["d"]["shard"] = json!([id, count]);
    }
    identify
}

fn resume_payload(token: &str, session_id: &str, seq: u64) -> serde_json::Value {
    json!({
        "op": 6,
        "d": { "token": token, "session_id": session_id, "seq": seq }
    })
}

/// Resume URLs come without query parameters.
fn with_query(url: String) -> String {
    if url.contains("v=10") {
        url
    } else if url.contains('?') {
        format!("{}&v=10&encoding=json", url)
    } else {
        format!("{}/?v=10&encoding=json", url.trim_end_matches('/'))
    }
}

async fn gateway_driver(
    config: GatewayConfig,
    event_tx: async_channel::Sender<GatewayEvent>,
    mut send_rx: mpsc::Receiver<serde_json::Value>,
) {
    let session = Arc::new(Mutex::new(SessionState::default()));
    let mut reconnect_attempts: u32 = 0;

    loop {
        if reconnect_attempts > 0 {
            if reconnect_attempts > MAX_RECONNECT_ATTEMPTS {
                error!(tag = %Tag::Gateway, "exceeded max reconnect attempts, giving up");
                return;
            }
            let backoff = backoff_delay(reconnect_attempts);
            warn!(
                tag = %Tag::Gateway,
                delay_ms = backoff.as_millis() as u64,
                attempt = reconnect_attempts,
                "backing off before reconnect"
            );
            tokio::time::sleep(backoff).await;
        }

        let url = {
            let s = session.lock().await;
            with_query(
                s.resume_gateway_url
                    .clone()
                    .unwrap_or_else(|| DEFAULT_GATEWAY_URL.to_string()),
            )
        };

        info!(tag = %Tag::Gateway, url = %url, "connecting");

        let ws_stream = match tokio_tungstenite::connect_async(url.as_str()).await {
            Ok((stream, _)) => stream,
            Err(e) => {
                error!(tag = %Tag::Gateway, error = %e, "failed to connect");
                reconnect_attempts += 1;
                continue;
            }
        };

        let (ws_write, mut ws_read) = ws_stream.split();
        let ws_write = Arc::new(Mutex::new(ws_write));
        let rate_limiter = Arc::new(Mutex::new(SendRateLimiter::new(
            SEND_BUDGET_MAX,
            SEND_BUDGET_WINDOW,
        )));

        // 1. HELLO
        let heartbeat_interval = match read_hello(&mut ws_read).await {
            Ok(interval) => interval,
            Err(e) => {
                error!(tag = %Tag::Gateway, error = %e, "failed to read HELLO");
                reconnect_attempts += 1;
                continue;
            }
        };
        debug!(tag = %Tag::Gateway, interval_ms = heartbeat_interval, "received HELLO");

        // 2. IDENTIFY or RESUME
        let opening = {
            let s = session.lock().await;
            match s.resumable() {
                Some((session_id, seq)) => resume_payload(&config.token, session_id, seq),
                None => identify_payload(&config),
            }
        };
        let resuming = opening["op"] == 6;
        if let Err(e) = rate_limited_send(&ws_write, &rate_limiter, &opening).await {
            error!(tag = %Tag::Gateway, error = %e, resuming, "failed to open session");
            reconnect_attempts += 1;
            continue;
        }
        info!(tag = %Tag::Gateway, resuming, "session opened");
        reconnect_attempts = 0;

        // 3. Heartbeat task
        let heartbeat = tokio::spawn(heartbeat_loop(
            heartbeat_interval,
            Arc::clone(&ws_write),
            Arc::clone(&rate_limiter),
            Arc::clone(&session),
        ));

        // 4. Read loop
        let reason = read_loop(
            &mut ws_read,
            &ws_write,
            &rate_limiter,
            &event_tx,
            &session,
            &mut send_rx,
        )
        .await;

        // 5. Cleanup
        heartbeat.abort();
        let _ = ws_write.lock().await.send(WsMessage::Close(None)).await;

        match reason {
            DisconnectReason::ShouldResume => {
                info!(tag = %Tag::Gateway, "will attempt RESUME");
            }
            DisconnectReason::ShouldReidentify => {
                info!(tag = %Tag::Gateway, "session invalidated, will re-IDENTIFY");
                let mut s = session.lock().await;
                s.session_id = None;
                s.sequence = None;
            }
            DisconnectReason::Fatal => {
                error!(tag = %Tag::Gateway, "fatal gateway error, shutting down");
                return;
            }
            DisconnectReason::EventChannelClosed => {
                info!(tag = %Tag::Gateway, "event channel closed, shutting down driver");
                return;
            }
        }

        reconnect_attempts += 1;
    }
}

async fn heartbeat_loop(
    interval_ms: u64,
    ws_write: Arc<Mutex<WsSink>>,
    rate_limiter: Arc<Mutex<SendRateLimiter>>,
    session: Arc<Mutex<SessionState>>,
) {
    // First beat after `interval * jitter`, jitter ∈ [0, 1).
    let jitter = rand::random::<f64>();
    tokio::time::sleep(Duration::from_millis((interval_ms as f64 * jitter) as u64)).await;

    let mut interval = tokio::time::interval(Duration::from_millis(interval_ms));
    loop {
        interval.tick().await;
        let seq = session.lock().await.sequence;
        if let Err(e) = rate_limited_send(&ws_write, &rate_limiter, &json!({"op": 1, "d": seq})).await
        {
            warn!(tag = %Tag::Gateway, error = %e, "heartbeat send failed, stopping heartbeat task");
            return;
        }
        debug!(tag = %Tag::Gateway, seq = ?seq, "sent heartbeat");
    }
}

async fn read_loop(
    ws_read: &mut WsStream,
    ws_write: &Arc<Mutex<WsSink>>,
    rate_limiter: &Arc<Mutex<SendRateLimiter>>,
    event_tx: &async_channel::Sender<GatewayEvent>,
    session: &Arc<Mutex<SessionState>>,
    send_rx: &mut mpsc::Receiver<serde_json::Value>,
) -> DisconnectReason {
    loop {
        tokio::select! {
            biased;

            Some(payload) = send_rx.recv() => {
                if let Err(e) = rate_limited_send(ws_write, rate_limiter, &payload).await {
                    warn!(tag = %Tag::Gateway, error = %e, "failed to send payload");
                }
            }

            msg = ws_read.next() => {
                let msg = match msg {
                    Some(Ok(m)) => m,
                    Some(Err(e)) => {
                        warn!(tag = %Tag::Gateway, error = %e, "WebSocket read error");
                        return DisconnectReason::ShouldResume;
                    }
                    None => {
                        info!(tag = %Tag::Gateway, "WebSocket stream ended");
                        return DisconnectReason::ShouldResume;
                    }
                };

                let text = match msg {
                    WsMessage::Text(text) => text,
                    WsMessage::Close(frame) => {
                        let code = frame.as_ref().map(|f| u16::from(f.code));
                        warn!(tag = %Tag::Gateway, close_code = ?code, "closed by server");
                        return code.map(close_code_reason).unwrap_or(DisconnectReason::ShouldResume);
                    }
                    // Ping/Pong/Binary
                    _ => continue,
                };

                let payload: GatewayPayload = match serde_json::from_str(&text) {
                    Ok(p) => p,
                    Err(e) => {
                        warn!(tag = %Tag::Gateway, error = %e, "failed to parse gateway payload");
                        continue;
                    }
                };

                if let Some(s) = payload.s {
                    session.lock().await.sequence = Some(s);
                }

                let event = GatewayEvent::from_payload(payload);

                match &event {
                    GatewayEvent::Ready(ready) => {
                        let mut s = session.lock().await;
                        s.session_id = Some(ready.session_id.clone());
                        s.resume_gateway_url = Some(ready.resume_gateway_url.clone());
                        info!(tag = %Tag::Gateway, session_id = %ready.session_id, "READY");
                    }
                    GatewayEvent::HeartbeatRequest => {
                        let seq = session.lock().await.sequence;
                        if let Err(e) = rate_limited_send(ws_write, rate_limiter, &json!({"op": 1, "d": seq})).await {
                            warn!(tag = %Tag::Gateway, error = %e, "failed to send requested heartbeat");
                        }
                        continue;
                    }
                    GatewayEvent::HeartbeatAck => {
                        debug!(tag = %Tag::Gateway, "heartbeat acknowledged");
                        continue;
                    }
                    GatewayEvent::Reconnect => {
                        info!(tag = %Tag::Gateway, "server requested reconnect (op 7)");
                        return DisconnectReason::ShouldResume;
                    }
                    GatewayEvent::InvalidSession(resumable) => {
                        warn!(tag = %Tag::Gateway, resumable, "session invalidated (op 9)");
                        tokio::time::sleep(Duration::from_secs(if *resumable { 2 } else { 3 })).await;
                        return if *resumable {
                            DisconnectReason::ShouldResume
                        } else {
                            DisconnectReason::ShouldReidentify
                        };
                    }
                    _ => {}
                }

                if event_tx.send(event).await.is_err() {
                    return DisconnectReason::EventChannelClosed;
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Read HELLO and return the heartbeat interval in milliseconds.
async fn read_hello(stream: &mut WsStream) -> Result<u64, GatewayError> {
    let msg = tokio::time::timeout(HELLO_TIMEOUT, stream.next())
        .await
        .map_err(|_| GatewayError::HelloTimeout)?
        .ok_or(GatewayError::StreamEnded)??;

    let text = match msg {
        WsMessage::Text(t) => t,
        other => {
            return Err(GatewayError::Protocol(format!(
                "expected text HELLO, got {:?}",
                other
            )))
        }
    };

    let payload: GatewayPayload = serde_json::from_str(&text)?;
    parse_hello(&payload)
}

fn parse_hello(payload: &GatewayPayload) -> Result<u64, GatewayError> {
    if payload.op != 10 {
        return Err(GatewayError::Protocol(format!(
            "expected op 10 (HELLO), got op {}",
            payload.op
        )));
    }
    payload
        .d
        .as_ref()
        .and_then(|d| d.get("heartbeat_interval"))
        .and_then(|v| v.as_u64())
        .ok_or_else(|| GatewayError::Protocol("HELLO missing heartbeat_interval".to_string()))
}

/// Send a JSON payload, waiting for send budget first.
async fn rate_limited_send(
    ws_write: &Mutex<WsSink>,
    rate_limiter: &Mutex<SendRateLimiter>,
    payload: &serde_json::Value,
) -> Result<(), GatewayError> {
    loop {
        let delay = rate_limiter.lock().await.delay(Instant::now());
        match delay {
            Some(d) => {
                debug!(tag = %Tag::Gateway, delay_ms = d.as_millis() as u64, "send rate-limited, waiting");
                tokio::time::sleep(d).await;
            }
            None => break,
        }
    }
    rate_limiter.lock().await.record(Instant::now());

    let text = serde_json::to_string(payload)?;
    ws_write.lock().await.send(WsMessage::text(text)).await?;
    Ok(())
}

/// Exponential backoff with jitter, capped at 60 s.
fn backoff_delay(attempt: u32) -> Duration {
    let base_ms = 1000u64 * 2u64.saturating_pow(attempt.min(6));
    let jittered = (rand::random::<f64>() * 0.5 + 0.75) * base_ms as f64;
    Duration::from_millis(jittered.min(60_000.0) as u64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn limiter_allows_sends_under_budget() {
        let now = Instant::now();
        let mut limiter = SendRateLimiter::new(3, Duration::from_secs(60));
        for _ in 0..2 {
            limiter.record(now);
        }
        assert!(limiter.delay(now).is_none());
    }

    #[test]
    fn limiter_delays_until_oldest_send_expires() {
        let start = Instant::now();
        let mut limiter = SendRateLimiter::new(2, Duration::from_secs(60));
        limiter.record(start);
        limiter.record(start + Duration::from_secs(10));

        let delay = limiter
            .delay(start + Duration::from_secs(20))
            .expect("budget exhausted");
        assert_eq!(delay, Duration::from_secs(40));
        assert!(limiter.delay(start + Duration::from_secs(61)).is_none());
    }

    #[test]
    fn fatal_close_codes_stop_the_driver() {
        for code in [4004, 4010, 4011, 4012, 4013, 4014] {
            assert_eq!(close_code_reason(code), DisconnectReason::Fatal, "{code}");
        }
    }

    #[test]
    fn session_close_codes_reidentify() {
        assert_eq!(close_code_reason(4007), DisconnectReason::ShouldReidentify);
        assert_eq!(close_code_reason(4009), DisconnectReason::ShouldReidentify);
        assert_eq!(close_code_reason(1001), DisconnectReason::ShouldResume);
        assert_eq!(close_code_reason(4000), DisconnectReason::ShouldResume);
    }

    #[test]
    fn identify_carries_intents_and_shard() {
        let config = GatewayConfig {
            token: "tok".to_string(),
            intents: Intents::default(),
            shard: Some([0, 2]),
        };
        let payload = identify_payload(&config);
        assert_eq!(payload["op"], 2);
        assert_eq!(payload["d"]["intents"], Intents::default().bits());
        assert_eq!(payload["d"]["shard"], json!([0, 2]));
    }

    #[test]
    fn resume_requires_session_and_sequence() {
        let mut state = SessionState::default();
        assert!(state.resumable().is_none());
        state.session_id = Some("abc".to_string());
        assert!(state.resumable().is_none());
        state.sequence = Some(42);
        assert_eq!(state.resumable(), Some(("abc", 42)));

        let payload = resume_payload("tok", "abc", 42);
        assert_eq!(payload["op"], 6);
        assert_eq!(payload["d"]["seq"], 42);
    }

    #[test]
    fn resume_url_gets_query_parameters() {
        assert_eq!(
            with_query("wss://resume.example.gg".to_string()),
            "wss://resume.example.gg/?v=10&encoding=json"
        );
        assert_eq!(with_query(DEFAULT_GATEWAY_URL.to_string()), DEFAULT_GATEWAY_URL);
    }

    #[test]
    fn hello_parsing() {
        let hello = GatewayPayload {
            op: 10,
            d: Some(json!({ "heartbeat_interval": 41250 })),
            s: None,
            t: None,
        };
        assert_eq!(parse_hello(&hello).unwrap(), 41250);

        let wrong = GatewayPayload { op: 0, d: None, s: None, t: None };
        assert!(matches!(parse_hello(&wrong), Err(GatewayError::Protocol(_))));
    }

    #[test]
    fn backoff_is_capped() {
        for attempt in 0..20 {
            assert!(backoff_delay(attempt) <= Duration::from_secs(60));
        }
        assert!(backoff_delay(1) >= Duration::from_millis(1500));
    }

    #[test]
    fn config_debug_redacts_token() {
        let config = GatewayConfig {
            token: "secret-token".to_string(),
            intents: Intents::default(),
            shard: None,
        };
        assert!(!format!("{config:?}").contains("secret-token"));
    }
}
