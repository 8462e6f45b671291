//! Typed gateway events.
//!
//! The gateway module deserialises dispatch payloads into [`GatewayEvent`] so
//! listeners pattern-match on typed data instead of raw JSON. Dispatch events
//! the bot has no typed variant for are kept as [`GatewayEvent::Dispatch`]
//! with their name, so listeners can still subscribe to them by name.

use serde::de::DeserializeOwned;
use tracing::warn;

use crate::tags::Tag;
use crate::types::*;

/// Dispatch event names a listener may subscribe to.
pub const KNOWN_DISPATCH_EVENTS: &[&str] = &[
    "READY",
    "RESUMED",
    "INTERACTION_CREATE",
    "MESSAGE_CREATE",
    "MESSAGE_UPDATE",
    "MESSAGE_DELETE",
    "GUILD_CREATE",
    "GUILD_UPDATE",
    "GUILD_DELETE",
    "GUILD_MEMBER_ADD",
    "GUILD_MEMBER_UPDATE",
    "GUILD_MEMBER_REMOVE",
    "GUILD_BAN_ADD",
    "GUILD_BAN_REMOVE",
    "CHANNEL_CREATE",
    "CHANNEL_UPDATE",
    "CHANNEL_DELETE",
    "THREAD_CREATE",
    "MESSAGE_REACTION_ADD",
    "MESSAGE_REACTION_REMOVE",
    "PRESENCE_UPDATE",
    "TYPING_START",
    "VOICE_STATE_UPDATE",
];

/// Whether `name` is a dispatch event identifier the gateway can deliver.
pub fn is_known_dispatch_event(name: &str) -> bool {
    KNOWN_DISPATCH_EVENTS.contains(&name)
}

/// A fully-parsed event coming off the gateway.
#[derive(Debug, Clone)]
pub enum GatewayEvent {
    /// We've successfully identified; the bot is ready.
    Ready(ReadyEvent),

    /// A slash command, component or modal interaction.
    InteractionCreate(Interaction),

    /// A message was created in a channel we can see.
    MessageCreate(Message),

    /// Guild object sent lazily after READY or on join.
    GuildCreate(Guild),

    /// A user joined a guild.
    GuildMemberAdd(GuildMemberAdd),

    /// Any other op-0 dispatch, kept as raw JSON.
    Dispatch {
        name: String,
        data: Option<serde_json::Value>,
    },

    /// Heartbeat ACK from the gateway (op 11).
    HeartbeatAck,

    /// The gateway is asking us to heartbeat immediately (op 1).
    HeartbeatRequest,

    /// Gateway told us to reconnect (op 7).
    Reconnect,

    /// Session has been invalidated (op 9); `true` if resumable.
    InvalidSession(bool),

    /// A non-dispatch opcode we don't handle.
    Unknown { op: u8 },
}

impl GatewayEvent {
    /// Convert a raw [`GatewayPayload`] into a typed event. Never fails.
    pub fn from_payload(payload: GatewayPayload) -> Self {
        match payload.op {
            0 => match payload.t {
                Some(name) => Self::parse_dispatch(name, payload.d),
                None => GatewayEvent::Unknown { op: 0 },
            },
            1 => GatewayEvent::HeartbeatRequest,
            7 => GatewayEvent::Reconnect,
            9 => GatewayEvent::InvalidSession(
                payload.d.as_ref().and_then(|v| v.as_bool()).unwrap_or(false),
            ),
            11 => GatewayEvent::HeartbeatAck,
            op => GatewayEvent::Unknown { op },
        }
    }

    fn parse_dispatch(name: String, data: Option<serde_json::Value>) -> Self {
        let Some(d) = data else {
            return GatewayEvent::Dispatch { name, data: None };
        };

        match name.as_str() {
            "READY" => typed(name, d, GatewayEvent::Ready),
            "INTERACTION_CREATE" => typed(name, d, GatewayEvent::InteractionCreate),
            "MESSAGE_CREATE" => typed(name, d, GatewayEvent::MessageCreate),
            "GUILD_CREATE" => typed(name, d, GatewayEvent::GuildCreate),
            "GUILD_MEMBER_ADD" => typed(name, d, GatewayEvent::GuildMemberAdd),
            _ => GatewayEvent::Dispatch {
                name,
                data: Some(d),
            },
        }
    }

    /// The dispatch event name listeners subscribe to, if this is a dispatch.
    pub fn name(&self) -> Option<&str> {
        match self {
            GatewayEvent::Ready(_) => Some("READY"),
            GatewayEvent::InteractionCreate(_) => Some("INTERACTION_CREATE"),
            GatewayEvent::MessageCreate(_) => Some("MESSAGE_CREATE"),
            GatewayEvent::GuildCreate(_) => Some("GUILD_CREATE"),
            GatewayEvent::GuildMemberAdd(_) => Some("GUILD_MEMBER_ADD"),
            GatewayEvent::Dispatch { name, .. } => Some(name),
            _ => None,
        }
    }

    /// Raw data of an untyped dispatch, deserialised into `T`.
    pub fn parse_data<T: DeserializeOwned>(&self) -> Option<T> {
        match self {
            GatewayEvent::Dispatch { data: Some(d), .. } => serde_json::from_value(d.clone()).ok(),
            _ => None,
        }
    }
}

/// Deserialise `d` into a typed variant, falling back to a raw dispatch.
fn typed<T: DeserializeOwned>(
    name: String,
    d: serde_json::Value,
    wrap: impl FnOnce(T) -> GatewayEvent,
) -> GatewayEvent {
    match serde_json::from_value::<T>(d.clone()) {
        Ok(v) => wrap(v),
        Err(e) => {
            warn!(tag = %Tag::Gateway, event = %name, error = %e, "failed to parse dispatch payload");
            GatewayEvent::Dispatch {
                name,
                data: Some(d),
            }
        }
    }
}
