//! Typed representations of the platform API objects the bot touches.
//!
//! Only the subset needed for gateway events, interactions, command
//! registration and interaction responses is modelled; everything else is
//! left as raw JSON by the gateway layer.

use bitflags::bitflags;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_repr::{Deserialize_repr, Serialize_repr};

// ---------------------------------------------------------------------------
// Primitives
// ---------------------------------------------------------------------------

/// IDs are snowflakes transmitted as strings in JSON.
pub type Snowflake = String;

/// Milliseconds between the Unix epoch and the first second of 2015.
const SNOWFLAKE_EPOCH_MS: u64 = 1_420_070_400_000;

/// Unix-millis creation timestamp encoded in a snowflake.
pub fn snowflake_timestamp_ms(id: &str) -> Option<u64> {
    id.parse::<u64>()
        .ok()
        .map(|sf| (sf >> 22) + SNOWFLAKE_EPOCH_MS)
}

// ---------------------------------------------------------------------------
// Gateway payload (the envelope that wraps every WS message)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GatewayPayload {
    pub op: u8,
    pub d: Option<serde_json::Value>,
    pub s: Option<u64>,
    pub t: Option<String>,
}

bitflags! {
    /// Gateway intents sent with IDENTIFY.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Intents: u32 {
        const GUILDS = 1;
        const GUILD_MEMBERS = 1 << 1;
        const GUILD_PRESENCES = 1 << 8;
        const GUILD_MESSAGES = 1 << 9;
        const MESSAGE_CONTENT = 1 << 15;
    }
}

impl Default for Intents {
    fn default() -> Self {
        Intents::GUILDS | Intents::GUILD_MEMBERS | Intents::GUILD_MESSAGES | Intents::MESSAGE_CONTENT
    }
}

// ---------------------------------------------------------------------------
// Bit-flag fields
// ---------------------------------------------------------------------------

bitflags! {
    /// Message flags; only the ones the bot sets are named.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct MessageFlags: u64 {
        const SUPPRESS_EMBEDS = 1 << 2;
        const EPHEMERAL = 1 << 6;
    }
}

impl Serialize for MessageFlags {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(self.bits())
    }
}

impl<'de> Deserialize<'de> for MessageFlags {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(MessageFlags::from_bits_retain(u64::deserialize(deserializer)?))
    }
}

bitflags! {
    /// Member permissions, used for `default_member_permissions`.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Permissions: u64 {
        const KICK_MEMBERS = 1 << 1;
        const BAN_MEMBERS = 1 << 2;
        const ADMINISTRATOR = 1 << 3;
        const MANAGE_GUILD = 1 << 5;
        const MANAGE_MESSAGES = 1 << 13;
        const MODERATE_MEMBERS = 1 << 40;
    }
}

// ---------------------------------------------------------------------------
// Users, members, guilds
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct User {
    pub id: Snowflake,
    pub username: String,
    pub discriminator: Option<String>,
    pub avatar: Option<String>,
    #[serde(default)]
    pub bot: bool,
    pub global_name: Option<String>,
}

impl User {
    /// `Username#Discriminator`, or just `Username` for the new username system.
    pub fn tag(&self) -> String {
        match self.discriminator.as_deref() {
            Some("0") | None => self.username.clone(),
            Some(disc) => format!("{}#{}", self.username, disc),
        }
    }

    /// `<@id>` mention markup.
    pub fn mention(&self) -> String {
        format!("<@{}>", self.id)
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GuildMember {
    pub user: Option<User>,
    pub nick: Option<String>,
    #[serde(default)]
    pub roles: Vec<Snowflake>,
    pub joined_at: Option<String>,
    /// Permission bits as a decimal string; present on interaction members.
    pub permissions: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct UnavailableGuild {
    pub id: Snowflake,
    #[serde(default)]
    pub unavailable: bool,
}

/// Minimal GUILD_CREATE payload.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Guild {
    pub id: Snowflake,
    pub name: String,
    pub member_count: Option<u64>,
}

/// GUILD_MEMBER_ADD payload: a member object plus the guild it joined.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GuildMemberAdd {
    pub guild_id: Snowflake,
    #[serde(flatten)]
    pub member: GuildMember,
}

// ---------------------------------------------------------------------------
// Messages
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Message {
    pub id: Snowflake,
    pub channel_id: Snowflake,
    pub guild_id: Option<Snowflake>,
    pub author: User,
    #[serde(default)]
    pub content: String,
    pub timestamp: Option<String>,
    pub flags: Option<MessageFlags>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Embed {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub footer: Option<EmbedFooter>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<EmbedField>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
}

impl Embed {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn description(mut self, desc: impl Into<String>) -> Self {
        self.description = Some(desc.into());
        self
    }

    pub fn color(mut self, color: u32) -> Self {
        self.color = Some(color);
        self
    }

    pub fn field(mut self, name: impl Into<String>, value: impl Into<String>, inline: bool) -> Self {
        self.fields.push(EmbedField {
            name: name.into(),
            value: value.into(),
            inline,
        });
        self
    }

    pub fn footer(mut self, text: impl Into<String>) -> Self {
        self.footer = Some(EmbedFooter { text: text.into() });
        self
    }

    pub fn timestamp(mut self, ts: impl Into<String>) -> Self {
        self.timestamp = Some(ts.into());
        self
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EmbedFooter {
    pub text: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EmbedField {
    pub name: String,
    pub value: String,
    #[serde(default)]
    pub inline: bool,
}

// ---------------------------------------------------------------------------
// READY event payload
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ReadyEvent {
    pub v: u8,
    pub user: User,
    pub session_id: String,
    pub resume_gateway_url: String,
    #[serde(default)]
    pub guilds: Vec<UnavailableGuild>,
    pub application: ReadyApplication,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ReadyApplication {
    pub id: Snowflake,
    pub flags: Option<u64>,
}

// ---------------------------------------------------------------------------
// Interactions
// ---------------------------------------------------------------------------

/// Top-level interaction received via INTERACTION_CREATE.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Interaction {
    pub id: Snowflake,
    pub application_id: Snowflake,
    #[serde(rename = "type")]
    pub kind: InteractionType,
    pub data: Option<InteractionData>,
    pub guild_id: Option<Snowflake>,
    pub channel_id: Option<Snowflake>,
    pub member: Option<GuildMember>,
    pub user: Option<User>,
    pub token: String,
    pub locale: Option<String>,
}

impl Interaction {
    /// The user who triggered the interaction.
    pub fn author(&self) -> Option<&User> {
        self.member
            .as_ref()
            .and_then(|m| m.user.as_ref())
            .or(self.user.as_ref())
    }

    /// Whether this is a slash (chat-input) command invocation.
    pub fn is_chat_input_command(&self) -> bool {
        self.kind == InteractionType::ApplicationCommand
            && self
                .data
                .as_ref()
                .map(|d| d.kind.unwrap_or(CommandType::ChatInput) == CommandType::ChatInput)
                .unwrap_or(false)
    }

    /// Name of the invoked command, if any.
    pub fn command_name(&self) -> Option<&str> {
        self.data.as_ref()?.name.as_deref()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize_repr, Serialize_repr)]
#[repr(u8)]
pub enum InteractionType {
    Ping = 1,
    ApplicationCommand = 2,
    MessageComponent = 3,
    ApplicationCommandAutocomplete = 4,
    ModalSubmit = 5,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct InteractionData {
    pub id: Option<Snowflake>,
    pub name: Option<String>,
    /// Command type for application command interactions.
    #[serde(rename = "type")]
    pub kind: Option<CommandType>,
    /// For components: the developer-defined `custom_id`.
    pub custom_id: Option<String>,
    #[serde(default)]
    pub options: Vec<CommandDataOption>,
}

impl InteractionData {
    pub fn option(&self, name: &str) -> Option<&CommandDataOption> {
        self.options.iter().find(|o| o.name == name)
    }

    pub fn option_i64(&self, name: &str) -> Option<i64> {
        self.option(name)?.value.as_ref()?.as_i64()
    }

    pub fn option_str(&self, name: &str) -> Option<&str> {
        self.option(name)?.value.as_ref()?.as_str()
    }
}

/// An option value sent with a command invocation.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CommandDataOption {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: CommandOptionType,
    pub value: Option<serde_json::Value>,
    #[serde(default)]
    pub options: Vec<CommandDataOption>,
    #[serde(default)]
    pub focused: bool,
}

// ---------------------------------------------------------------------------
// Interaction responses (what we send back)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InteractionResponse {
    #[serde(rename = "type")]
    pub kind: InteractionCallbackType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<InteractionCallbackData>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize_repr, Deserialize_repr)]
#[repr(u8)]
pub enum InteractionCallbackType {
    Pong = 1,
    ChannelMessageWithSource = 4,
    DeferredChannelMessageWithSource = 5,
    DeferredUpdateMessage = 6,
    UpdateMessage = 7,
    ApplicationCommandAutocompleteResult = 8,
    Modal = 9,
}

/// Message body for replies, follow-ups and edits.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InteractionCallbackData {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub embeds: Option<Vec<Embed>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub flags: Option<MessageFlags>,
}

impl InteractionCallbackData {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: Some(content.into()),
            ..Default::default()
        }
    }

    pub fn embed(mut self, embed: Embed) -> Self {
        self.embeds.get_or_insert_with(Vec::new).push(embed);
        self
    }

    /// Only the invoking user will see the message.
    pub fn ephemeral(mut self) -> Self {
        self.flags = Some(self.flags.unwrap_or(MessageFlags::empty()) | MessageFlags::EPHEMERAL);
        self
    }

    pub fn is_ephemeral(&self) -> bool {
        self.flags
            .map(|f| f.contains(MessageFlags::EPHEMERAL))
            .unwrap_or(false)
    }
}

// ---------------------------------------------------------------------------
// Slash command registration payloads
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize_repr, Deserialize_repr)]
#[repr(u8)]
pub enum CommandType {
    ChatInput = 1,
    User = 2,
    Message = 3,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize_repr, Deserialize_repr)]
#[repr(u8)]
pub enum CommandOptionType {
    SubCommand = 1,
    SubCommandGroup = 2,
    String = 3,
    Integer = 4,
    Boolean = 5,
    User = 6,
    Channel = 7,
    Role = 8,
    Mentionable = 9,
    Number = 10,
    Attachment = 11,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApplicationCommand {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<Snowflake>,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<ApplicationCommandOption>,
    #[serde(rename = "type", default = "default_command_type")]
    pub kind: CommandType,
    /// Permission bits as a decimal string.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_member_permissions: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dm_permission: Option<bool>,
}

fn default_command_type() -> CommandType {
    CommandType::ChatInput
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApplicationCommandOption {
    pub name: String,
    pub description: String,
    #[serde(rename = "type")]
    pub kind: CommandOptionType,
    #[serde(default)]
    pub required: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub choices: Vec<ApplicationCommandOptionChoice>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_value: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_value: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApplicationCommandOptionChoice {
    pub name: String,
    pub value: serde_json::Value,
}

/// Ergonomic builder for [`ApplicationCommand`].
///
/// ```ignore
/// let cmd = ApplicationCommandBuilder::chat_input("ping", "Check bot latency").build();
/// ```
pub struct ApplicationCommandBuilder {
    inner: ApplicationCommand,
}

impl ApplicationCommandBuilder {
    /// Start building a CHAT_INPUT (slash) command.
    pub fn chat_input(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            inner: ApplicationCommand {
                id: None,
                name: name.into(),
                description: description.into(),
                options: Vec::new(),
                kind: CommandType::ChatInput,
                default_member_permissions: None,
                dm_permission: None,
            },
        }
    }

    /// Add an option with no choices or bounds.
    pub fn simple_option(
        self,
        kind: CommandOptionType,
        name: impl Into<String>,
        description: impl Into<String>,
        required: bool,
    ) -> Self {
        self.option(ApplicationCommandOption {
            name: name.into(),
            description: description.into(),
            kind,
            required,
            choices: Vec::new(),
            min_value: None,
            max_value: None,
        })
    }

    /// Add a fully specified option.
    pub fn option(mut self, option: ApplicationCommandOption) -> Self {
        self.inner.options.push(option);
        self
    }

    /// Restrict the command to members holding `permissions` by default.
    pub fn default_member_permissions(mut self, permissions: Permissions) -> Self {
        self.inner.default_member_permissions = Some(permissions.bits().to_string());
        self
    }

    /// Allow or forbid the command in DMs.
    pub fn dm_permission(mut self, allowed: bool) -> Self {
        self.inner.dm_permission = Some(allowed);
        self
    }

    pub fn build(self) -> ApplicationCommand {
        self.inner
    }
}
