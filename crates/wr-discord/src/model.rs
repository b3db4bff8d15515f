//! Discord wire payloads.
//!
//! Only the fields watch-relay reads or writes are modelled. Unknown fields in
//! responses are ignored.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use wr_core::{ChannelId, Embed, IncomingMessage, UserId};

// ============================================================================
// REST
// ============================================================================

/// Body of `POST /channels/{id}/messages`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CreateMessage<'a> {
    /// Message text.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<&'a str>,

    /// Rich embeds.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub embeds: Vec<EmbedPayload<'a>>,

    /// Attachment metadata matching the multipart `files[n]` parts.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub attachments: Vec<AttachmentPayload<'a>>,
}

/// One embed in a message body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EmbedPayload<'a> {
    /// Heading.
    pub title: &'a str,
    /// Accent color.
    pub color: u32,
    /// Ordered fields.
    pub fields: Vec<EmbedFieldPayload<'a>>,
}

/// Longest field name the platform accepts, in characters.
pub const MAX_FIELD_NAME_CHARS: usize = 256;

/// Longest field value the platform accepts, in characters.
pub const MAX_FIELD_VALUE_CHARS: usize = 1024;

/// Cuts `text` to at most `max` characters.
fn truncate_chars(text: &str, max: usize) -> &str {
    text.char_indices().nth(max).map_or(text, |(end, _)| &text[..end])
}

impl<'a> From<&'a Embed> for EmbedPayload<'a> {
    fn from(embed: &'a Embed) -> Self {
        Self {
            title: &embed.title,
            color: embed.color,
            fields: embed
                .fields
                .iter()
                .map(|f| EmbedFieldPayload {
                    name: truncate_chars(&f.label, MAX_FIELD_NAME_CHARS),
                    value: truncate_chars(&f.value, MAX_FIELD_VALUE_CHARS),
                    inline: false,
                })
                .collect(),
        }
    }
}

/// One embed field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EmbedFieldPayload<'a> {
    /// Field label.
    pub name: &'a str,
    /// Field value.
    pub value: &'a str,
    /// Whether the field shares a row with its neighbours.
    pub inline: bool,
}

/// Attachment metadata referencing an uploaded file part.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AttachmentPayload<'a> {
    /// Index of the `files[n]` part.
    pub id: u32,
    /// File name shown in chat.
    pub filename: &'a str,
}

/// Body of `POST /users/@me/channels`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CreateDm<'a> {
    /// User to open the DM with.
    pub recipient_id: &'a str,
}

/// The part of a channel object we need.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ChannelResponse {
    /// Channel id.
    pub id: ChannelId,
}

/// Body of a 429 response.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RateLimitResponse {
    /// Seconds to wait before retrying.
    pub retry_after: f64,
}

// ============================================================================
// Gateway
// ============================================================================

/// Gateway opcodes used by watch-relay.
pub mod opcode {
    /// An event was dispatched.
    pub const DISPATCH: u8 = 0;
    /// Keep-alive, sent by either side.
    pub const HEARTBEAT: u8 = 1;
    /// Starts a new session.
    pub const IDENTIFY: u8 = 2;
    /// The server asks us to reconnect.
    pub const RECONNECT: u8 = 7;
    /// The session is no longer valid.
    pub const INVALID_SESSION: u8 = 9;
    /// First message after connecting.
    pub const HELLO: u8 = 10;
    /// Acknowledges a heartbeat.
    pub const HEARTBEAT_ACK: u8 = 11;
}

/// `GUILD_MESSAGES | DIRECT_MESSAGES | MESSAGE_CONTENT`.
pub const INTENTS: u64 = (1 << 9) | (1 << 12) | (1 << 15);

/// A raw gateway frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GatewayPayload {
    /// Opcode.
    pub op: u8,
    /// Event data.
    #[serde(default)]
    pub d: Value,
    /// Sequence number, dispatches only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub s: Option<u64>,
    /// Event name, dispatches only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub t: Option<String>,
}

/// Data of an `op 10 Hello`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct Hello {
    /// Heartbeat period in milliseconds.
    pub heartbeat_interval: u64,
}

/// Data of an `op 2 Identify`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Identify<'a> {
    /// Bot token.
    pub token: &'a str,
    /// Gateway intents.
    pub intents: u64,
    /// Client properties.
    pub properties: IdentifyProperties,
}

/// Client properties sent with Identify.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IdentifyProperties {
    /// Operating system.
    pub os: &'static str,
    /// Library name.
    pub browser: &'static str,
    /// Library name.
    pub device: &'static str,
}

impl Default for IdentifyProperties {
    fn default() -> Self {
        Self {
            os: std::env::consts::OS,
            browser: "watch-relay",
            device: "watch-relay",
        }
    }
}

/// Data of a `MESSAGE_CREATE` dispatch.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct MessageCreate {
    /// Channel the message was posted in.
    pub channel_id: ChannelId,
    /// Message text. Empty without the message content intent.
    #[serde(default)]
    pub content: String,
    /// Author.
    pub author: Author,
}

/// Message author.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Author {
    /// User id.
    pub id: UserId,
    /// Set for bot accounts.
    #[serde(default)]
    pub bot: bool,
}

impl From<MessageCreate> for IncomingMessage {
    fn from(msg: MessageCreate) -> Self {
        Self {
            author: msg.author.id,
            author_is_bot: msg.author.bot,
            channel: msg.channel_id,
            text: msg.content,
        }
    }
}
