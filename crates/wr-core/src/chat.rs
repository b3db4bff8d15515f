//! Chat platform boundary.
//!
//! The relay core never talks to a concrete platform. It sends through the
//! [`ChatClient`] trait and receives [`IncomingMessage`] values over a channel
//! fed by whichever adapter is running (`wr-discord` in production, a
//! recording double in tests).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::types::{ChannelId, NotificationField, NotificationPage, UserId};

/// Errors reported by a [`ChatClient`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ChatError {
    /// The request never reached the platform, or the connection dropped.
    #[error("chat transport error: {0}")]
    Transport(String),

    /// The platform answered with a non-success status.
    #[error("chat platform rejected request ({status}): {body}")]
    Rejected {
        /// HTTP-like status code returned by the platform.
        status: u16,
        /// Response body, useful for diagnostics.
        body: String,
    },

    /// The platform answered with a payload we could not decode.
    #[error("unexpected chat response: {0}")]
    Decode(String),
}

impl ChatError {
    /// Creates a [`ChatError::Transport`] from anything displayable.
    #[inline]
    pub fn transport(err: impl std::fmt::Display) -> Self {
        Self::Transport(err.to_string())
    }
}

/// A titled, colored page of fields (a Discord "embed").
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Embed {
    /// Heading shown above the fields.
    pub title: String,

    /// Accent color as `0xRRGGBB`.
    pub color: u32,

    /// Ordered fields.
    pub fields: Vec<NotificationField>,
}

impl Embed {
    /// Builds an embed from a digest page.
    #[must_use]
    pub fn from_page(title: impl Into<String>, color: u32, page: &NotificationPage) -> Self {
        Self {
            title: title.into(),
            color,
            fields: page.fields().to_vec(),
        }
    }
}

/// A file to upload, already read into memory.
#[derive(Clone, PartialEq, Eq)]
pub struct Attachment {
    /// File name presented to chat users.
    pub name: String,

    /// Raw file contents.
    pub bytes: Vec<u8>,
}

impl Attachment {
    /// Creates an attachment.
    #[inline]
    #[must_use]
    pub fn new(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            bytes,
        }
    }
}

impl std::fmt::Debug for Attachment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Attachment")
            .field("name", &self.name)
            .field("len", &self.bytes.len())
            .finish()
    }
}

/// A message received from the chat platform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IncomingMessage {
    /// Author of the message.
    pub author: UserId,

    /// Whether the author is a bot account (including ourselves).
    pub author_is_bot: bool,

    /// Channel the message was posted in.
    pub channel: ChannelId,

    /// Raw message text.
    pub text: String,
}

impl IncomingMessage {
    /// Creates a message from a human author.
    #[must_use]
    pub fn new(author: impl Into<UserId>, channel: impl Into<ChannelId>, text: impl Into<String>) -> Self {
        Self {
            author: author.into(),
            author_is_bot: false,
            channel: channel.into(),
            text: text.into(),
        }
    }
}

/// Outbound operations the relay needs from a chat platform.
///
/// Implementations must be cheap to share behind an `Arc` and safe to call
/// from many tasks at once.
#[async_trait]
pub trait ChatClient: Send + Sync + 'static {
    /// Posts an embed to `channel`.
    async fn send_embed(&self, channel: &ChannelId, embed: &Embed) -> Result<(), ChatError>;

    /// Uploads `attachment` to `channel` with `content` as the message text.
    async fn send_file(
        &self,
        channel: &ChannelId,
        content: &str,
        attachment: &Attachment,
    ) -> Result<(), ChatError>;

    /// Posts a plain text message to `channel`.
    async fn send_text(&self, channel: &ChannelId, text: &str) -> Result<(), ChatError>;

    /// Opens (or fetches) the direct-message channel with `user`.
    async fn open_direct_channel(&self, user: &UserId) -> Result<ChannelId, ChatError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_embed_from_page_keeps_field_order() {
        let mut page = NotificationPage::new();
        page.push(NotificationField::new("Create File", "/a"));
        page.push(NotificationField::new("Remove File", "/b"));

        let embed = Embed::from_page("Latest Updates", 0x00ff_00, &page);
        assert_eq!(embed.title, "Latest Updates");
        assert_eq!(embed.fields.len(), 2);
        assert_eq!(embed.fields[1].value, "/b");
    }

    #[test]
    fn test_attachment_debug_hides_bytes() {
        let attachment = Attachment::new("x.png", vec![0; 1024]);
        let debug = format!("{attachment:?}");
        assert!(debug.contains("x.png"));
        assert!(debug.contains("1024"));
        assert!(!debug.contains("[0, 0"));
    }

    #[test]
    fn test_chat_error_display() {
        let err = ChatError::Rejected {
            status: 403,
            body: "Missing Permissions".to_owned(),
        };
        assert!(err.to_string().contains("403"));
        assert!(err.to_string().contains("Missing Permissions"));
    }
}
