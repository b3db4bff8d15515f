//! Test doubles shared by the relay tests.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use rustc_hash::FxHashSet;
use tokio::sync::Notify;
use wr_core::{
    Attachment, ChannelId, ChatClient, ChatError, Config, ConfigHandle, Embed, UserId,
};

pub(crate) const PRINCIPAL: &str = "42";
pub(crate) const MODERATION: &str = "100";
pub(crate) const SUBSCRIBERS: [&str; 2] = ["200", "201"];

/// One recorded platform call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Sent {
    Embed { channel: ChannelId, embed: Embed },
    File { channel: ChannelId, content: String, name: String, bytes: Vec<u8> },
    Text { channel: ChannelId, text: String },
}

impl Sent {
    pub(crate) fn channel(&self) -> &ChannelId {
        match self {
            Self::Embed { channel, .. } | Self::File { channel, .. } | Self::Text { channel, .. } => {
                channel
            }
        }
    }
}

/// A [`ChatClient`] that records every successful send.
///
/// Sends to channels marked with [`RecordingChat::fail_channel`] are rejected
/// and not recorded. Direct-message channels are named `dm-<user>`.
#[derive(Debug, Default)]
pub(crate) struct RecordingChat {
    sent: Mutex<Vec<Sent>>,
    failing: Mutex<FxHashSet<ChannelId>>,
    fail_dm: Mutex<bool>,
    changed: Notify,
}

impl RecordingChat {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub(crate) fn fail_channel(&self, channel: &str) {
        self.failing.lock().insert(ChannelId::new(channel));
    }

    pub(crate) fn fail_direct_messages(&self) {
        *self.fail_dm.lock() = true;
    }

    pub(crate) fn sent(&self) -> Vec<Sent> {
        self.sent.lock().clone()
    }

    pub(crate) fn files_to(&self, channel: &str) -> Vec<(String, Vec<u8>)> {
        self.sent
            .lock()
            .iter()
            .filter_map(|s| match s {
                Sent::File { channel: c, content, bytes, .. } if c.as_str() == channel => {
                    Some((content.clone(), bytes.clone()))
                }
                _ => None,
            })
            .collect()
    }

    pub(crate) fn texts_to(&self, channel: &str) -> Vec<String> {
        self.sent
            .lock()
            .iter()
            .filter_map(|s| match s {
                Sent::Text { channel: c, text } if c.as_str() == channel => Some(text.clone()),
                _ => None,
            })
            .collect()
    }

    /// Waits until at least `count` sends have been recorded.
    pub(crate) async fn wait_for(&self, count: usize) {
        let wait = async {
            loop {
                let notified = self.changed.notified();
                if self.sent.lock().len() >= count {
                    return;
                }
                notified.await;
            }
        };
        tokio::time::timeout(Duration::from_secs(5), wait)
            .await
            .unwrap_or_else(|_| panic!("timed out waiting for {count} sends: {:?}", self.sent()));
    }

    fn push(&self, channel: &ChannelId, sent: Sent) -> Result<(), ChatError> {
        if self.failing.lock().contains(channel) {
            return Err(ChatError::Rejected {
                status: 403,
                body: "Missing Access".to_owned(),
            });
        }
        self.sent.lock().push(sent);
        self.changed.notify_waiters();
        Ok(())
    }
}

#[async_trait]
impl ChatClient for RecordingChat {
    async fn send_embed(&self, channel: &ChannelId, embed: &Embed) -> Result<(), ChatError> {
        self.push(
            channel,
            Sent::Embed {
                channel: channel.clone(),
                embed: embed.clone(),
            },
        )
    }

    async fn send_file(
        &self,
        channel: &ChannelId,
        content: &str,
        attachment: &Attachment,
    ) -> Result<(), ChatError> {
        self.push(
            channel,
            Sent::File {
                channel: channel.clone(),
                content: content.to_owned(),
                name: attachment.name.clone(),
                bytes: attachment.bytes.clone(),
            },
        )
    }

    async fn send_text(&self, channel: &ChannelId, text: &str) -> Result<(), ChatError> {
        self.push(
            channel,
            Sent::Text {
                channel: channel.clone(),
                text: text.to_owned(),
            },
        )
    }

    async fn open_direct_channel(&self, user: &UserId) -> Result<ChannelId, ChatError> {
        if *self.fail_dm.lock() {
            return Err(ChatError::transport("direct messages unavailable"));
        }
        Ok(ChannelId::new(format!("dm-{user}")))
    }
}

/// A valid configuration addressed at the test channels.
pub(crate) fn config() -> Config {
    let mut config = Config::default();
    config.discord.token = "test-token".to_owned();
    config.discord.principal = UserId::new(PRINCIPAL);
    config.discord.moderation_channel = ChannelId::new(MODERATION);
    config.discord.subscriber_channels = SUBSCRIBERS.iter().copied().map(ChannelId::from).collect();
    config.watch.dir = "/srv/files".into();
    config.watch.artifacts_dir = "/srv/files/shots".into();
    config
}

pub(crate) fn config_handle() -> Arc<ConfigHandle> {
    Arc::new(ConfigHandle::new("config.toml", config()))
}
