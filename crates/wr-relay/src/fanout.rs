//! Delivery to subscriber channels.

use std::sync::Arc;

use tracing::{debug, warn};
use wr_core::{Attachment, ChannelId, ChatClient, Embed};

use crate::alert::Alerter;
use crate::error::RelayError;

/// Outcome of sending one batch to every subscriber.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchReport {
    /// Successful platform sends.
    pub delivered: usize,

    /// Failed platform sends. Each one was reported.
    pub failed: usize,
}

impl DispatchReport {
    /// Returns `true` if no send failed.
    #[inline]
    #[must_use]
    pub const fn is_clean(&self) -> bool {
        self.failed == 0
    }

    fn record(&mut self, ok: bool) {
        if ok {
            self.delivered += 1;
        } else {
            self.failed += 1;
        }
    }
}

/// Sends finished pages and captioned artifacts to subscriber channels.
///
/// One platform send per channel per item. A failed send is reported through
/// the [`Alerter`] and the remaining sends go ahead.
#[derive(Clone)]
pub struct Fanout {
    chat: Arc<dyn ChatClient>,
    alerter: Alerter,
}

impl std::fmt::Debug for Fanout {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Fanout").field("alerter", &self.alerter).finish_non_exhaustive()
    }
}

impl Fanout {
    /// Creates a fanout over `chat`.
    #[must_use]
    pub fn new(chat: Arc<dyn ChatClient>, alerter: Alerter) -> Self {
        Self { chat, alerter }
    }

    /// Sends every embed to every channel, channel by channel.
    pub async fn send_pages(&self, channels: &[ChannelId], embeds: &[Embed]) -> DispatchReport {
        let mut report = DispatchReport::default();
        for channel in channels {
            for embed in embeds {
                let result = self.chat.send_embed(channel, embed).await;
                report.record(result.is_ok());
                if let Err(err) = result {
                    warn!(channel = %channel, "digest page not delivered");
                    self.alerter.report(RelayError::chat(channel, err)).await;
                }
            }
        }
        debug!(pages = embeds.len(), delivered = report.delivered, "digest dispatched");
        report
    }

    /// Sends the artifact with `caption` as message text to every channel.
    pub async fn send_artifact(
        &self,
        channels: &[ChannelId],
        caption: &str,
        attachment: &Attachment,
    ) -> DispatchReport {
        let mut report = DispatchReport::default();
        for channel in channels {
            let result = self.chat.send_file(channel, caption, attachment).await;
            report.record(result.is_ok());
            if let Err(err) = result {
                warn!(channel = %channel, file = %attachment.name, "artifact not delivered");
                self.alerter.report(RelayError::chat(channel, err)).await;
            }
        }
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{config_handle, RecordingChat, Sent};
    use wr_core::{NotificationField, NotificationPage};

    fn fanout(chat: &Arc<RecordingChat>) -> (Fanout, crate::alert::FatalReceiver) {
        let (alerter, fatal_rx) = Alerter::new(chat.clone(), config_handle());
        (Fanout::new(chat.clone(), alerter), fatal_rx)
    }

    fn channels(ids: &[&str]) -> Vec<ChannelId> {
        ids.iter().copied().map(ChannelId::from).collect()
    }

    #[tokio::test]
    async fn test_pages_go_to_every_channel_in_order() {
        let chat = RecordingChat::new();
        let (fanout, _fatal) = fanout(&chat);

        let mut page = NotificationPage::new();
        page.push(NotificationField::new("Create File", "/d/a.txt"));
        let embeds = [
            Embed::from_page("Latest Updates", 0, &page),
            Embed::from_page("Latest Updates", 0, &page),
        ];

        let report = fanout.send_pages(&channels(&["200", "201"]), &embeds).await;

        assert_eq!(report, DispatchReport { delivered: 4, failed: 0 });
        let order: Vec<_> = chat.sent().iter().map(|s| s.channel().as_str().to_owned()).collect();
        assert_eq!(order, ["200", "200", "201", "201"]);
    }

    #[tokio::test]
    async fn test_one_failing_channel_does_not_stop_the_rest() {
        let chat = RecordingChat::new();
        chat.fail_channel("200");
        let (fanout, mut fatal) = fanout(&chat);

        let attachment = Attachment::new("x.png", vec![1, 2, 3]);
        let report = fanout
            .send_artifact(&channels(&["200", "201", "202"]), "sunset", &attachment)
            .await;

        assert_eq!(report, DispatchReport { delivered: 2, failed: 1 });
        assert!(!report.is_clean());

        let files: Vec<_> = chat
            .sent()
            .into_iter()
            .filter_map(|s| match s {
                Sent::File { channel, content, .. } => Some((channel, content)),
                _ => None,
            })
            .collect();
        assert_eq!(
            files,
            vec![
                (ChannelId::new("201"), "sunset".to_owned()),
                (ChannelId::new("202"), "sunset".to_owned()),
            ]
        );

        // The failure was reported to the principal, and reporting succeeded.
        assert_eq!(chat.texts_to("dm-42"), [crate::alert::ALERT_TEXT]);
        assert!(fatal.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_no_channels_sends_nothing() {
        let chat = RecordingChat::new();
        let (fanout, _fatal) = fanout(&chat);
        let report = fanout.send_artifact(&[], "c", &Attachment::new("a", Vec::new())).await;
        assert_eq!(report, DispatchReport::default());
        assert!(chat.sent().is_empty());
    }
}
