//! Problem reporting.
//!
//! Non-fatal problems are logged and the principal gets a short direct
//! message pointing at the logs. When even that message cannot be delivered,
//! or when the problem itself is fatal, the error is forwarded on the fatal
//! channel and the binary shuts down.

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{error, warn};
use wr_core::{ChatClient, ChatError, ConfigHandle};

use crate::error::RelayError;

/// Text of the direct message sent to the principal when something goes wrong.
pub const ALERT_TEXT: &str = "Watcher Bot had an issue. Check the logs";

/// Receiving end of the fatal channel, awaited by the binary.
pub type FatalReceiver = mpsc::UnboundedReceiver<RelayError>;

/// Reports problems to the log, the principal, and the fatal channel.
#[derive(Clone)]
pub struct Alerter {
    chat: Arc<dyn ChatClient>,
    config: Arc<ConfigHandle>,
    fatal_tx: mpsc::UnboundedSender<RelayError>,
}

impl std::fmt::Debug for Alerter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Alerter")
            .field("fatal_closed", &self.fatal_tx.is_closed())
            .finish_non_exhaustive()
    }
}

impl Alerter {
    /// Creates an alerter and the receiver for fatal errors.
    #[must_use]
    pub fn new(chat: Arc<dyn ChatClient>, config: Arc<ConfigHandle>) -> (Self, FatalReceiver) {
        let (fatal_tx, fatal_rx) = mpsc::unbounded_channel();
        (
            Self {
                chat,
                config,
                fatal_tx,
            },
            fatal_rx,
        )
    }

    /// Logs `err` and tells the principal to check the logs.
    ///
    /// Fatal errors are additionally forwarded on the fatal channel. If the
    /// direct message itself fails, that failure is fatal.
    pub async fn report(&self, err: RelayError) {
        error!(error = %err, "relay problem");

        if let Err(alert_err) = self.alert_principal().await {
            self.fatal(RelayError::AlertFailed(alert_err));
        }
        if err.is_fatal() {
            self.fatal(err);
        }
    }

    /// Forwards `err` on the fatal channel without messaging the principal.
    pub fn fatal(&self, err: RelayError) {
        error!(error = %err, "fatal relay error");
        if self.fatal_tx.send(err).is_err() {
            warn!("fatal channel closed, shutdown already in progress");
        }
    }

    async fn alert_principal(&self) -> Result<(), ChatError> {
        let principal = self.config.snapshot().discord.principal.clone();
        let dm = self.chat.open_direct_channel(&principal).await?;
        self.chat.send_text(&dm, ALERT_TEXT).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{config_handle, RecordingChat, Sent};
    use wr_core::ChannelId;

    #[tokio::test]
    async fn test_report_messages_principal() {
        let chat = RecordingChat::new();
        let (alerter, mut fatal_rx) = Alerter::new(chat.clone(), config_handle());

        alerter
            .report(RelayError::chat(&ChannelId::new("200"), ChatError::transport("reset")))
            .await;

        assert_eq!(
            chat.sent(),
            vec![Sent::Text {
                channel: ChannelId::new("dm-42"),
                text: ALERT_TEXT.to_owned(),
            }]
        );
        assert!(fatal_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_failed_alert_is_fatal() {
        let chat = RecordingChat::new();
        chat.fail_direct_messages();
        let (alerter, mut fatal_rx) = Alerter::new(chat.clone(), config_handle());

        alerter
            .report(RelayError::chat(&ChannelId::new("200"), ChatError::transport("reset")))
            .await;

        let fatal = fatal_rx.try_recv().unwrap();
        assert!(matches!(fatal, RelayError::AlertFailed(_)));
        assert!(fatal.is_fatal());
    }

    #[tokio::test]
    async fn test_fatal_errors_are_forwarded_after_alerting() {
        let chat = RecordingChat::new();
        let (alerter, mut fatal_rx) = Alerter::new(chat.clone(), config_handle());

        alerter
            .report(RelayError::Watch(wr_watcher::WatchError::ChannelClosed))
            .await;

        assert_eq!(chat.sent().len(), 1);
        assert!(matches!(fatal_rx.try_recv().unwrap(), RelayError::Watch(_)));
    }
}
