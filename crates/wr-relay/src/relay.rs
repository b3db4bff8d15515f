//! The caption handshake.
//!
//! Each new artifact runs through its own task:
//!
//! ```text
//!   Posted ──► AwaitingReply ──► Resolved ──► fanout to subscribers
//!     │              │
//!     └──► Failed    └──► TimedOut (only with relay.caption_timeout_secs)
//! ```
//!
//! The artifact's file handle is opened once, held across the wait, and
//! rewound before the second read. It is released on every exit path by
//! dropping the [`PendingHandshake`].

use std::io::ErrorKind;
use std::sync::Arc;
use std::time::Duration;

use camino::{Utf8Path, Utf8PathBuf};
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use wr_core::Attachment;

use crate::context::RelayContext;
use crate::correlation::{Caption, CorrelationToken, PendingReply};
use crate::error::RelayError;
use crate::fanout::DispatchReport;

/// How a handshake ended, when it did not fail outright.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelayOutcome {
    /// The principal captioned the artifact and it went to the subscribers.
    Delivered {
        /// Token of the handshake.
        token: CorrelationToken,
        /// Caption sent with the artifact.
        caption: String,
        /// Per-channel delivery counts.
        report: DispatchReport,
    },

    /// No caption arrived within the configured timeout.
    TimedOut {
        /// Token of the handshake.
        token: CorrelationToken,
    },

    /// The registration vanished before a caption arrived.
    Abandoned {
        /// Token of the handshake.
        token: CorrelationToken,
    },
}

enum Wait {
    Captioned(Caption),
    TimedOut,
    Closed,
}

/// An artifact posted for captioning, waiting for its reply.
#[derive(Debug)]
pub struct PendingHandshake {
    path: Utf8PathBuf,
    file_name: String,
    file: File,
    reply: PendingReply,
}

impl PendingHandshake {
    /// The handshake's token.
    #[inline]
    #[must_use]
    pub const fn token(&self) -> CorrelationToken {
        self.reply.token()
    }

    /// Name the artifact is uploaded under.
    #[inline]
    #[must_use]
    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    /// Waits for the caption, giving up after `timeout` if one is set.
    async fn await_caption(&mut self, timeout: Option<Duration>) -> Wait {
        let caption = match timeout {
            Some(limit) => match tokio::time::timeout(limit, self.reply.recv()).await {
                Ok(caption) => caption,
                Err(_elapsed) => return Wait::TimedOut,
            },
            None => self.reply.recv().await,
        };
        caption.map_or(Wait::Closed, Wait::Captioned)
    }

    /// Re-reads the artifact from the start through the held handle.
    async fn reread(&mut self) -> Result<Attachment, RelayError> {
        self.file
            .rewind()
            .await
            .map_err(|e| RelayError::artifact(&self.path, e))?;
        let bytes = read_all(&mut self.file, &self.path).await?;
        Ok(Attachment::new(self.file_name.clone(), bytes))
    }
}

/// Runs one handshake to completion.
///
/// The token is registered before the artifact is posted, so a reply can
/// never arrive ahead of its registration.
pub async fn relay_artifact(
    ctx: &RelayContext,
    path: &Utf8Path,
) -> Result<RelayOutcome, RelayError> {
    let file_name = path
        .file_name()
        .ok_or_else(|| {
            RelayError::artifact(path, std::io::Error::new(ErrorKind::InvalidInput, "no file name"))
        })?
        .to_owned();

    let mut file = File::open(path)
        .await
        .map_err(|e| RelayError::artifact(path, e))?;
    let bytes = read_all(&mut file, path).await?;

    let token = ctx.tokens().allocate();
    let reply = ctx.registry().register(token);
    let mut handshake = PendingHandshake {
        path: path.to_owned(),
        file_name,
        file,
        reply,
    };

    // Posted
    let config = ctx.config().snapshot();
    let moderation = &config.discord.moderation_channel;
    let staged = Attachment::new(handshake.file_name.clone(), bytes);
    ctx.chat()
        .send_file(moderation, &token.to_string(), &staged)
        .await
        .map_err(|e| RelayError::chat(moderation, e))?;
    drop(staged);
    info!(token = %token, file = %handshake.file_name, "artifact awaiting caption");

    // AwaitingReply
    let timeout = config.relay.caption_timeout();
    let caption = match handshake.await_caption(timeout).await {
        Wait::Captioned(caption) => caption,
        Wait::TimedOut => {
            let file_name = handshake.file_name.clone();
            drop(handshake);
            warn!(token = %token, file = %file_name, "no caption received, artifact dropped");
            let notice = format!("{token} expired without a caption, {file_name} was not relayed");
            if let Err(err) = ctx.chat().send_text(moderation, &notice).await {
                ctx.alerter().report(RelayError::chat(moderation, err)).await;
            }
            return Ok(RelayOutcome::TimedOut { token });
        }
        Wait::Closed => {
            debug!(token = %token, "handshake abandoned");
            return Ok(RelayOutcome::Abandoned { token });
        }
    };

    // Resolved
    let attachment = handshake.reread().await?;
    drop(handshake);

    // Subscriber lists may have been reloaded while we waited.
    let subscribers = ctx.config().snapshot().discord.subscriber_channels.clone();
    let report = ctx
        .fanout()
        .send_artifact(&subscribers, &caption.text, &attachment)
        .await;
    info!(
        token = %token,
        file = %attachment.name,
        delivered = report.delivered,
        failed = report.failed,
        "artifact relayed"
    );

    Ok(RelayOutcome::Delivered {
        token,
        caption: caption.text,
        report,
    })
}

/// Spawns a handshake task. Errors are reported, never propagated.
pub fn spawn_relay(ctx: Arc<RelayContext>, path: Utf8PathBuf) -> JoinHandle<Option<RelayOutcome>> {
    tokio::spawn(async move {
        match relay_artifact(&ctx, &path).await {
            Ok(outcome) => Some(outcome),
            Err(err) => {
                ctx.alerter().report(err).await;
                None
            }
        }
    })
}

async fn read_all(file: &mut File, path: &Utf8Path) -> Result<Vec<u8>, RelayError> {
    let mut bytes = Vec::new();
    file.read_to_end(&mut bytes)
        .await
        .map_err(|e| RelayError::artifact(path, e))?;
    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inbound::dispatch;
    use crate::testing::{config, RecordingChat, Sent, MODERATION, PRINCIPAL, SUBSCRIBERS};
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;
    use wr_core::{ConfigHandle, IncomingMessage};

    fn artifact(dir: &TempDir, name: &str, bytes: &[u8]) -> Utf8PathBuf {
        let path = Utf8PathBuf::from_path_buf(dir.path().join(name)).unwrap();
        std::fs::write(&path, bytes).unwrap();
        path
    }

    fn context(chat: &Arc<RecordingChat>, config: wr_core::Config) -> Arc<RelayContext> {
        let handle = Arc::new(ConfigHandle::new("config.toml", config));
        let (ctx, _fatal_rx) = RelayContext::new(chat.clone(), handle);
        ctx
    }

    #[tokio::test]
    async fn test_captioned_artifact_reaches_every_subscriber() {
        let dir = TempDir::new().unwrap();
        let path = artifact(&dir, "x.png", b"\x89PNG fake");
        let chat = RecordingChat::new();
        let ctx = context(&chat, config());

        let task = spawn_relay(Arc::clone(&ctx), path);

        chat.wait_for(1).await;
        assert_eq!(chat.files_to(MODERATION), vec![("#0".to_owned(), b"\x89PNG fake".to_vec())]);

        dispatch(&ctx, IncomingMessage::new(PRINCIPAL, MODERATION, "#0 sunset over the bay")).await;

        let outcome = task.await.unwrap().unwrap();
        assert_eq!(
            outcome,
            RelayOutcome::Delivered {
                token: CorrelationToken::new(0),
                caption: "sunset over the bay".to_owned(),
                report: DispatchReport { delivered: 2, failed: 0 },
            }
        );
        for channel in SUBSCRIBERS {
            assert_eq!(
                chat.files_to(channel),
                vec![("sunset over the bay".to_owned(), b"\x89PNG fake".to_vec())]
            );
        }
        assert_eq!(ctx.registry().pending_count(), 0);
    }

    #[tokio::test]
    async fn test_reply_from_stranger_leaves_handshake_pending() {
        let dir = TempDir::new().unwrap();
        let path = artifact(&dir, "x.png", b"img");
        let chat = RecordingChat::new();
        let ctx = context(&chat, config());

        let task = spawn_relay(Arc::clone(&ctx), path);
        chat.wait_for(1).await;

        dispatch(&ctx, IncomingMessage::new("99", MODERATION, "#0 hijacked")).await;
        tokio::task::yield_now().await;

        assert!(!task.is_finished());
        assert!(ctx.registry().is_pending(CorrelationToken::new(0)));
        assert_eq!(chat.sent().len(), 1);
        task.abort();
    }

    #[tokio::test]
    async fn test_second_relay_gets_next_token_and_replies_do_not_cross() {
        let dir = TempDir::new().unwrap();
        let first = artifact(&dir, "a.png", b"a");
        let second = artifact(&dir, "b.png", b"b");
        let chat = RecordingChat::new();
        let ctx = context(&chat, config());

        let task_a = spawn_relay(Arc::clone(&ctx), first);
        chat.wait_for(1).await;
        let task_b = spawn_relay(Arc::clone(&ctx), second);
        chat.wait_for(2).await;

        dispatch(&ctx, IncomingMessage::new(PRINCIPAL, MODERATION, "#1 caption b")).await;
        let outcome_b = task_b.await.unwrap().unwrap();
        assert!(matches!(outcome_b, RelayOutcome::Delivered { token, .. } if token == CorrelationToken::new(1)));
        assert!(!task_a.is_finished());

        dispatch(&ctx, IncomingMessage::new(PRINCIPAL, MODERATION, "#0 caption a")).await;
        task_a.await.unwrap().unwrap();

        assert_eq!(
            chat.files_to("200"),
            vec![
                ("caption b".to_owned(), b"b".to_vec()),
                ("caption a".to_owned(), b"a".to_vec()),
            ]
        );
    }

    #[tokio::test]
    async fn test_missing_artifact_fails_without_posting() {
        let chat = RecordingChat::new();
        let ctx = context(&chat, config());

        let err = relay_artifact(&ctx, Utf8Path::new("/nonexistent/shot.png"))
            .await
            .unwrap_err();

        assert!(matches!(err, RelayError::Artifact { .. }));
        assert!(chat.sent().is_empty());
        assert_eq!(ctx.registry().pending_count(), 0);
    }

    #[tokio::test]
    async fn test_failed_moderation_post_releases_registration() {
        let dir = TempDir::new().unwrap();
        let path = artifact(&dir, "x.png", b"img");
        let chat = RecordingChat::new();
        chat.fail_channel(MODERATION);
        let ctx = context(&chat, config());

        let err = relay_artifact(&ctx, &path).await.unwrap_err();

        assert!(matches!(err, RelayError::Chat { .. }));
        assert_eq!(ctx.registry().pending_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_abandons_handshake_and_posts_notice() {
        let dir = TempDir::new().unwrap();
        let path = artifact(&dir, "x.png", b"img");
        let chat = RecordingChat::new();
        let mut cfg = config();
        cfg.relay.caption_timeout_secs = Some(30);
        let ctx = context(&chat, cfg);

        let outcome = relay_artifact(&ctx, &path).await.unwrap();

        assert_eq!(outcome, RelayOutcome::TimedOut { token: CorrelationToken::new(0) });
        assert_eq!(ctx.registry().pending_count(), 0);
        let notices = chat.texts_to(MODERATION);
        assert_eq!(notices.len(), 1);
        assert!(notices[0].starts_with("#0 expired"));
        assert!(chat.files_to("200").is_empty());
    }

    #[tokio::test]
    async fn test_artifact_contents_are_reread_after_the_wait() {
        let dir = TempDir::new().unwrap();
        let path = artifact(&dir, "x.png", b"draft");
        let chat = RecordingChat::new();
        let ctx = context(&chat, config());

        let task = spawn_relay(Arc::clone(&ctx), path.clone());
        chat.wait_for(1).await;

        // Same inode, rewritten in place while the principal was captioning.
        std::fs::write(&path, b"final").unwrap();
        dispatch(&ctx, IncomingMessage::new(PRINCIPAL, MODERATION, "#0 done")).await;
        task.await.unwrap().unwrap();

        let delivered: Vec<_> = chat
            .sent()
            .into_iter()
            .filter(|s| matches!(s, Sent::File { channel, .. } if channel.as_str() == "201"))
            .collect();
        assert_eq!(delivered.len(), 1);
        assert!(matches!(&delivered[0], Sent::File { bytes, .. } if bytes == b"final"));
    }
}
