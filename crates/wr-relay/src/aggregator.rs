//! Event aggregation and the periodic flush.
//!
//! ```text
//!   watcher ──► run_collector ──► PendingBuffer
//!                                      │ take() every flush_interval
//!                                      ▼
//!                                  partition
//!                           ┌──────────┴───────────┐
//!                   artifact Create           everything else
//!                           │                      │
//!                     spawn_relay            PageBuilder ──► Fanout
//! ```

use std::sync::Arc;

use camino::{Utf8Path, Utf8PathBuf};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use wr_core::{ChangeEvent, ChangeKind, Embed};
use wr_watcher::{WatchError, WatchMessage};

use crate::buffer::PendingBuffer;
use crate::context::RelayContext;
use crate::error::RelayError;
use crate::fanout::DispatchReport;
use crate::pages::PageBuilder;
use crate::relay::{spawn_relay, RelayOutcome};

/// Result of one flush.
#[derive(Debug, Default)]
pub struct FlushSummary {
    /// Events taken from the buffer.
    pub taken: usize,

    /// Digest pages built.
    pub pages: usize,

    /// Page delivery counts.
    pub dispatch: DispatchReport,

    /// Handshakes started by this flush.
    pub relays: Vec<JoinHandle<Option<RelayOutcome>>>,
}

/// Events of one batch, split by destination.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct Partition {
    /// New files under the artifacts root.
    pub artifacts: Vec<Utf8PathBuf>,

    /// Events destined for the digest, in arrival order.
    pub digest: Vec<ChangeEvent>,
}

/// Owns the pending buffer and turns it into digests and handshakes.
#[derive(Debug)]
pub struct Aggregator {
    buffer: PendingBuffer,
    artifacts_root: Utf8PathBuf,
    ctx: Arc<RelayContext>,
}

impl Aggregator {
    /// Creates an aggregator routing new files under `artifacts_root` to the
    /// caption handshake.
    ///
    /// `artifacts_root` must be in the same form as the watcher's event paths
    /// (canonical).
    #[must_use]
    pub fn new(ctx: Arc<RelayContext>, artifacts_root: impl Into<Utf8PathBuf>) -> Self {
        Self {
            buffer: PendingBuffer::new(),
            artifacts_root: artifacts_root.into(),
            ctx,
        }
    }

    /// Root whose new files are relayed.
    #[inline]
    #[must_use]
    pub fn artifacts_root(&self) -> &Utf8Path {
        &self.artifacts_root
    }

    /// Buffers a change for the next flush.
    pub fn record(&self, event: ChangeEvent) {
        self.buffer.record(event);
    }

    /// Number of changes waiting for the next flush.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.buffer.len()
    }

    /// Splits a batch by destination.
    ///
    /// Directory events are dropped. A `Create` of a file under the artifacts
    /// root becomes a handshake, everything else goes to the digest.
    #[must_use]
    pub fn partition(&self, events: Vec<ChangeEvent>) -> Partition {
        let mut partition = Partition::default();
        for event in events {
            if event.is_directory {
                continue;
            }
            if event.kind == ChangeKind::Create && event.is_under(&self.artifacts_root) {
                if event.file_name().is_some() {
                    partition.artifacts.push(event.path);
                } else {
                    warn!(path = %event.path, "artifact without a file name, dropped");
                }
                continue;
            }
            partition.digest.push(event);
        }
        partition
    }

    /// Drains the buffer, starts handshakes, and sends the digest.
    pub async fn flush(&self) -> FlushSummary {
        let events = self.buffer.take();
        let taken = events.len();
        if taken == 0 {
            return FlushSummary::default();
        }

        let Partition { artifacts, digest } = self.partition(events);

        let relays = artifacts
            .into_iter()
            .map(|path| {
                debug!(path = %path, "starting caption handshake");
                spawn_relay(Arc::clone(&self.ctx), path)
            })
            .collect();

        let config = self.ctx.config().snapshot();
        let pages = PageBuilder::from_config(&config.digest).build(&digest);
        let dispatch = if pages.is_empty() {
            DispatchReport::default()
        } else {
            let embeds: Vec<_> = pages
                .iter()
                .map(|page| Embed::from_page(&config.digest.title, config.digest.color, page))
                .collect();
            self.ctx
                .fanout()
                .send_pages(&config.discord.subscriber_channels, &embeds)
                .await
        };

        info!(
            taken,
            pages = pages.len(),
            delivered = dispatch.delivered,
            failed = dispatch.failed,
            "flush complete"
        );
        FlushSummary {
            taken,
            pages: pages.len(),
            dispatch,
            relays,
        }
    }

    /// Flushes every `digest.flush_interval_secs`, re-reading the interval
    /// after each flush. Runs until the task is aborted.
    #[allow(clippy::infinite_loop)] // Lives for the whole process; aborted on shutdown
    pub async fn run_flush_loop(self: Arc<Self>) {
        loop {
            let interval = self.ctx.config().snapshot().digest.flush_interval();
            tokio::time::sleep(interval).await;
            self.flush().await;
        }
    }

    /// Moves watcher output into the buffer.
    ///
    /// Recoverable watcher errors are logged and skipped. The first fatal one,
    /// or the watcher going away, is reported and ends the collector; the
    /// report reaches the fatal channel.
    pub async fn run_collector(&self, events: &mut mpsc::Receiver<WatchMessage>) {
        let err = loop {
            match events.recv().await {
                Some(Ok(event)) => self.record(event),
                Some(Err(err)) if err.is_recoverable() => {
                    warn!(error = %err, "skipping watch event");
                }
                Some(Err(err)) => break err,
                None => break WatchError::ChannelClosed,
            }
        };
        self.ctx.alerter().report(RelayError::Watch(err)).await;
    }
}
