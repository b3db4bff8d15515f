//! File watcher with async event streaming.
//!
//! This module provides the [`FileWatcher`] type that bridges the synchronous
//! `notify` file watching crate to the async tokio runtime.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                    Blocking Thread (spawn_blocking)             │
//! │  ┌──────────────────┐    ┌────────────────┐    ┌────────────┐   │
//! │  │ Recommended/Poll │ -> │ change_events  │ -> │ FileFilter │   │
//! │  │ watcher (notify) │    │ (classify)     │    │            │   │
//! │  └──────────────────┘    └────────────────┘    └─────┬──────┘   │
//! └──────────────────────────────────────────────────────│──────────┘
//!                                                        │
//!                                          blocking_send │
//!                                                        ▼
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                    Async Runtime (tokio)                        │
//! │  ┌──────────────────┐    ┌────────────────┐                     │
//! │  │ FileWatcher      │    │ mpsc::Receiver │ -> collector task   │
//! │  │ (shutdown ctrl)  │    │ (WatchMessage) │                     │
//! │  └──────────────────┘    └────────────────┘                     │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```no_run
//! use wr_watcher::{FileWatcher, IgnorePathsFilter};
//! use wr_core::WatchConfig;
//! use camino::Utf8PathBuf;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let roots = [Utf8PathBuf::from("/srv/files"), Utf8PathBuf::from("/srv/shots")];
//!     let mut watcher = FileWatcher::new(
//!         &roots,
//!         &WatchConfig::default(),
//!         IgnorePathsFilter::new(["/srv/files/config.toml"]),
//!     )
//!     .await?;
//!
//!     while let Some(message) = watcher.recv().await {
//!         let event = message?;
//!         println!("{} {}", event.label(), event.path);
//!     }
//!
//!     Ok(())
//! }
//! ```

use std::time::Duration;

use camino::Utf8PathBuf;
use notify::{PollWatcher, RecursiveMode, Watcher};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use wr_core::WatchConfig;

use crate::error::WatchError;
use crate::events::{change_events, WatchMessage};
use crate::filter::FileFilter;

/// Default channel capacity for watch messages.
const DEFAULT_CHANNEL_CAPACITY: usize = 1024;

/// A file watcher over one or more roots that streams events to async code.
///
/// # Lifecycle
///
/// 1. **Creation**: `FileWatcher::new()` validates and canonicalizes the
///    roots, creates channels, and spawns a blocking task with the notify
///    watcher.
///
/// 2. **Event Reception**: Use `recv()` to receive [`WatchMessage`]s. Changes
///    are already filtered. An `Err` carries an internal watcher failure.
///
/// 3. **Shutdown**: Call `shutdown()` for graceful shutdown, or simply drop
///    the watcher.
pub struct FileWatcher {
    /// Shutdown signal sender; `None` once shutdown has been initiated.
    shutdown_tx: Option<oneshot::Sender<()>>,

    /// Handle to the blocking watcher task.
    task_handle: Option<JoinHandle<Result<(), WatchError>>>,

    /// Message receiver for async consumption.
    event_rx: mpsc::Receiver<WatchMessage>,

    /// Canonical roots being watched.
    roots: Vec<Utf8PathBuf>,
}

impl std::fmt::Debug for FileWatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileWatcher")
            .field("roots", &self.roots)
            .field("is_running", &self.is_running())
            .finish_non_exhaustive()
    }
}

impl FileWatcher {
    /// Creates a new file watcher for the given roots.
    ///
    /// Roots are canonicalized. A root nested inside another root is dropped
    /// when watching recursively, so each change is reported once.
    ///
    /// # Errors
    ///
    /// Returns [`WatchError::PathNotFound`] if a root doesn't exist.
    /// Returns [`WatchError::Io`] if a root cannot be canonicalized.
    #[allow(clippy::unused_async)] // Async for API consistency with shutdown()
    pub async fn new<F: FileFilter>(
        roots: &[Utf8PathBuf],
        config: &WatchConfig,
        filter: F,
    ) -> Result<Self, WatchError> {
        Self::with_capacity(roots, config, filter, DEFAULT_CHANNEL_CAPACITY).await
    }

    /// Creates a file watcher with a custom channel capacity.
    #[allow(clippy::unused_async)] // Async for API consistency with shutdown()
    pub async fn with_capacity<F: FileFilter>(
        roots: &[Utf8PathBuf],
        config: &WatchConfig,
        filter: F,
        channel_capacity: usize,
    ) -> Result<Self, WatchError> {
        let roots = canonical_roots(roots, config.recursive)?;

        let (event_tx, event_rx) = mpsc::channel(channel_capacity);
        let (shutdown_tx, shutdown_rx) = oneshot::channel();

        let task_roots = roots.clone();
        let recursive = config.recursive;
        let poll_interval = config.poll_interval();

        let task_handle = tokio::task::spawn_blocking(move || {
            run_watcher_loop(
                task_roots,
                recursive,
                poll_interval,
                event_tx,
                shutdown_rx,
                filter,
            )
        });

        Ok(Self {
            shutdown_tx: Some(shutdown_tx),
            task_handle: Some(task_handle),
            event_rx,
            roots,
        })
    }

    /// Receives the next watch message asynchronously.
    ///
    /// Returns `None` when the watcher has been shut down.
    pub async fn recv(&mut self) -> Option<WatchMessage> {
        self.event_rx.recv().await
    }

    /// Returns a mutable reference to the message receiver.
    ///
    /// Useful for `tokio::select!` and for handing the stream to a collector
    /// task while the watcher itself stays owned by the caller.
    pub fn events(&mut self) -> &mut mpsc::Receiver<WatchMessage> {
        &mut self.event_rx
    }

    /// Returns the canonical roots being watched.
    #[must_use]
    pub fn roots(&self) -> &[Utf8PathBuf] {
        &self.roots
    }

    /// Returns `true` if the watcher is still running.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.shutdown_tx.is_some() && self.task_handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Gracefully shuts down the watcher and returns any error from the
    /// watcher thread.
    pub async fn shutdown(mut self) -> Result<(), WatchError> {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }

        if let Some(handle) = self.task_handle.take() {
            match handle.await {
                Ok(result) => result?,
                Err(_join_error) => return Err(WatchError::ChannelClosed),
            }
        }

        Ok(())
    }
}

impl Drop for FileWatcher {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        // The blocking task exits once it sees the shutdown signal.
    }
}

/// Canonicalizes `roots` and removes duplicates and nested roots.
fn canonical_roots(roots: &[Utf8PathBuf], recursive: bool) -> Result<Vec<Utf8PathBuf>, WatchError> {
    let mut canonical = Vec::with_capacity(roots.len());
    for root in roots {
        if !root.exists() {
            return Err(WatchError::path_not_found(root.as_path()));
        }
        canonical.push(root.canonicalize_utf8()?);
    }

    canonical.sort();
    canonical.dedup();

    if recursive {
        let all = canonical.clone();
        canonical.retain(|root| {
            !all.iter()
                .any(|other| other != root && root.starts_with(other))
        });
    }

    Ok(canonical)
}

/// Runs the notify watcher loop in a blocking context.
///
/// Called from `spawn_blocking`; forwards filtered change events (and
/// internal watcher errors) to the async channel until shutdown.
///
/// A backend that fails to start is reported on the channel as well, so the
/// consumer sees the cause instead of a bare channel close. The error is
/// returned only when no consumer is left to receive it.
#[allow(clippy::needless_pass_by_value)] // Owned for the blocking task lifetime
fn run_watcher_loop<F: FileFilter>(
    roots: Vec<Utf8PathBuf>,
    recursive: bool,
    poll_interval: Option<Duration>,
    event_tx: mpsc::Sender<WatchMessage>,
    shutdown_rx: oneshot::Receiver<()>,
    filter: F,
) -> Result<(), WatchError> {
    let tx = event_tx.clone();
    let handler = move |res: notify::Result<notify::Event>| match res {
        Ok(event) => {
            for converted in change_events(event) {
                match converted {
                    Ok(change) => {
                        if !filter.should_process(&change.path) {
                            tracing::trace!(path = %change.path, "Filtered out change event");
                            continue;
                        }
                        if tx.blocking_send(Ok(change)).is_err() {
                            tracing::debug!("Event channel closed, dropping change");
                            return;
                        }
                    }
                    Err(error) => {
                        tracing::warn!(error = %error, "Skipping change event");
                    }
                }
            }
        }
        Err(error) => {
            tracing::error!(error = %error, "Watcher reported an internal error");
            let _ = tx.blocking_send(Err(WatchError::Notify(error)));
        }
    };

    // Held until shutdown; dropping it stops event delivery.
    let _watcher = match start_backend(handler, &roots, recursive, poll_interval) {
        Ok(watcher) => watcher,
        Err(error) => {
            tracing::error!(error = %error, "File watcher failed to start");
            return match event_tx.blocking_send(Err(error)) {
                Ok(()) => Ok(()),
                Err(mpsc::error::SendError(message)) => message.map(drop),
            };
        }
    };

    // Block until shutdown; the watcher delivers events from its own thread.
    let _ = shutdown_rx.blocking_recv();

    tracing::info!(roots = roots.len(), "File watcher stopped");

    Ok(())
}

/// Creates the native or polling backend and registers every root.
fn start_backend<H: notify::EventHandler>(
    handler: H,
    roots: &[Utf8PathBuf],
    recursive: bool,
    poll_interval: Option<Duration>,
) -> Result<Box<dyn Watcher + Send>, WatchError> {
    let mut watcher: Box<dyn Watcher + Send> = match poll_interval {
        Some(interval) => Box::new(PollWatcher::new(
            handler,
            notify::Config::default().with_poll_interval(interval),
        )?),
        None => Box::new(notify::recommended_watcher(handler)?),
    };

    let mode = if recursive {
        RecursiveMode::Recursive
    } else {
        RecursiveMode::NonRecursive
    };

    for root in roots {
        watcher.watch(root.as_std_path(), mode)?;
        tracing::info!(path = %root, recursive, polling = poll_interval.is_some(), "Watching directory");
    }

    Ok(watcher)
}
