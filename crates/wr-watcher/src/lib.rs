//! File watcher with async event streaming.
//!
//! This crate provides file change detection via the `notify` crate, bridged
//! to an async tokio context for the relay's collector task.
//!
//! # Overview
//!
//! - Watch the digest directory and the artifacts directory (recursively)
//! - Classify raw notify events into [`wr_core::ChangeKind`]s
//! - Filter out the relay's own configuration and log files by exact path
//! - Stream [`WatchMessage`]s asynchronously, including internal watcher errors
//!
//! # Crate Dependencies
//!
//! ```text
//! wr-cli ──► wr-relay ──► wr-core
//!       ├──► wr-watcher ──►
//!       └──► wr-discord ──►
//! ```
//!
//! # Error Handling
//!
//! ```
//! use wr_watcher::WatchError;
//!
//! fn handle_watch_error(err: WatchError) {
//!     if err.is_fatal() {
//!         eprintln!("Fatal watcher error: {}", err);
//!     } else {
//!         eprintln!("Warning: {}", err);
//!     }
//! }
//! ```
//!
//! # Backends
//!
//! - **Native** (default): inotify/FSEvents/ReadDirectoryChanges via
//!   `notify::recommended_watcher`.
//! - **Polling**: set `watch.poll_interval_secs` for network filesystems
//!   where native events are not delivered.

#![deny(clippy::all)]
#![warn(missing_docs)]

pub mod error;
pub mod events;
pub mod filter;
pub mod watcher;

pub use error::WatchError;
pub use events::{change_events, WatchMessage};
pub use filter::{AcceptAllFilter, CompositeFilter, FileFilter, IgnoreNamesFilter, IgnorePathsFilter};
pub use watcher::FileWatcher;
