//! Change aggregation, digest pagination, and the caption handshake.
//!
//! This crate is the heart of watch-relay. It never touches the filesystem
//! watcher or the chat platform directly: changes arrive as
//! [`wr_watcher::WatchMessage`]s, chat traffic leaves through
//! [`wr_core::ChatClient`] and comes back as [`wr_core::IncomingMessage`]s.
//!
//! # Overview
//!
//! - [`Aggregator`] buffers changes and flushes them on a fixed cadence
//! - [`PageBuilder`] turns a batch into size-bounded digest pages
//! - [`relay_artifact`] runs the caption handshake for one new artifact
//! - [`Fanout`] delivers pages and captioned artifacts to subscribers
//! - [`dispatch`] routes inbound messages to waiting handshakes or to the
//!   admin command handler
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use wr_core::{ChatClient, ConfigHandle};
//! use wr_relay::{Aggregator, RelayContext};
//!
//! # async fn run(chat: Arc<dyn ChatClient>, config: Arc<ConfigHandle>) {
//! let (ctx, mut fatal) = RelayContext::new(chat, config);
//! let aggregator = Arc::new(Aggregator::new(ctx, "/srv/files/shots"));
//!
//! tokio::spawn(Arc::clone(&aggregator).run_flush_loop());
//!
//! if let Some(err) = fatal.recv().await {
//!     eprintln!("fatal: {err}");
//! }
//! # }
//! ```

#![deny(clippy::all)]
#![warn(missing_docs)]

pub mod admin;
pub mod aggregator;
pub mod alert;
pub mod buffer;
pub mod context;
pub mod correlation;
pub mod error;
pub mod fanout;
pub mod inbound;
pub mod pages;
pub mod relay;

#[cfg(test)]
pub(crate) mod testing;

pub use admin::Command;
pub use aggregator::{Aggregator, FlushSummary, Partition};
pub use alert::{Alerter, FatalReceiver, ALERT_TEXT};
pub use buffer::PendingBuffer;
pub use context::RelayContext;
pub use correlation::{
    leading_token, Caption, CorrelationRegistry, CorrelationToken, PendingReply, TokenAllocator,
};
pub use error::RelayError;
pub use fanout::{DispatchReport, Fanout};
pub use inbound::{dispatch, run_inbound};
pub use pages::PageBuilder;
pub use relay::{relay_artifact, spawn_relay, PendingHandshake, RelayOutcome};
