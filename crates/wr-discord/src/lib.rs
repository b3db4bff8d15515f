//! Discord adapter for watch-relay.
//!
//! - [`DiscordClient`] implements [`wr_core::ChatClient`] over the REST API:
//!   embeds, multipart file uploads, plain messages and DM channels.
//! - [`Gateway`] holds the websocket session and forwards every posted
//!   message as a [`wr_core::IncomingMessage`].
//!
//! Neither type knows about correlation tokens or commands; routing happens in
//! `wr-relay`.

#![deny(clippy::all)]
#![warn(missing_docs)]

pub mod client;
pub mod error;
pub mod gateway;
pub mod model;

pub use client::DiscordClient;
pub use error::DiscordError;
pub use gateway::{Backoff, Gateway};
