//! Core types, errors, and configuration for the watch relay.
//!
//! This crate provides the foundational types used across the workspace:
//!
//! - Domain types ([`ChangeEvent`], [`NotificationPage`], platform ids)
//! - Configuration structures and the reloadable [`ConfigHandle`]
//! - The [`ChatClient`] boundary implemented by platform adapters
//! - Error types for consistent error handling

#![deny(clippy::all)]
#![warn(missing_docs)]

pub mod chat;
pub mod config;
pub mod error;
pub mod types;

pub use chat::{Attachment, ChatClient, ChatError, Embed, IncomingMessage};
pub use config::{
    Config, ConfigHandle, DigestConfig, DiscordConfig, RelayConfig, Reloaded, WatchConfig,
    DEFAULT_CONFIG_FILE, DEFAULT_LOG_FILE, PLATFORM_MAX_FIELDS,
};
pub use error::ConfigError;
pub use types::{ChangeEvent, ChangeKind, ChannelId, NotificationField, NotificationPage, UserId};
