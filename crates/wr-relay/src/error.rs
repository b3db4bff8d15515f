//! Error types for the wr-relay crate.
//!
//! # Error Recovery Strategy
//!
//! - **Chat errors** ([`RelayError::Chat`]): transport failure for one send;
//!   reported to the principal, the batch continues
//! - **Artifact errors** ([`RelayError::Artifact`]): abort the single relay
//!   that owns the file
//! - **Config errors** ([`RelayError::Config`]): a reload was rejected; the
//!   previous configuration stays in effect
//! - **Alert failures** ([`RelayError::AlertFailed`]): fatal, the principal can
//!   no longer be told about problems
//! - **Watch errors** ([`RelayError::Watch`]): fatal unless the watcher marks
//!   them recoverable
//! - **Inbound errors** ([`RelayError::Inbound`]): fatal, replies can no
//!   longer be received

use camino::Utf8PathBuf;
use wr_core::{ChannelId, ChatError, ConfigError};
use wr_watcher::WatchError;

/// Errors produced while relaying changes and artifacts.
#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    /// A send to a chat channel failed.
    #[error("failed to send to channel {channel}: {source}")]
    Chat {
        /// Channel the send was addressed to.
        channel: ChannelId,
        /// Underlying platform error.
        #[source]
        source: ChatError,
    },

    /// The artifact file could not be opened, rewound, or read.
    #[error("artifact {path} unavailable: {source}")]
    Artifact {
        /// Path of the artifact.
        path: Utf8PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Configuration reload failed.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The direct-message alert to the principal could not be delivered.
    #[error("failed to alert the principal: {0}")]
    AlertFailed(#[source] ChatError),

    /// The watch subsystem failed.
    #[error(transparent)]
    Watch(#[from] WatchError),

    /// The inbound message connection was closed for good.
    #[error("inbound connection lost: {0}")]
    Inbound(#[source] ChatError),
}

impl RelayError {
    /// Creates a [`RelayError::Chat`] error.
    #[inline]
    pub fn chat(channel: &ChannelId, source: ChatError) -> Self {
        Self::Chat {
            channel: channel.clone(),
            source,
        }
    }

    /// Creates a [`RelayError::Artifact`] error.
    #[inline]
    pub fn artifact(path: impl Into<Utf8PathBuf>, source: std::io::Error) -> Self {
        Self::Artifact {
            path: path.into(),
            source,
        }
    }

    /// Returns `true` if the process must stop.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        match self {
            Self::AlertFailed(_) | Self::Inbound(_) => true,
            Self::Watch(err) => err.is_fatal(),
            Self::Chat { .. } | Self::Artifact { .. } | Self::Config(_) => false,
        }
    }
}
