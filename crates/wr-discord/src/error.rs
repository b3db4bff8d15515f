//! Error types for the wr-discord crate.

use wr_core::ChatError;

/// Errors produced by the Discord REST and gateway clients.
#[derive(Debug, thiserror::Error)]
pub enum DiscordError {
    /// The HTTP request could not be sent or its body not read.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Discord answered with a non-success status.
    #[error("Discord returned {status}: {body}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Response body.
        body: String,
    },

    /// Still rate limited after the allowed retries.
    #[error("rate limited, retry after {retry_after_secs:.1}s")]
    RateLimited {
        /// Seconds Discord asked us to wait.
        retry_after_secs: f64,
    },

    /// A payload could not be encoded or decoded.
    #[error("invalid payload: {0}")]
    Json(#[from] serde_json::Error),

    /// The websocket connection failed.
    #[error("gateway connection error: {0}")]
    Gateway(#[from] Box<tokio_tungstenite::tungstenite::Error>),

    /// The gateway sent something we did not expect.
    #[error("gateway protocol error: {0}")]
    Protocol(String),

    /// The gateway closed the session with a code that forbids reconnecting.
    #[error("gateway closed the session ({code}): {reason}")]
    SessionRejected {
        /// Close code sent by Discord.
        code: u16,
        /// Close reason sent by Discord.
        reason: String,
    },
}

impl DiscordError {
    /// Creates a [`DiscordError::Protocol`] error.
    #[inline]
    pub fn protocol(msg: impl Into<String>) -> Self {
        Self::Protocol(msg.into())
    }

    /// Returns `true` if the gateway must not reconnect after this error.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(self, Self::SessionRejected { .. })
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for DiscordError {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        Self::Gateway(Box::new(err))
    }
}

impl From<DiscordError> for ChatError {
    fn from(err: DiscordError) -> Self {
        match err {
            DiscordError::Status { status, body } => Self::Rejected { status, body },
            DiscordError::RateLimited { retry_after_secs } => Self::Rejected {
                status: 429,
                body: format!("rate limited, retry after {retry_after_secs:.1}s"),
            },
            DiscordError::Json(e) => Self::Decode(e.to_string()),
            DiscordError::Protocol(msg) => Self::Decode(msg),
            other => Self::transport(other),
        }
    }
}
