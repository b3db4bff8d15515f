//! Admin commands issued by the principal over chat.

use tracing::{info, warn};
use wr_core::{IncomingMessage, Reloaded};

use crate::context::RelayContext;
use crate::error::RelayError;

/// A recognised admin command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Re-read the configuration file.
    Reload,
}

impl Command {
    /// Parses `text` as a command under `prefix`.
    ///
    /// The command word must follow the prefix directly and end the message
    /// or be followed by whitespace.
    ///
    /// # Examples
    ///
    /// ```
    /// use wr_relay::Command;
    ///
    /// assert_eq!(Command::parse("!reload", "!"), Some(Command::Reload));
    /// assert_eq!(Command::parse("!reloaded", "!"), None);
    /// assert_eq!(Command::parse("reload", "!"), None);
    /// ```
    #[must_use]
    pub fn parse(text: &str, prefix: &str) -> Option<Self> {
        if prefix.is_empty() {
            return None;
        }
        let word = text.strip_prefix(prefix)?.split(char::is_whitespace).next()?;
        match word {
            "reload" => Some(Self::Reload),
            _ => None,
        }
    }
}

/// Reply sent after a successful reload.
pub const RELOADED_TEXT: &str = "Reloaded config";

/// Handles `message` if it is a command from the principal.
///
/// Returns `true` if the message was a command.
pub async fn handle(ctx: &RelayContext, message: &IncomingMessage) -> bool {
    let config = ctx.config().snapshot();
    if message.author_is_bot || message.author != config.discord.principal {
        return false;
    }
    let Some(command) = Command::parse(&message.text, &config.discord.command_prefix) else {
        return false;
    };

    let reply = match command {
        Command::Reload => reload(ctx).await,
    };
    if let Err(err) = ctx.chat().send_text(&message.channel, &reply).await {
        ctx.alerter()
            .report(RelayError::chat(&message.channel, err))
            .await;
    }
    true
}

async fn reload(ctx: &RelayContext) -> String {
    match ctx.config().reload() {
        Ok(Reloaded { watch_changed, .. }) => {
            info!(path = %ctx.config().path(), watch_changed, "configuration reloaded");
            if watch_changed {
                format!("{RELOADED_TEXT} (watch settings take effect after a restart)")
            } else {
                RELOADED_TEXT.to_owned()
            }
        }
        Err(err) => {
            warn!(error = %err, "configuration reload rejected");
            let reply = format!("Error reloading config: {err}");
            ctx.alerter().report(RelayError::Config(err)).await;
            reply
        }
    }
}
