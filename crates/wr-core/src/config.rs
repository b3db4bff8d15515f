//! Configuration structures for the watch relay.
//!
//! This module provides configuration types for all components of the application:
//!
//! - [`DiscordConfig`] - Credentials, channels and the authorized principal
//! - [`WatchConfig`] - Watched roots and watcher backend settings
//! - [`DigestConfig`] - Digest cadence, appearance and page ceilings
//! - [`RelayConfig`] - Caption handshake settings
//! - [`Config`] - Root configuration combining all settings
//! - [`ConfigHandle`] - Shared, reloadable snapshot of [`Config`]
//!
//! Configuration is read from a TOML file:
//!
//! ```toml
//! [discord]
//! token = "..."
//! moderation_channel = "1111"
//! subscriber_channels = ["2222", "3333"]
//! principal = "4444"
//! command_prefix = "!"
//!
//! [watch]
//! dir = "/srv/files"
//! artifacts_dir = "/srv/screenshots"
//!
//! [digest]
//! title = "Latest Updates"
//! color = 0x5865F2
//! flush_interval_secs = 60
//! ```

use std::sync::Arc;
use std::time::Duration;

use camino::{Utf8Path, Utf8PathBuf};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::types::{ChannelId, UserId};

/// Default file name of the configuration file.
pub const DEFAULT_CONFIG_FILE: &str = "config.toml";

/// Default file name of the log file.
pub const DEFAULT_LOG_FILE: &str = "log.txt";

/// Largest number of fields the platform accepts in one embed.
pub const PLATFORM_MAX_FIELDS: usize = 25;

/// Chat platform settings.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiscordConfig {
    /// Bot token used for REST and gateway authentication.
    pub token: String,

    /// Channel where artifacts are staged and captions are collected.
    pub moderation_channel: ChannelId,

    /// Channels that receive digests and captioned artifacts.
    pub subscriber_channels: Vec<ChannelId>,

    /// The only user allowed to caption artifacts and issue commands.
    pub principal: UserId,

    /// Prefix that marks a message as an admin command.
    pub command_prefix: String,

    /// REST API base URL.
    pub api_base: String,

    /// Gateway websocket URL.
    pub gateway_url: String,
}

impl Default for DiscordConfig {
    fn default() -> Self {
        Self {
            token: String::new(),
            moderation_channel: ChannelId::default(),
            subscriber_channels: Vec::new(),
            principal: UserId::default(),
            command_prefix: "!".to_owned(),
            api_base: "https://discord.com/api/v10".to_owned(),
            gateway_url: "wss://gateway.discord.gg/?v=10&encoding=json".to_owned(),
        }
    }
}

impl std::fmt::Debug for DiscordConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DiscordConfig")
            .field("token", &"<redacted>")
            .field("moderation_channel", &self.moderation_channel)
            .field("subscriber_channels", &self.subscriber_channels)
            .field("principal", &self.principal)
            .field("command_prefix", &self.command_prefix)
            .field("api_base", &self.api_base)
            .field("gateway_url", &self.gateway_url)
            .finish()
    }
}

/// Configuration for the file watcher.
///
/// # Examples
///
/// ```
/// use wr_core::WatchConfig;
///
/// let config = WatchConfig::default();
/// assert!(config.recursive);
/// assert!(config.poll_interval().is_none());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct WatchConfig {
    /// Directory whose changes are summarized in digests.
    pub dir: Utf8PathBuf,

    /// Directory whose new files go through the caption handshake.
    pub artifacts_dir: Utf8PathBuf,

    /// Whether to watch subdirectories recursively.
    pub recursive: bool,

    /// Poll the filesystem every N seconds instead of using native events.
    pub poll_interval_secs: Option<u64>,

    /// Extra file names that never produce events.
    pub ignore: Vec<String>,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            dir: Utf8PathBuf::new(),
            artifacts_dir: Utf8PathBuf::new(),
            recursive: true,
            poll_interval_secs: None,
            ignore: Vec::new(),
        }
    }
}

impl WatchConfig {
    /// Returns the polling interval, if polling is enabled.
    #[inline]
    #[must_use]
    pub fn poll_interval(&self) -> Option<Duration> {
        self.poll_interval_secs.map(Duration::from_secs)
    }
}

/// Digest appearance and pagination.
///
/// # Examples
///
/// ```
/// use wr_core::DigestConfig;
///
/// let config = DigestConfig::default();
/// assert_eq!(config.max_page_chars, 2000);
/// assert_eq!(config.max_fields, 25);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct DigestConfig {
    /// Embed title.
    pub title: String,

    /// Embed accent color as `0xRRGGBB`.
    pub color: u32,

    /// Seconds between buffer flushes.
    pub flush_interval_secs: u64,

    /// Rendered characters a page must stay below.
    pub max_page_chars: usize,

    /// Maximum fields on one page.
    pub max_fields: usize,
}

impl Default for DigestConfig {
    fn default() -> Self {
        Self {
            title: "Latest Updates".to_owned(),
            color: 0,
            flush_interval_secs: 60,
            max_page_chars: 2000,
            max_fields: PLATFORM_MAX_FIELDS,
        }
    }
}

impl DigestConfig {
    /// Returns the flush period.
    #[inline]
    #[must_use]
    pub const fn flush_interval(&self) -> Duration {
        Duration::from_secs(self.flush_interval_secs)
    }
}

/// Caption handshake settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    /// Abandon an unanswered handshake after this many seconds.
    ///
    /// Unset means wait forever.
    pub caption_timeout_secs: Option<u64>,
}

impl RelayConfig {
    /// Returns the caption timeout, if one is configured.
    #[inline]
    #[must_use]
    pub fn caption_timeout(&self) -> Option<Duration> {
        self.caption_timeout_secs.map(Duration::from_secs)
    }
}

/// Root configuration for the watch relay.
///
/// # Examples
///
/// ```
/// use wr_core::Config;
///
/// let config = Config::from_toml_str(r#"
///     [discord]
///     token = "secret"
///     moderation_channel = "1"
///     subscriber_channels = ["2"]
///     principal = "3"
///
///     [watch]
///     dir = "/srv/files"
///     artifacts_dir = "/srv/shots"
/// "#).unwrap();
///
/// assert_eq!(config.discord.subscriber_channels.len(), 1);
/// assert_eq!(config.digest.flush_interval_secs, 60);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Chat platform configuration.
    pub discord: DiscordConfig,

    /// File watcher configuration.
    pub watch: WatchConfig,

    /// Digest configuration.
    pub digest: DigestConfig,

    /// Caption handshake configuration.
    pub relay: RelayConfig,
}

impl Config {
    /// Parses and validates a configuration from TOML text.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates the configuration file at `path`.
    pub fn load(path: &Utf8Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_owned(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    /// Checks option values that serde cannot express.
    ///
    /// Directory existence is left to the caller, which knows whether the
    /// filesystem is available.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.discord.token.trim().is_empty() {
            return Err(ConfigError::invalid_option("discord.token", "must be set"));
        }
        if self.discord.moderation_channel.is_empty() {
            return Err(ConfigError::invalid_option(
                "discord.moderation_channel",
                "must be set",
            ));
        }
        if self.discord.principal.is_empty() {
            return Err(ConfigError::invalid_option("discord.principal", "must be set"));
        }
        if self.discord.subscriber_channels.is_empty() {
            return Err(ConfigError::invalid_option(
                "discord.subscriber_channels",
                "must list at least one channel",
            ));
        }
        if self.discord.command_prefix.is_empty() {
            return Err(ConfigError::invalid_option(
                "discord.command_prefix",
                "must not be empty",
            ));
        }
        if self.watch.dir.as_str().is_empty() {
            return Err(ConfigError::invalid_option("watch.dir", "must be set"));
        }
        if self.watch.artifacts_dir.as_str().is_empty() {
            return Err(ConfigError::invalid_option("watch.artifacts_dir", "must be set"));
        }
        if self.watch.poll_interval_secs == Some(0) {
            return Err(ConfigError::invalid_option(
                "watch.poll_interval_secs",
                "must be positive",
            ));
        }
        if self.digest.flush_interval_secs == 0 {
            return Err(ConfigError::invalid_option(
                "digest.flush_interval_secs",
                "must be positive",
            ));
        }
        if self.digest.max_page_chars == 0 {
            return Err(ConfigError::invalid_option(
                "digest.max_page_chars",
                "must be positive",
            ));
        }
        if !(1..=PLATFORM_MAX_FIELDS).contains(&self.digest.max_fields) {
            return Err(ConfigError::invalid_option(
                "digest.max_fields",
                format!("must be between 1 and {PLATFORM_MAX_FIELDS}"),
            ));
        }
        if self.relay.caption_timeout_secs == Some(0) {
            return Err(ConfigError::invalid_option(
                "relay.caption_timeout_secs",
                "must be positive",
            ));
        }
        Ok(())
    }
}

/// Result of a successful [`ConfigHandle::reload`].
#[derive(Debug, Clone)]
pub struct Reloaded {
    /// The snapshot now in effect.
    pub config: Arc<Config>,

    /// Whether the `[watch]` section changed. Watched roots are fixed at
    /// startup, so such changes need a restart.
    pub watch_changed: bool,
}

/// A shared, reloadable view of the configuration.
///
/// Readers take an `Arc<Config>` snapshot and keep using it for the duration
/// of one unit of work, so a reload never tears a flush or a handshake.
///
/// # Examples
///
/// ```
/// use wr_core::{Config, ConfigHandle};
///
/// let handle = ConfigHandle::new("config.toml", Config::default());
/// let snapshot = handle.snapshot();
/// assert_eq!(snapshot.digest.max_page_chars, 2000);
/// ```
#[derive(Debug)]
pub struct ConfigHandle {
    path: Utf8PathBuf,
    current: RwLock<Arc<Config>>,
}

impl ConfigHandle {
    /// Wraps an already loaded configuration.
    #[must_use]
    pub fn new(path: impl Into<Utf8PathBuf>, config: Config) -> Self {
        Self {
            path: path.into(),
            current: RwLock::new(Arc::new(config)),
        }
    }

    /// Loads the configuration file and wraps it.
    pub fn load(path: impl Into<Utf8PathBuf>) -> Result<Self, ConfigError> {
        let path = path.into();
        let config = Config::load(&path)?;
        Ok(Self::new(path, config))
    }

    /// Path of the backing configuration file.
    #[inline]
    #[must_use]
    pub fn path(&self) -> &Utf8Path {
        &self.path
    }

    /// Returns the configuration currently in effect.
    #[must_use]
    pub fn snapshot(&self) -> Arc<Config> {
        Arc::clone(&self.current.read())
    }

    /// Re-reads the backing file and swaps it in if it is valid.
    ///
    /// On error the previous configuration stays in effect.
    pub fn reload(&self) -> Result<Reloaded, ConfigError> {
        let fresh = Arc::new(Config::load(&self.path)?);
        let mut current = self.current.write();
        let watch_changed = current.watch != fresh.watch;
        *current = Arc::clone(&fresh);
        Ok(Reloaded {
            config: fresh,
            watch_changed,
        })
    }
}
