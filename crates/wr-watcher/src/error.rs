//! Errors raised while watching the digest and artifact roots.

use camino::Utf8PathBuf;

/// Why the watcher could not start or stopped delivering changes.
///
/// Only [`WatchError::NonUtf8Path`] is recoverable: that one event is skipped
/// and watching continues. Every other variant means the digest can no longer
/// be trusted to be complete, and the relay shuts down.
///
/// # Examples
///
/// ```
/// use wr_watcher::WatchError;
///
/// let skipped = WatchError::non_utf8_path("/srv/files/bad-name");
/// assert!(skipped.is_recoverable());
///
/// let gone = WatchError::path_not_found("/srv/files");
/// assert!(gone.is_fatal());
/// ```
#[derive(Debug, thiserror::Error)]
pub enum WatchError {
    /// The notify backend failed to start, or reported a failure later on.
    #[error("notify watcher error: {0}")]
    Notify(#[from] notify::Error),

    /// A configured root is missing.
    #[error("path does not exist: {0}")]
    PathNotFound(Utf8PathBuf),

    /// The watcher thread went away while the collector was still reading.
    #[error("event channel closed unexpectedly")]
    ChannelClosed,

    /// A changed path cannot be shown in chat because it is not UTF-8.
    #[error("path is not valid UTF-8: {}", _0.display())]
    NonUtf8Path(std::path::PathBuf),

    /// A root could not be canonicalized.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl WatchError {
    /// Creates a [`WatchError::PathNotFound`].
    #[inline]
    pub fn path_not_found(path: impl Into<Utf8PathBuf>) -> Self {
        Self::PathNotFound(path.into())
    }

    /// Creates a [`WatchError::NonUtf8Path`].
    #[inline]
    pub fn non_utf8_path(path: impl Into<std::path::PathBuf>) -> Self {
        Self::NonUtf8Path(path.into())
    }

    /// Whether the collector may skip this error and keep reading.
    #[inline]
    #[must_use]
    pub const fn is_recoverable(&self) -> bool {
        matches!(self, Self::NonUtf8Path(_))
    }

    /// Whether the relay must stop.
    #[inline]
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        !self.is_recoverable()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;
    use std::path::PathBuf;

    #[test]
    fn test_watch_error_path_not_found() {
        let err = WatchError::path_not_found("/srv/missing");
        assert!(err.is_fatal());
        assert_eq!(err.to_string(), "path does not exist: /srv/missing");
    }

    #[test]
    fn test_watch_error_notify_is_fatal() {
        let err = WatchError::from(notify::Error::generic("inotify queue overflow"));
        assert!(err.is_fatal());
        assert!(err.to_string().contains("queue overflow"));
    }

    #[test]
    fn test_watch_error_non_utf8() {
        let err = WatchError::non_utf8_path(PathBuf::from("test"));
        assert!(err.is_recoverable());
        assert!(!err.is_fatal());
    }

    #[test]
    fn test_channel_closed_is_fatal() {
        assert!(WatchError::ChannelClosed.is_fatal());
        assert_eq!(
            WatchError::ChannelClosed.to_string(),
            "event channel closed unexpectedly"
        );
    }

    #[test]
    fn test_watch_error_io() {
        let err = WatchError::Io(io::Error::new(
            io::ErrorKind::PermissionDenied,
            "access denied",
        ));
        assert!(err.is_fatal());
        assert!(err.to_string().contains("I/O error"));
    }
}
