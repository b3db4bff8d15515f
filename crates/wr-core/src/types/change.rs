//! Filesystem change types.
//!
//! This module provides [`ChangeEvent`] and [`ChangeKind`], the raw input that
//! the watch subsystem hands to the relay core.

use std::fmt;

use camino::{Utf8Path, Utf8PathBuf};
use serde::{Deserialize, Serialize};

/// The kind of filesystem change that was observed.
///
/// The [`Display`](fmt::Display) rendering is the human-readable word used in
/// digest labels (`Create`, `Remove`, ...).
///
/// # Examples
///
/// ```
/// use wr_core::ChangeKind;
///
/// assert_eq!(ChangeKind::Create.to_string(), "Create");
/// assert!(ChangeKind::Write.is_noise());
/// assert!(!ChangeKind::Remove.is_noise());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[non_exhaustive]
pub enum ChangeKind {
    /// A file or directory was created.
    Create,

    /// File contents were written.
    Write,

    /// A file or directory was removed.
    Remove,

    /// A file or directory was renamed.
    Rename,

    /// Permissions or other metadata changed.
    Chmod,

    /// A file or directory was moved between directories.
    Move,
}

impl ChangeKind {
    /// Returns `true` for kinds that are too chatty to report in digests.
    ///
    /// Every save produces a write, so writes are left out of digest pages.
    #[inline]
    #[must_use]
    pub const fn is_noise(self) -> bool {
        matches!(self, Self::Write)
    }

    /// Returns the display word for this kind.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Create => "Create",
            Self::Write => "Write",
            Self::Remove => "Remove",
            Self::Rename => "Rename",
            Self::Chmod => "Chmod",
            Self::Move => "Move",
        }
    }
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A single filesystem change as reported by the watcher.
///
/// Events are immutable and carry no identity beyond their fields. The same
/// change may be reported twice; duplicates are kept.
///
/// # Examples
///
/// ```
/// use wr_core::{ChangeEvent, ChangeKind};
///
/// let event = ChangeEvent::file("/d/a.txt", ChangeKind::Create);
/// assert_eq!(event.path.as_str(), "/d/a.txt");
/// assert!(!event.is_directory);
/// assert_eq!(event.file_name(), Some("a.txt"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChangeEvent {
    /// Absolute path of the changed entry.
    pub path: Utf8PathBuf,

    /// What happened to the entry.
    pub kind: ChangeKind,

    /// Whether the entry is a directory.
    pub is_directory: bool,
}

impl ChangeEvent {
    /// Creates a new change event.
    #[inline]
    #[must_use]
    pub fn new(path: impl Into<Utf8PathBuf>, kind: ChangeKind, is_directory: bool) -> Self {
        Self {
            path: path.into(),
            kind,
            is_directory,
        }
    }

    /// Creates a change event for a regular file.
    #[inline]
    #[must_use]
    pub fn file(path: impl Into<Utf8PathBuf>, kind: ChangeKind) -> Self {
        Self::new(path, kind, false)
    }

    /// Creates a change event for a directory.
    #[inline]
    #[must_use]
    pub fn directory(path: impl Into<Utf8PathBuf>, kind: ChangeKind) -> Self {
        Self::new(path, kind, true)
    }

    /// Returns the final path component, if any.
    #[inline]
    #[must_use]
    pub fn file_name(&self) -> Option<&str> {
        self.path.file_name()
    }

    /// Returns `true` if the event's path lies inside `root`.
    ///
    /// Comparison is component-wise, so `/shots2/a.png` is not under `/shots`.
    #[inline]
    #[must_use]
    pub fn is_under(&self, root: &Utf8Path) -> bool {
        self.path.starts_with(root)
    }

    /// Returns the digest label for this event, e.g. `Create File`.
    #[must_use]
    pub fn label(&self) -> String {
        let entry = if self.is_directory { "Directory" } else { "File" };
        format!("{} {entry}", self.kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_label_for_file_and_directory() {
        let file = ChangeEvent::file("/d/a.txt", ChangeKind::Create);
        assert_eq!(file.label(), "Create File");

        let dir = ChangeEvent::directory("/d/sub", ChangeKind::Remove);
        assert_eq!(dir.label(), "Remove Directory");
    }

    #[test]
    fn test_is_under_is_component_wise() {
        let root = Utf8Path::new("/shots");
        assert!(ChangeEvent::file("/shots/x.png", ChangeKind::Create).is_under(root));
        assert!(ChangeEvent::file("/shots/deep/y.png", ChangeKind::Create).is_under(root));
        assert!(!ChangeEvent::file("/shots2/x.png", ChangeKind::Create).is_under(root));
        assert!(!ChangeEvent::file("/other/x.png", ChangeKind::Create).is_under(root));
    }

    #[test]
    fn test_only_write_is_noise() {
        assert!(ChangeKind::Write.is_noise());
        for kind in [
            ChangeKind::Create,
            ChangeKind::Remove,
            ChangeKind::Rename,
            ChangeKind::Chmod,
            ChangeKind::Move,
        ] {
            assert!(!kind.is_noise(), "{kind} should not be noise");
        }
    }

    #[test]
    fn test_kind_serialization() {
        assert_eq!(
            serde_json::to_string(&ChangeKind::Rename).unwrap(),
            r#""rename""#
        );
    }
}
