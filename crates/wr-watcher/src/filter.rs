//! File filtering for watch events.
//!
//! Filters run on the watcher thread before events reach the channel. The
//! relay uses them to keep its own configuration and log files out of
//! digests without hiding same-named files elsewhere in the tree.
//!
//! # Examples
//!
//! ```
//! use wr_watcher::{FileFilter, IgnorePathsFilter};
//! use camino::Utf8Path;
//!
//! let filter = IgnorePathsFilter::new(["/srv/files/config.toml"]);
//!
//! assert!(!filter.should_process(Utf8Path::new("/srv/files/config.toml")));
//! assert!(filter.should_process(Utf8Path::new("/srv/files/app/config.toml")));
//! ```

use camino::{Utf8Path, Utf8PathBuf};
use smallvec::SmallVec;

/// A filter for determining which file events to process.
///
/// # Thread Safety
///
/// Filters must be [`Send`] and [`Sync`] because they are used from the
/// blocking watcher thread. They must also be `'static` to be moved into
/// the spawned task.
pub trait FileFilter: Send + Sync + 'static {
    /// Returns `true` if the file at the given path should be processed.
    fn should_process(&self, path: &Utf8Path) -> bool;
}

/// A filter that accepts all files.
///
/// # Examples
///
/// ```
/// use wr_watcher::{FileFilter, AcceptAllFilter};
/// use camino::Utf8Path;
///
/// let filter = AcceptAllFilter;
/// assert!(filter.should_process(Utf8Path::new("anything.txt")));
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct AcceptAllFilter;

impl FileFilter for AcceptAllFilter {
    #[inline]
    fn should_process(&self, _path: &Utf8Path) -> bool {
        true
    }
}

/// Rejects entries whose file name matches one of a fixed set of names.
///
/// Matching is on the final path component only, so a name listed in
/// `watch.ignore` is ignored in every watched directory.
#[derive(Debug, Clone, Default)]
pub struct IgnoreNamesFilter {
    names: SmallVec<[String; 4]>,
}

impl IgnoreNamesFilter {
    /// Creates a filter ignoring the given file names.
    #[must_use]
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            names: names.into_iter().map(Into::into).collect(),
        }
    }

    /// Adds another name to ignore.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        let name = name.into();
        if !self.names.contains(&name) {
            self.names.push(name);
        }
        self
    }

    /// Names currently ignored.
    #[must_use]
    pub fn names(&self) -> &[String] {
        &self.names
    }
}

impl FileFilter for IgnoreNamesFilter {
    fn should_process(&self, path: &Utf8Path) -> bool {
        path.file_name()
            .is_none_or(|name| !self.names.iter().any(|n| n == name))
    }
}

/// Rejects exactly the listed paths.
///
/// Event paths are built from canonical roots, so the listed paths should be
/// canonical too.
#[derive(Debug, Clone, Default)]
pub struct IgnorePathsFilter {
    paths: SmallVec<[Utf8PathBuf; 2]>,
}

impl IgnorePathsFilter {
    /// Creates a filter ignoring the given paths.
    #[must_use]
    pub fn new<I, P>(paths: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<Utf8PathBuf>,
    {
        Self {
            paths: paths.into_iter().map(Into::into).collect(),
        }
    }

    /// Paths currently ignored.
    #[must_use]
    pub fn paths(&self) -> &[Utf8PathBuf] {
        &self.paths
    }
}

impl FileFilter for IgnorePathsFilter {
    fn should_process(&self, path: &Utf8Path) -> bool {
        !self.paths.iter().any(|ignored| ignored == path)
    }
}

/// A composite filter that combines multiple filters with AND logic.
///
/// # Examples
///
/// ```
/// use wr_watcher::{FileFilter, CompositeFilter, IgnoreNamesFilter};
/// use camino::Utf8Path;
///
/// struct NoSwapFiles;
/// impl FileFilter for NoSwapFiles {
///     fn should_process(&self, path: &Utf8Path) -> bool {
///         path.extension() != Some("swp")
///     }
/// }
///
/// let filter = CompositeFilter::new()
///     .and(IgnoreNamesFilter::new(["thumbs.db"]))
///     .and(NoSwapFiles);
///
/// assert!(filter.should_process(Utf8Path::new("/srv/a.txt")));
/// assert!(!filter.should_process(Utf8Path::new("/srv/.a.txt.swp")));
/// assert!(!filter.should_process(Utf8Path::new("/srv/thumbs.db")));
/// ```
pub struct CompositeFilter {
    filters: Vec<Box<dyn FileFilter>>,
}

impl CompositeFilter {
    /// Creates a new empty composite filter, which accepts all files.
    #[must_use]
    pub fn new() -> Self {
        Self {
            filters: Vec::new(),
        }
    }

    /// Adds a filter to the composite.
    #[must_use]
    pub fn and<F: FileFilter>(mut self, filter: F) -> Self {
        self.filters.push(Box::new(filter));
        self
    }
}

impl Default for CompositeFilter {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for CompositeFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompositeFilter")
            .field("filters", &self.filters.len())
            .finish()
    }
}

impl FileFilter for CompositeFilter {
    fn should_process(&self, path: &Utf8Path) -> bool {
        self.filters.iter().all(|f| f.should_process(path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accept_all_filter() {
        let filter = AcceptAllFilter;
        assert!(filter.should_process(Utf8Path::new("anything.txt")));
        assert!(filter.should_process(Utf8Path::new("")));
    }

    #[test]
    fn test_ignore_names_matches_file_name_only() {
        let filter = IgnoreNamesFilter::new(["secret.txt"]);
        assert!(!filter.should_process(Utf8Path::new("/a/secret.txt")));
        assert!(!filter.should_process(Utf8Path::new("/b/c/secret.txt")));
        assert!(filter.should_process(Utf8Path::new("/secret.txt/inner.txt")));
        assert!(filter.should_process(Utf8Path::new("/a/not-secret.txt")));
    }

    #[test]
    fn test_ignore_names_with_name_dedups() {
        let filter = IgnoreNamesFilter::new(["thumbs.db"])
            .with_name("extra.bin")
            .with_name("extra.bin");
        assert_eq!(filter.names().len(), 2);
        assert!(!filter.should_process(Utf8Path::new("/x/extra.bin")));
    }

    #[test]
    fn test_root_path_has_no_name() {
        let filter = IgnoreNamesFilter::new(["config.toml"]);
        assert!(filter.should_process(Utf8Path::new("/")));
    }

    #[test]
    fn test_ignore_paths_matches_exact_path_only() {
        let filter = IgnorePathsFilter::new(["/srv/files/config.toml", "/srv/files/log.txt"]);

        assert!(!filter.should_process(Utf8Path::new("/srv/files/config.toml")));
        assert!(!filter.should_process(Utf8Path::new("/srv/files/log.txt")));
        assert!(filter.should_process(Utf8Path::new("/srv/files/app/config.toml")));
        assert!(filter.should_process(Utf8Path::new("/srv/other/log.txt")));
        assert!(filter.should_process(Utf8Path::new("/srv/files/config.toml.bak")));
    }

    #[test]
    fn test_empty_ignore_paths_accepts_all() {
        let filter = IgnorePathsFilter::default();
        assert!(filter.paths().is_empty());
        assert!(filter.should_process(Utf8Path::new("/srv/files/config.toml")));
    }

    #[test]
    fn test_composite_filter_and_logic() {
        let filter = CompositeFilter::new()
            .and(IgnoreNamesFilter::new(["a.txt"]))
            .and(IgnoreNamesFilter::new(["b.txt"]));

        assert!(!filter.should_process(Utf8Path::new("/a.txt")));
        assert!(!filter.should_process(Utf8Path::new("/b.txt")));
        assert!(filter.should_process(Utf8Path::new("/c.txt")));
    }

    #[test]
    fn test_empty_composite_accepts_all() {
        assert!(CompositeFilter::new().should_process(Utf8Path::new("/x")));
    }
}
