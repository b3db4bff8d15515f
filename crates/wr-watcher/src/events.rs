//! Conversion from raw `notify` events to [`ChangeEvent`]s.
//!
//! # Event Flow
//!
//! ```text
//! File System Change
//!        │
//!        ▼
//! notify (native or polling backend)
//!        │
//!        ▼
//! classify() ─► ChangeKind + directory flag
//!        │
//!        ▼
//!   ChangeEvent sent via channel to the collector
//! ```

use std::path::{Path, PathBuf};

use camino::Utf8PathBuf;
use notify::event::{CreateKind, ModifyKind, RemoveKind, RenameMode};
use notify::EventKind;
use smallvec::SmallVec;
use wr_core::{ChangeEvent, ChangeKind};

use crate::error::WatchError;

/// What the watcher hands to its consumer: a change, or an internal failure.
pub type WatchMessage = Result<ChangeEvent, WatchError>;

/// How a single notify event should be reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Classified {
    /// Report the listed kind; the directory flag is known from the event.
    Known(ChangeKind, bool),
    /// Report the listed kind; stat the path to learn whether it is a directory.
    Stat(ChangeKind),
    /// A rename carrying both paths; report the destination.
    RenamePair,
    /// Not interesting (access events and the like).
    Skip,
}

fn classify(kind: &EventKind) -> Classified {
    match kind {
        EventKind::Create(CreateKind::Folder) => Classified::Known(ChangeKind::Create, true),
        EventKind::Create(CreateKind::File) => Classified::Known(ChangeKind::Create, false),
        EventKind::Create(_) => Classified::Stat(ChangeKind::Create),
        EventKind::Modify(ModifyKind::Name(RenameMode::Both)) => Classified::RenamePair,
        EventKind::Modify(ModifyKind::Name(_)) => Classified::Stat(ChangeKind::Rename),
        EventKind::Modify(ModifyKind::Metadata(_)) => Classified::Stat(ChangeKind::Chmod),
        EventKind::Modify(_) => Classified::Stat(ChangeKind::Write),
        // The entry is gone, so only the event itself can say what it was.
        EventKind::Remove(RemoveKind::Folder) => Classified::Known(ChangeKind::Remove, true),
        EventKind::Remove(_) => Classified::Known(ChangeKind::Remove, false),
        EventKind::Access(_) | EventKind::Any | EventKind::Other => Classified::Skip,
    }
}

fn to_utf8(path: PathBuf) -> Result<Utf8PathBuf, WatchError> {
    Utf8PathBuf::from_path_buf(path).map_err(WatchError::non_utf8_path)
}

/// A rename that crosses directories is reported as a move.
fn rename_kind(from: &Path, to: &Path) -> ChangeKind {
    if from.parent() == to.parent() {
        ChangeKind::Rename
    } else {
        ChangeKind::Move
    }
}

/// Converts one notify event into zero or more change events.
///
/// Paths that are not valid UTF-8 come back as recoverable
/// [`WatchError::NonUtf8Path`] entries so the caller can log and skip them.
pub fn change_events(event: notify::Event) -> SmallVec<[Result<ChangeEvent, WatchError>; 2]> {
    let mut out = SmallVec::new();

    match classify(&event.kind) {
        Classified::Skip => {}
        Classified::Known(kind, is_directory) => {
            for path in event.paths {
                out.push(to_utf8(path).map(|p| ChangeEvent::new(p, kind, is_directory)));
            }
        }
        Classified::Stat(kind) => {
            for path in event.paths {
                let is_directory = path.is_dir();
                out.push(to_utf8(path).map(|p| ChangeEvent::new(p, kind, is_directory)));
            }
        }
        Classified::RenamePair => {
            let mut paths = event.paths.into_iter();
            match (paths.next(), paths.next()) {
                (Some(from), Some(to)) => {
                    let kind = rename_kind(&from, &to);
                    let is_directory = to.is_dir();
                    out.push(to_utf8(to).map(|p| ChangeEvent::new(p, kind, is_directory)));
                }
                (Some(only), None) => {
                    let is_directory = only.is_dir();
                    out.push(
                        to_utf8(only).map(|p| ChangeEvent::new(p, ChangeKind::Rename, is_directory)),
                    );
                }
                _ => {}
            }
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::event::{AccessKind, DataChange, MetadataKind};

    fn event(kind: EventKind, paths: &[&str]) -> notify::Event {
        paths
            .iter()
            .fold(notify::Event::new(kind), |e, p| e.add_path(PathBuf::from(p)))
    }

    fn ok(results: SmallVec<[Result<ChangeEvent, WatchError>; 2]>) -> Vec<ChangeEvent> {
        results.into_iter().map(|r| r.unwrap()).collect()
    }

    #[test]
    fn test_create_file_and_folder() {
        let file = ok(change_events(event(
            EventKind::Create(CreateKind::File),
            &["/w/a.txt"],
        )));
        assert_eq!(file, vec![ChangeEvent::file("/w/a.txt", ChangeKind::Create)]);

        let dir = ok(change_events(event(
            EventKind::Create(CreateKind::Folder),
            &["/w/sub"],
        )));
        assert_eq!(dir, vec![ChangeEvent::directory("/w/sub", ChangeKind::Create)]);
    }

    #[test]
    fn test_data_modify_is_write() {
        let events = ok(change_events(event(
            EventKind::Modify(ModifyKind::Data(DataChange::Content)),
            &["/nonexistent/a.txt"],
        )));
        assert_eq!(events[0].kind, ChangeKind::Write);
        assert!(!events[0].is_directory);
    }

    #[test]
    fn test_metadata_modify_is_chmod() {
        let events = ok(change_events(event(
            EventKind::Modify(ModifyKind::Metadata(MetadataKind::Permissions)),
            &["/nonexistent/a.txt"],
        )));
        assert_eq!(events[0].kind, ChangeKind::Chmod);
    }

    #[test]
    fn test_remove_folder_keeps_directory_flag() {
        let events = ok(change_events(event(
            EventKind::Remove(RemoveKind::Folder),
            &["/w/gone"],
        )));
        assert_eq!(events, vec![ChangeEvent::directory("/w/gone", ChangeKind::Remove)]);
    }

    #[test]
    fn test_rename_pair_reports_destination() {
        let same_dir = ok(change_events(event(
            EventKind::Modify(ModifyKind::Name(RenameMode::Both)),
            &["/w/old.txt", "/w/new.txt"],
        )));
        assert_eq!(same_dir, vec![ChangeEvent::file("/w/new.txt", ChangeKind::Rename)]);

        let across = ok(change_events(event(
            EventKind::Modify(ModifyKind::Name(RenameMode::Both)),
            &["/w/a/f.txt", "/w/b/f.txt"],
        )));
        assert_eq!(across, vec![ChangeEvent::file("/w/b/f.txt", ChangeKind::Move)]);
    }

    #[test]
    fn test_access_is_skipped() {
        let events = change_events(event(EventKind::Access(AccessKind::Any), &["/w/a.txt"]));
        assert!(events.is_empty());
    }

    #[cfg(unix)]
    #[test]
    fn test_non_utf8_path_is_recoverable_error() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let bad = PathBuf::from(OsStr::from_bytes(b"/w/\xff.txt"));
        let results = change_events(
            notify::Event::new(EventKind::Create(CreateKind::File)).add_path(bad),
        );
        assert_eq!(results.len(), 1);
        match &results[0] {
            Err(err) => assert!(err.is_recoverable()),
            Ok(e) => panic!("expected error, got {e:?}"),
        }
    }
}
