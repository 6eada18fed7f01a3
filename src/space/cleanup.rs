//! Best-effort recursive removal of a mirror directory.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::warn;

/// Outcome of a best-effort removal.
#[derive(Debug, Default)]
pub struct RemovalReport {
    /// Entries removed (files and directories).
    pub removed: usize,
    /// Entries that could not be removed, with the error.
    pub failed: Vec<(PathBuf, io::Error)>,
}

impl RemovalReport {
    /// Returns true if every entry was removed.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Deletes single filesystem entries for the removal walk.
pub trait Remover: Send + Sync {
    /// Removes a file or symlink.
    fn remove_file(&self, path: &Path) -> io::Result<()>;

    /// Removes an empty directory.
    fn remove_dir(&self, path: &Path) -> io::Result<()>;
}

/// Remover backed by `std::fs`.
#[derive(Debug, Default, Clone, Copy)]
pub struct FsRemover;

impl Remover for FsRemover {
    fn remove_file(&self, path: &Path) -> io::Result<()> {
        fs::remove_file(path)
    }

    fn remove_dir(&self, path: &Path) -> io::Result<()> {
        fs::remove_dir(path)
    }
}

/// Removes `root` and everything under it, continuing past failures.
///
/// Each failing entry is logged and recorded in the report. A directory
/// that still has children left after a failure is itself left in place.
/// A missing `root` yields an empty report.
pub fn remove_tree_best_effort(root: &Path) -> RemovalReport {
    remove_tree_with(root, &FsRemover)
}

/// Same as [`remove_tree_best_effort`], deleting through `remover`.
pub fn remove_tree_with(root: &Path, remover: &dyn Remover) -> RemovalReport {
    let mut report = RemovalReport::default();

    match fs::symlink_metadata(root) {
        Ok(_) => remove_entry(root, remover, &mut report),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => record_failure(root, e, &mut report),
    }

    report
}

fn remove_entry(path: &Path, remover: &dyn Remover, report: &mut RemovalReport) {
    let metadata = match fs::symlink_metadata(path) {
        Ok(m) => m,
        Err(e) => {
            record_failure(path, e, report);
            return;
        }
    };

    if metadata.is_dir() {
        match fs::read_dir(path) {
            Ok(entries) => {
                for entry in entries {
                    match entry {
                        Ok(entry) => remove_entry(&entry.path(), remover, report),
                        Err(e) => record_failure(path, e, report),
                    }
                }
            }
            Err(e) => {
                record_failure(path, e, report);
                return;
            }
        }

        match remover.remove_dir(path) {
            Ok(()) => report.removed += 1,
            Err(e) => record_failure(path, e, report),
        }
    } else {
        match remover.remove_file(path) {
            Ok(()) => report.removed += 1,
            Err(e) => record_failure(path, e, report),
        }
    }
}

fn record_failure(path: &Path, error: io::Error, report: &mut RemovalReport) {
    warn!("[CLEANUP] Error deleting {}: {}", path.display(), error);
    report.failed.push((path.to_path_buf(), error));
}
