//! Records file moves so they can be undone if the surrounding commit fails.
//!
//! A move onto an existing file first renames that file aside in the same
//! directory. Rolling back restores it; committing deletes it.

use std::path::{Path, PathBuf};

use tempfile::TempPath;

use crate::error::StorageError;
use crate::storage::filesystem::move_file;

const ASIDE_PREFIX: &str = ".superseded-";

#[derive(Debug)]
struct Entry {
    from: PathBuf,
    to: PathBuf,
    /// Previous content of `to`, if there was any.
    aside: Option<PathBuf>,
}

#[derive(Debug, Default)]
pub struct MoveJournal {
    entries: Vec<Entry>,
}

impl MoveJournal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Moves `from` to `to` and records the move on success. An existing
    /// `to` is kept aside until [`MoveJournal::commit`] or
    /// [`MoveJournal::rollback`].
    pub fn move_file(&mut self, from: &Path, to: &Path) -> Result<(), StorageError> {
        let aside = if to.exists() {
            Some(set_aside(to)?)
        } else {
            None
        };

        if let Err(e) = move_file(from, to) {
            if let Some(aside) = &aside {
                if let Err(restore) = std::fs::rename(aside, to) {
                    tracing::error!(
                        file = %to.display(),
                        aside = %aside.display(),
                        error = %restore,
                        "Failed to restore replaced file"
                    );
                }
            }
            return Err(e);
        }

        self.entries.push(Entry {
            from: from.to_path_buf(),
            to: to.to_path_buf(),
            aside,
        });
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Deletes the files that were replaced. Call once the record change
    /// that references the new files is committed.
    pub fn commit(self) {
        for aside in self.entries.into_iter().filter_map(|e| e.aside) {
            if let Err(e) = std::fs::remove_file(&aside) {
                tracing::warn!(file = %aside.display(), error = %e, "Failed to delete replaced file");
            }
        }
    }

    /// Moves every recorded file back, newest first, and puts replaced
    /// files back in their place. Must run while the media lock is held.
    ///
    /// Returns the files that could not be restored; those are orphaned.
    pub fn rollback(self) -> Vec<PathBuf> {
        let mut orphans = Vec::new();
        for entry in self.entries.into_iter().rev() {
            let moved_back = match move_file(&entry.to, &entry.from) {
                Ok(()) => {
                    tracing::debug!(file = %entry.to.display(), "Reverted file move");
                    true
                }
                Err(e) => {
                    tracing::error!(file = %entry.to.display(), error = %e, "Failed to revert file move");
                    false
                }
            };

            match entry.aside {
                Some(aside) => {
                    // Overwrites the new file if it could not be moved back.
                    if let Err(e) = std::fs::rename(&aside, &entry.to) {
                        tracing::error!(
                            file = %entry.to.display(),
                            aside = %aside.display(),
                            error = %e,
                            "Failed to restore replaced file, it is orphaned"
                        );
                        orphans.push(aside);
                        if !moved_back {
                            orphans.push(entry.to);
                        }
                    }
                }
                None if !moved_back => orphans.push(entry.to),
                None => {}
            }
        }
        orphans
    }
}

/// Renames `path` to a fresh hidden name next to it.
fn set_aside(path: &Path) -> Result<PathBuf, StorageError> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let move_err = |to: &Path, source| StorageError::MoveFile {
        from: path.to_path_buf(),
        to: to.to_path_buf(),
        source,
    };

    let placeholder: TempPath = tempfile::Builder::new()
        .prefix(ASIDE_PREFIX)
        .tempfile_in(dir)
        .map_err(|e| move_err(dir, e))?
        .into_temp_path();
    std::fs::rename(path, &placeholder).map_err(|e| move_err(&*placeholder, e))?;
    placeholder
        .keep()
        .map_err(|e| move_err(path, e.error))
}
