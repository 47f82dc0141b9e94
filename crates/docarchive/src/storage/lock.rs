//! Cross-process lock over the media tree.
//!
//! Only the holder of this lock may create directories under the media root
//! or move files into it. The lock is an advisory exclusive lock on
//! `<media_root>/media.lock`, so it also excludes other worker processes.

use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

use fs2::FileExt;

use crate::error::StorageError;
use crate::storage::filesystem::ensure_parent;

#[derive(Debug, Clone)]
pub struct MediaLock {
    path: PathBuf,
}

/// Releases the media lock when dropped.
#[derive(Debug)]
pub struct MediaLockGuard {
    file: File,
    path: PathBuf,
}

impl MediaLock {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Blocks until the lock is held.
    pub fn acquire(&self) -> Result<MediaLockGuard, StorageError> {
        let file = self.open()?;
        FileExt::lock_exclusive(&file).map_err(|e| StorageError::Lock {
            path: self.path.clone(),
            source: e,
        })?;
        tracing::trace!(lock = %self.path.display(), "Media lock acquired");
        Ok(MediaLockGuard {
            file,
            path: self.path.clone(),
        })
    }

    /// Returns `None` if another holder has the lock.
    pub fn try_acquire(&self) -> Result<Option<MediaLockGuard>, StorageError> {
        let file = self.open()?;
        match FileExt::try_lock_exclusive(&file) {
            Ok(()) => Ok(Some(MediaLockGuard {
                file,
                path: self.path.clone(),
            })),
            Err(e) if e.kind() == fs2::lock_contended_error().kind() => Ok(None),
            Err(e) => Err(StorageError::Lock {
                path: self.path.clone(),
                source: e,
            }),
        }
    }

    fn open(&self) -> Result<File, StorageError> {
        ensure_parent(&self.path)?;
        OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(false)
            .open(&self.path)
            .map_err(|e| StorageError::Lock {
                path: self.path.clone(),
                source: e,
            })
    }
}

impl Drop for MediaLockGuard {
    fn drop(&mut self) {
        if let Err(e) = FileExt::unlock(&self.file) {
            tracing::warn!(lock = %self.path.display(), error = %e, "Failed to release media lock");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_acquire_creates_lock_file() {
        let temp = TempDir::new().unwrap();
        let lock = MediaLock::new(temp.path().join("media/media.lock"));

        let guard = lock.acquire().unwrap();
        assert!(lock.path().exists());
        drop(guard);
    }

    #[test]
    fn test_lock_is_exclusive_until_dropped() {
        let temp = TempDir::new().unwrap();
        let lock = MediaLock::new(temp.path().join("media.lock"));

        let guard = lock.acquire().unwrap();
        assert!(lock.try_acquire().unwrap().is_none());

        drop(guard);
        assert!(lock.try_acquire().unwrap().is_some());
    }

    #[test]
    fn test_lock_blocks_other_thread() {
        use std::sync::atomic::{AtomicBool, Ordering};
        use std::sync::Arc;
        use std::time::Duration;

        let temp = TempDir::new().unwrap();
        let lock = MediaLock::new(temp.path().join("media.lock"));
        let released = Arc::new(AtomicBool::new(false));

        let guard = lock.acquire().unwrap();

        let other = lock.clone();
        let flag = Arc::clone(&released);
        let handle = std::thread::spawn(move || {
            let _g = other.acquire().unwrap();
            flag.load(Ordering::SeqCst)
        });

        std::thread::sleep(Duration::from_millis(100));
        released.store(true, Ordering::SeqCst);
        drop(guard);

        assert!(handle.join().unwrap(), "second holder acquired before release");
    }
}
