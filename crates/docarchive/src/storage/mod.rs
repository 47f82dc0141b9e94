pub mod filesystem;
pub mod journal;
pub mod lock;

pub use journal::MoveJournal;
pub use lock::{MediaLock, MediaLockGuard};

use crate::config::Config;
use crate::document::{FilenamePolicy, MediaPaths};

/// Everything needed to place files under the media root: the layout, the
/// archive naming policy and the lock that serializes placement.
#[derive(Debug, Clone)]
pub struct MediaStore {
    paths: MediaPaths,
    naming: FilenamePolicy,
    lock: MediaLock,
}

impl MediaStore {
    pub fn new(paths: MediaPaths, naming: FilenamePolicy, lock: MediaLock) -> Self {
        Self {
            paths,
            naming,
            lock,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            MediaPaths::new(config.media_root()),
            FilenamePolicy::new(config.filename_format.clone()),
            MediaLock::new(config.media_lock_path()),
        )
    }

    pub fn paths(&self) -> &MediaPaths {
        &self.paths
    }

    pub fn naming(&self) -> &FilenamePolicy {
        &self.naming
    }

    pub fn lock(&self) -> &MediaLock {
        &self.lock
    }
}
