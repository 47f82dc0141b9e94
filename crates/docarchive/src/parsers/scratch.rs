use std::path::{Path, PathBuf};

use tempfile::TempDir;

use crate::error::ParseError;

/// Lazily created temporary directory owned by one parser instance.
///
/// Archive and thumbnail files are written here and moved into the media
/// tree by the commit. Whatever is left is deleted by [`ScratchSpace::release`].
#[derive(Debug)]
pub struct ScratchSpace {
    parent: PathBuf,
    dir: Option<TempDir>,
}

impl ScratchSpace {
    pub fn new(parent: impl Into<PathBuf>) -> Self {
        Self {
            parent: parent.into(),
            dir: None,
        }
    }

    /// Returns `<dir>/<name>`, creating the directory on first use.
    pub fn file(&mut self, name: &str) -> Result<PathBuf, ParseError> {
        Ok(self.dir()?.join(name))
    }

    pub fn dir(&mut self) -> Result<&Path, ParseError> {
        let dir = match self.dir.take() {
            Some(dir) => dir,
            None => {
                std::fs::create_dir_all(&self.parent).map_err(|e| ParseError::Scratch {
                    path: self.parent.clone(),
                    source: e,
                })?;
                tempfile::Builder::new()
                    .prefix("docarchive-")
                    .tempdir_in(&self.parent)
                    .map_err(|e| ParseError::Scratch {
                        path: self.parent.clone(),
                        source: e,
                    })?
            }
        };
        Ok(self.dir.insert(dir).path())
    }

    pub fn is_created(&self) -> bool {
        self.dir.is_some()
    }

    /// Deletes the directory and everything still in it.
    pub fn release(&mut self) {
        if let Some(dir) = self.dir.take() {
            let path = dir.path().to_path_buf();
            if let Err(e) = dir.close() {
                tracing::warn!(dir = %path.display(), error = %e, "Failed to remove scratch directory");
            }
        }
    }
}
