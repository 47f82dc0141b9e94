use serde::{Deserialize, Serialize};
use std::path::PathBuf;

pub const CONFIG_VERSION: &str = "1.0";

const DATABASE_FILENAME: &str = "docarchive.db";
const INDEX_FILENAME: &str = "index.db";
const MEDIA_LOCK_FILENAME: &str = "media.lock";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub version: String,
    /// Root of the originals/, archive/ and thumbnails/ trees.
    pub media_root: String,
    /// Holds the repository database and the search index.
    pub data_directory: String,
    /// Parsers create their per-document temporary directories here.
    #[serde(default = "default_scratch_directory")]
    pub scratch_directory: String,
    #[serde(default = "default_task_workers")]
    pub task_workers: usize,
    /// Optional template for archive filenames, e.g. `{created_year}/{title}`.
    #[serde(default)]
    pub filename_format: Option<String>,
    #[serde(default)]
    pub parsers: ParsersConfig,
}

fn default_scratch_directory() -> String {
    std::env::temp_dir()
        .join("docarchive")
        .to_string_lossy()
        .to_string()
}

fn default_task_workers() -> usize {
    num_cpus::get()
}

impl Config {
    /// Builds a config with defaults for everything but the two required roots.
    pub fn new<P: Into<PathBuf>, Q: Into<PathBuf>>(media_root: P, data_directory: Q) -> Self {
        Self {
            version: CONFIG_VERSION.to_string(),
            media_root: media_root.into().to_string_lossy().to_string(),
            data_directory: data_directory.into().to_string_lossy().to_string(),
            scratch_directory: default_scratch_directory(),
            task_workers: default_task_workers(),
            filename_format: None,
            parsers: ParsersConfig::default(),
        }
    }

    pub fn media_root(&self) -> PathBuf {
        PathBuf::from(&self.media_root)
    }

    pub fn scratch_directory(&self) -> PathBuf {
        PathBuf::from(&self.scratch_directory)
    }

    pub fn database_path(&self) -> PathBuf {
        PathBuf::from(&self.data_directory).join(DATABASE_FILENAME)
    }

    pub fn index_path(&self) -> PathBuf {
        PathBuf::from(&self.data_directory).join(INDEX_FILENAME)
    }

    pub fn media_lock_path(&self) -> PathBuf {
        self.media_root().join(MEDIA_LOCK_FILENAME)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParsersConfig {
    /// Longest edge of generated thumbnails, in pixels.
    #[serde(default = "default_thumbnail_width")]
    pub thumbnail_width: u32,
    /// Binary used to rasterize the first PDF page.
    #[serde(default = "default_pdftoppm")]
    pub pdftoppm: String,
}

fn default_thumbnail_width() -> u32 {
    400
}

fn default_pdftoppm() -> String {
    "pdftoppm".to_string()
}

impl Default for ParsersConfig {
    fn default() -> Self {
        Self {
            thumbnail_width: default_thumbnail_width(),
            pdftoppm: default_pdftoppm(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_derived_paths() {
        let config = Config::new("/srv/media", "/srv/data");
        assert_eq!(config.database_path(), PathBuf::from("/srv/data/docarchive.db"));
        assert_eq!(config.index_path(), PathBuf::from("/srv/data/index.db"));
        assert_eq!(config.media_lock_path(), PathBuf::from("/srv/media/media.lock"));
    }

    #[test]
    fn test_defaults() {
        let config = Config::new("/m", "/d");
        assert!(config.task_workers >= 1);
        assert!(config.filename_format.is_none());
        assert_eq!(config.parsers.thumbnail_width, 400);
        assert_eq!(config.parsers.pdftoppm, "pdftoppm");
        assert!(config.scratch_directory.ends_with("docarchive"));
    }
}
