pub mod loader;
pub mod schema;

pub use loader::{load_config, load_config_from_str, validate_config};
pub use schema::{Config, ParsersConfig};

use std::path::PathBuf;

/// Returns the canonical config path: `~/.docarchive/config.json`.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::home_dir().map(|h| h.join(".docarchive").join("config.json"))
}
