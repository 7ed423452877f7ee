//! Well-known filesystem locations.

use std::path::PathBuf;

/// Kestrel data directory (~/.kestrel)
pub fn data_dir() -> PathBuf {
    dirs::home_dir()
        .expect("failed to locate home directory")
        .join(".kestrel")
}

/// Configuration file location
pub fn config_path() -> PathBuf {
    data_dir().join("config.json")
}

/// Default agent workspace location
pub fn workspace_path() -> PathBuf {
    data_dir().join("ws")
}
