use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use super::constants::DEFAULT_STORE_DIR;

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Relative paths resolve against the data directory.
    pub path: Option<PathBuf>,
    pub cache_capacity_mb: u64,
    pub flush_every_ms: Option<u64>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: None,
            cache_capacity_mb: 64,
            flush_every_ms: Some(1000),
        }
    }
}

impl StoreConfig {
    pub fn resolve_path(&self, data_dir: &Path) -> PathBuf {
        match &self.path {
            Some(path) if path.is_absolute() => path.clone(),
            Some(path) => data_dir.join(path),
            None => data_dir.join(DEFAULT_STORE_DIR),
        }
    }
}
