use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::config::SupervisorConfig;

#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub path: PathBuf,
    pub cache_capacity_bytes: u64,
    pub flush_every_ms: Option<u64>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("store"),
            cache_capacity_bytes: 64 * 1024 * 1024,
            flush_every_ms: Some(1000),
        }
    }
}

impl StorageConfig {
    pub fn from_supervisor(config: &SupervisorConfig) -> Self {
        Self {
            path: config.store_path(),
            cache_capacity_bytes: config.storage.cache_capacity_mb * 1024 * 1024,
            flush_every_ms: config.storage.flush_every_ms,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchemaInfo {
    pub version: u32,
    pub created_at: i64,
}
