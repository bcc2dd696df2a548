mod backend;
mod config;
mod metrics;
mod operations;
mod types;

pub use backend::SupervisorStore;
pub use config::*;
pub use metrics::*;
pub use types::*;

use sled::{Db, Tree};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::info;
use vigil_types::{VigilError, VigilResult};

const CURRENT_SCHEMA_VERSION: u32 = 1;
const SCHEMA_KEY: &[u8] = b"__schema_version__";
const MAX_BATCH_SIZE: usize = 1000;

/// Append-only audit and evidence store backed by sled.
///
/// Clones share the same database and counters.
#[derive(Clone)]
pub struct SupervisorStorage {
    db: Db,
    schema: Tree,
    events: Tree,
    metrics_tree: Tree,
    evidence: Tree,
    dependencies: Tree,
    storage_config: StorageConfig,
    metrics: Arc<StorageMetrics>,
}

impl SupervisorStorage {
    pub fn open(config: StorageConfig) -> VigilResult<Self> {
        let path = &config.path;
        info!("Opening store at {:?}", path);

        let sled_config = sled::Config::new()
            .path(path)
            .cache_capacity(config.cache_capacity_bytes)
            .mode(sled::Mode::HighThroughput)
            .flush_every_ms(config.flush_every_ms);

        let db = sled_config
            .open()
            .map_err(|e| VigilError::Storage(format!("Failed to open database: {}", e)))?;

        let storage = Self::create_from_db(db, config)?;
        storage.ensure_schema()?;

        info!("Store opened (schema version {})", CURRENT_SCHEMA_VERSION);
        Ok(storage)
    }

    pub fn open_memory() -> VigilResult<Self> {
        let db = sled::Config::new()
            .temporary(true)
            .open()
            .map_err(|e| VigilError::Storage(format!("Failed to open temp database: {}", e)))?;

        let config = StorageConfig {
            path: std::path::PathBuf::new(),
            ..Default::default()
        };

        let storage = Self::create_from_db(db, config)?;
        storage.ensure_schema()?;
        Ok(storage)
    }

    fn create_from_db(db: Db, config: StorageConfig) -> VigilResult<Self> {
        let schema = Self::open_tree(&db, "schema")?;
        let events = Self::open_tree(&db, "events")?;
        let metrics_tree = Self::open_tree(&db, "metrics")?;
        let evidence = Self::open_tree(&db, "evidence")?;
        let dependencies = Self::open_tree(&db, "dependencies")?;

        Ok(Self {
            db,
            schema,
            events,
            metrics_tree,
            evidence,
            dependencies,
            storage_config: config,
            metrics: Arc::new(StorageMetrics::new()),
        })
    }

    fn open_tree(db: &Db, name: &str) -> VigilResult<Tree> {
        db.open_tree(name)
            .map_err(|e| VigilError::Storage(format!("Failed to open {} tree: {}", name, e)))
    }

    fn ensure_schema(&self) -> VigilResult<()> {
        match self.schema_info()? {
            None => self.initialize_schema(),
            Some(info) if info.version > CURRENT_SCHEMA_VERSION => Err(VigilError::Storage(format!(
                "Database schema version {} is newer than supported {}",
                info.version, CURRENT_SCHEMA_VERSION
            ))),
            Some(_) => Ok(()),
        }
    }

    fn schema_info(&self) -> VigilResult<Option<SchemaInfo>> {
        match self
            .schema
            .get(SCHEMA_KEY)
            .map_err(|e| VigilError::Storage(format!("Failed to read schema: {}", e)))?
        {
            Some(bytes) => Ok(Some(bincode::deserialize(&bytes).map_err(|e| {
                VigilError::Serialization(format!("Failed to deserialize schema: {}", e))
            })?)),
            None => Ok(None),
        }
    }

    fn initialize_schema(&self) -> VigilResult<()> {
        info!("Initializing new store with schema version {}", CURRENT_SCHEMA_VERSION);

        let info = SchemaInfo {
            version: CURRENT_SCHEMA_VERSION,
            created_at: chrono::Utc::now().timestamp(),
        };
        self.write_schema(&info)?;
        self.flush()
    }

    fn write_schema(&self, info: &SchemaInfo) -> VigilResult<()> {
        let bytes = bincode::serialize(info)
            .map_err(|e| VigilError::Serialization(format!("Failed to serialize schema: {}", e)))?;

        self.schema
            .insert(SCHEMA_KEY, bytes)
            .map_err(|e| VigilError::Storage(format!("Failed to store schema: {}", e)))?;
        Ok(())
    }

    pub fn schema_version(&self) -> VigilResult<u32> {
        self.schema_info().map(|info| info.map(|i| i.version).unwrap_or(0))
    }

    pub fn flush(&self) -> VigilResult<()> {
        self.metrics.flushes.fetch_add(1, Ordering::Relaxed);
        self.db
            .flush()
            .map_err(|e| VigilError::Storage(format!("Flush error: {}", e)))?;
        Ok(())
    }

    pub async fn flush_async(&self) -> VigilResult<()> {
        self.metrics.flushes.fetch_add(1, Ordering::Relaxed);
        self.db
            .flush_async()
            .await
            .map_err(|e| VigilError::Storage(format!("Flush error: {}", e)))?;
        Ok(())
    }

    pub fn tree_sizes(&self) -> TreeSizes {
        TreeSizes {
            events: self.events.len(),
            metrics: self.metrics_tree.len(),
            evidence: self.evidence.len(),
            dependencies: self.dependencies.len(),
        }
    }

    pub fn storage_metrics(&self) -> Arc<StorageMetrics> {
        Arc::clone(&self.metrics)
    }

    pub fn is_in_memory(&self) -> bool {
        self.storage_config.path.as_os_str().is_empty()
    }
}

#[cfg(test)]
mod tests;
