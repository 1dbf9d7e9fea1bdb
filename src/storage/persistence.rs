//! File-backed store: the in-memory table plus a snapshot written after each mutation

use std::fs::{self, File};
use std::io::{BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::debug;

use super::{KvStore, Table};
use crate::core::{ModelError, Record, Result, Value};

pub const SNAPSHOT_FILE_NAME: &str = "kvmodel.snapshot";
const SNAPSHOT_FORMAT_VERSION: u32 = 1;

// ============================================================================
// Durability Configuration
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DurabilityMode {
    /// fsync the snapshot before the mutation returns
    Sync,
    #[default]
    Async,
    /// Keep everything in memory; the snapshot file is only read on open
    None,
}

// ============================================================================
// Store Snapshot
// ============================================================================

#[derive(Debug, Serialize, Deserialize)]
pub struct StoreSnapshot {
    pub version: u32,
    pub created_at_unix_ms: u64,
    pub records: Vec<Record>,
}

impl StoreSnapshot {
    pub fn new(records: Vec<Record>) -> Self {
        let created_at_unix_ms = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or_default();
        Self {
            version: SNAPSHOT_FORMAT_VERSION,
            created_at_unix_ms,
            records,
        }
    }
}

// ============================================================================
// Snapshot Manager
// ============================================================================

pub struct SnapshotManager {
    snapshot_path: PathBuf,
}

impl SnapshotManager {
    pub fn new<P: AsRef<Path>>(snapshot_path: P) -> Self {
        Self {
            snapshot_path: snapshot_path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.snapshot_path
    }

    /// Write to a temp file, then rename over the previous snapshot.
    pub fn save(&self, snapshot: &StoreSnapshot, durability: DurabilityMode) -> Result<()> {
        if durability == DurabilityMode::None {
            return Ok(());
        }
        if let Some(parent) = self.snapshot_path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                ModelError::Io(format!("Failed to create snapshot directory: {}", e))
            })?;
        }
        let temp_path = self.snapshot_path.with_extension("tmp");
        let temp_file = File::create(&temp_path)
            .map_err(|e| ModelError::Io(format!("Failed to create temp file: {}", e)))?;
        let mut writer = BufWriter::new(temp_file);
        let serialized = rmp_serde::to_vec(snapshot)
            .map_err(|e| ModelError::Io(format!("Failed to serialize snapshot: {}", e)))?;
        writer
            .write_all(&serialized)
            .map_err(|e| ModelError::Io(format!("Failed to write snapshot: {}", e)))?;
        writer
            .flush()
            .map_err(|e| ModelError::Io(format!("Failed to flush snapshot: {}", e)))?;
        if durability == DurabilityMode::Sync {
            writer
                .get_mut()
                .sync_all()
                .map_err(|e| ModelError::Io(format!("Failed to sync snapshot: {}", e)))?;
        }
        fs::rename(&temp_path, &self.snapshot_path)
            .map_err(|e| ModelError::Io(format!("Failed to rename snapshot: {}", e)))?;
        Ok(())
    }

    pub fn load(&self) -> Result<Option<StoreSnapshot>> {
        if !self.snapshot_path.exists() {
            return Ok(None);
        }
        let mut file = File::open(&self.snapshot_path)
            .map_err(|e| ModelError::Io(format!("Failed to open snapshot: {}", e)))?;
        let mut data = Vec::new();
        file.read_to_end(&mut data)
            .map_err(|e| ModelError::Io(format!("Failed to read snapshot: {}", e)))?;
        let snapshot: StoreSnapshot = rmp_serde::from_slice(&data)
            .map_err(|e| ModelError::Corrupt(format!("Failed to deserialize snapshot: {}", e)))?;
        if snapshot.version != SNAPSHOT_FORMAT_VERSION {
            return Err(ModelError::Corrupt(format!(
                "Unsupported snapshot version {}",
                snapshot.version
            )));
        }
        Ok(Some(snapshot))
    }

    pub fn exists(&self) -> bool {
        self.snapshot_path.exists()
    }
}

// ============================================================================
// File Store
// ============================================================================

pub struct FileStore {
    table: RwLock<Table>,
    snapshots: SnapshotManager,
    durability: DurabilityMode,
}

impl FileStore {
    /// Open (or create) the store kept in `data_dir`.
    pub fn open<P: AsRef<Path>>(data_dir: P, durability: DurabilityMode) -> Result<Self> {
        let snapshots = SnapshotManager::new(data_dir.as_ref().join(SNAPSHOT_FILE_NAME));
        let table = match snapshots.load()? {
            Some(snapshot) => {
                debug!(
                    "loaded {} records from {}",
                    snapshot.records.len(),
                    snapshots.path().display()
                );
                Table::from_records(snapshot.records)?
            }
            None => Table::new(),
        };
        Ok(Self {
            table: RwLock::new(table),
            snapshots,
            durability,
        })
    }

    pub fn snapshot_path(&self) -> &Path {
        self.snapshots.path()
    }

    pub async fn scan(&self) -> Vec<Record> {
        self.table.read().await.sorted_records()
    }

    /// Apply `op` to a staged copy and install it only once the snapshot is
    /// saved. The write guard is held throughout.
    async fn mutate<T>(&self, op: impl FnOnce(&mut Table) -> Result<T>) -> Result<T> {
        let mut table = self.table.write().await;
        let mut staged = table.clone();
        let out = op(&mut staged)?;
        self.snapshots
            .save(&StoreSnapshot::new(staged.sorted_records()), self.durability)?;
        *table = staged;
        Ok(out)
    }
}

#[async_trait]
impl KvStore for FileStore {
    async fn get(&self, pk: &str) -> Result<Option<Record>> {
        Ok(self.table.read().await.get(pk).cloned())
    }

    async fn put(&self, record: Record) -> Result<()> {
        self.mutate(|table| table.put(record)).await
    }

    async fn put_if_absent(&self, record: Record) -> Result<()> {
        self.mutate(|table| table.put_if_absent(record)).await
    }

    async fn update_if_equals(
        &self,
        pk: &str,
        field: &str,
        expected: Option<&Value>,
        new_value: Value,
    ) -> Result<()> {
        self.mutate(|table| table.update_if_equals(pk, field, expected, new_value))
            .await
    }

    async fn delete(&self, pk: &str) -> Result<()> {
        self.mutate(|table| {
            table.delete(pk);
            Ok(())
        })
        .await
    }
}
