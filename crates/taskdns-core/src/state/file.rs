// # File Record Store
//
// File-based implementation of RecordStore with crash recovery.
//
// ## Purpose
//
// Lets `taskdnsd` run against a local JSON file instead of DynamoDB, e.g.
// for dry runs on a workstation. The version guard is enforced under a
// process-local lock, so the file must not be shared between processes.
//
// ## Crash Recovery
//
// - Atomic writes: Uses write-then-rename for atomicity
// - Corruption detection: Validates JSON on load
// - Automatic backup: Keeps .backup of last known good state
// - Recovery: Falls back to backup if corruption detected
//
// ## File Format
//
// ```json
// {
//   "format": "1.0",
//   "records": {
//     "<cluster_arn>#<service_name>": { "cluster_service": "...", "version": 3, ... }
//   }
// }
// ```

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::RwLock;

use crate::Error;
use crate::model::{ServiceRecordKey, StoredRecord};
use crate::traits::RecordStore;

/// Record file format version
const RECORD_FILE_FORMAT: &str = "1.0";

/// File-based record store with crash recovery
///
/// # Example
///
/// ```rust,no_run
/// use taskdns_core::model::ServiceRecordKey;
/// use taskdns_core::state::FileRecordStore;
/// use taskdns_core::traits::RecordStore;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let store = FileRecordStore::new("/var/lib/taskdns/records.json").await?;
///     let key = ServiceRecordKey::new("cluster", "web")?;
///     let item = store.get(&key).await?;
///     println!("{:?}", item.map(|item| item.version));
///     Ok(())
/// }
/// ```
#[derive(Debug)]
pub struct FileRecordStore {
    path: PathBuf,
    records: Arc<RwLock<BTreeMap<String, StoredRecord>>>,
}

/// Serializable record file format
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
struct RecordFileFormat {
    format: String,
    records: BTreeMap<String, StoredRecord>,
}

impl FileRecordStore {
    /// Create or load a file record store
    ///
    /// This will:
    /// 1. Try to load the existing record file
    /// 2. If corruption detected, try to load from backup
    /// 3. If both fail, start with an empty store
    /// 4. Create parent directories if needed
    pub async fn new<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent).await.map_err(|e| {
                    Error::config(format!(
                        "Failed to create record store directory {}: {}",
                        parent.display(),
                        e
                    ))
                })?;
            }
        }

        let records = Self::load_with_recovery(&path).await?;

        Ok(Self {
            path,
            records: Arc::new(RwLock::new(records)),
        })
    }

    /// Load records from file with automatic recovery
    ///
    /// Only parse failures trigger recovery; I/O errors are returned.
    async fn load_with_recovery(path: &Path) -> Result<BTreeMap<String, StoredRecord>, Error> {
        let err = match Self::load(path).await {
            Ok(records) => {
                tracing::debug!("Loaded record file: {} records", records.len());
                return Ok(records);
            }
            Err(e @ Error::Json(_)) => e,
            Err(e) => return Err(e),
        };

        tracing::warn!(
            "Record file appears corrupted: {}. Attempting recovery from backup.",
            err
        );

        let backup_path = Self::backup_path(path);
        if !backup_path.exists() {
            tracing::warn!("No backup file found. Starting with an empty store.");
            return Ok(BTreeMap::new());
        }

        match Self::load(&backup_path).await {
            Ok(records) => {
                tracing::info!("Recovered record file from backup: {} records", records.len());

                if let Err(restore_err) = fs::copy(&backup_path, path).await {
                    tracing::error!("Failed to restore record file from backup: {}", restore_err);
                }

                Ok(records)
            }
            Err(backup_err) => {
                tracing::error!(
                    "Backup also corrupted: {}. Starting with an empty store.",
                    backup_err
                );
                Ok(BTreeMap::new())
            }
        }
    }

    async fn load(path: &Path) -> Result<BTreeMap<String, StoredRecord>, Error> {
        if !path.exists() {
            tracing::debug!("Record file does not exist: {}", path.display());
            return Ok(BTreeMap::new());
        }

        let content = fs::read_to_string(path).await.map_err(|e| {
            Error::state_store(format!(
                "Failed to read record file {}: {}",
                path.display(),
                e
            ))
        })?;

        let file: RecordFileFormat = serde_json::from_str(&content)?;

        if file.format != RECORD_FILE_FORMAT {
            tracing::warn!(
                "Record file format mismatch: expected {}, got {}. Attempting to load anyway.",
                RECORD_FILE_FORMAT,
                file.format
            );
        }

        Ok(file.records)
    }

    /// Write records to file atomically
    ///
    /// Called with the write lock held so writers are serialized.
    async fn persist(&self, records: &BTreeMap<String, StoredRecord>) -> Result<(), Error> {
        let file = RecordFileFormat {
            format: RECORD_FILE_FORMAT.to_string(),
            records: records.clone(),
        };

        let json = serde_json::to_string_pretty(&file)
            .map_err(|e| Error::state_store(format!("Failed to serialize records: {}", e)))?;

        let temp_path = self.temp_path();
        {
            let mut temp = fs::File::create(&temp_path).await.map_err(|e| {
                Error::state_store(format!(
                    "Failed to create temp file {}: {}",
                    temp_path.display(),
                    e
                ))
            })?;

            temp.write_all(json.as_bytes()).await.map_err(|e| {
                Error::state_store(format!(
                    "Failed to write to temp file {}: {}",
                    temp_path.display(),
                    e
                ))
            })?;

            temp.flush().await.map_err(|e| {
                Error::state_store(format!(
                    "Failed to flush temp file {}: {}",
                    temp_path.display(),
                    e
                ))
            })?;
        }

        if self.path.exists() {
            let backup_path = Self::backup_path(&self.path);
            if let Err(e) = fs::copy(&self.path, &backup_path).await {
                tracing::warn!("Failed to create backup: {}", e);
            }
        }

        fs::rename(&temp_path, &self.path).await.map_err(|e| {
            Error::state_store(format!(
                "Failed to rename {} to {}: {}",
                temp_path.display(),
                self.path.display(),
                e
            ))
        })?;

        tracing::trace!("Records written to file: {}", self.path.display());
        Ok(())
    }

    fn temp_path(&self) -> PathBuf {
        let mut temp = self.path.clone();
        temp.set_extension("tmp");
        temp
    }

    fn backup_path(path: &Path) -> PathBuf {
        let mut backup = path.to_path_buf();
        backup.set_extension("backup");
        backup
    }
}

#[async_trait]
impl RecordStore for FileRecordStore {
    async fn get(&self, key: &ServiceRecordKey) -> Result<Option<StoredRecord>, Error> {
        let guard = self.records.read().await;
        Ok(guard.get(&key.to_composite()).cloned())
    }

    async fn put_if_version(&self, item: &StoredRecord, read_version: u64) -> Result<(), Error> {
        let mut guard = self.records.write().await;

        if let Some(existing) = guard.get(&item.cluster_service) {
            if existing.version != read_version {
                return Err(Error::version_conflict(&item.cluster_service, read_version));
            }
        }

        let previous = guard.insert(item.cluster_service.clone(), item.clone());
        if let Err(e) = self.persist(&guard).await {
            // keep memory in line with what is on disk
            match previous {
                Some(previous) => guard.insert(item.cluster_service.clone(), previous),
                None => guard.remove(&item.cluster_service),
            };
            return Err(e);
        }

        Ok(())
    }

    async fn delete(&self, key: &ServiceRecordKey) -> Result<(), Error> {
        let mut guard = self.records.write().await;
        if guard.remove(&key.to_composite()).is_some() {
            self.persist(&guard).await?;
        }
        Ok(())
    }

    fn store_name(&self) -> &'static str {
        "file"
    }
}
