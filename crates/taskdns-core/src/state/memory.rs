// # Memory Record Store
//
// In-memory implementation of RecordStore.
//
// ## Purpose
//
// Shares one map between every handle cloned from the same store, so tests
// can run several `RecordsTable`s against it to exercise the version guard.
// Nothing survives a restart.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::Error;
use crate::model::{ServiceRecordKey, StoredRecord};
use crate::traits::RecordStore;

/// In-memory record store implementation
///
/// # Example
///
/// ```rust,no_run
/// use taskdns_core::model::{ServiceRecord, ServiceRecordKey, StoredRecord};
/// use taskdns_core::state::MemoryRecordStore;
/// use taskdns_core::traits::RecordStore;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let store = MemoryRecordStore::new();
///     let key = ServiceRecordKey::new("cluster", "web")?;
///
///     let mut record = ServiceRecord::empty(key.clone());
///     record.version = 1;
///     store.put_if_version(&StoredRecord::encode(&record), 0).await?;
///
///     assert_eq!(store.get(&key).await?.map(|item| item.version), Some(1));
///     Ok(())
/// }
/// ```
#[derive(Debug, Clone)]
pub struct MemoryRecordStore {
    inner: Arc<RwLock<HashMap<String, StoredRecord>>>,
}

impl MemoryRecordStore {
    /// Create a new empty memory record store
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Get the number of items in the store
    pub async fn len(&self) -> usize {
        self.inner.read().await.len()
    }

    /// Check if the store is empty
    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.is_empty()
    }

    /// Overwrite an item without the version guard
    ///
    /// Used to seed fixtures and to simulate a concurrent writer.
    pub async fn insert_unchecked(&self, item: StoredRecord) {
        let mut guard = self.inner.write().await;
        guard.insert(item.cluster_service.clone(), item);
    }
}

impl Default for MemoryRecordStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RecordStore for MemoryRecordStore {
    async fn get(&self, key: &ServiceRecordKey) -> Result<Option<StoredRecord>, Error> {
        let guard = self.inner.read().await;
        Ok(guard.get(&key.to_composite()).cloned())
    }

    async fn put_if_version(&self, item: &StoredRecord, read_version: u64) -> Result<(), Error> {
        let mut guard = self.inner.write().await;

        if let Some(existing) = guard.get(&item.cluster_service) {
            if existing.version != read_version {
                return Err(Error::version_conflict(&item.cluster_service, read_version));
            }
        }

        guard.insert(item.cluster_service.clone(), item.clone());
        Ok(())
    }

    async fn delete(&self, key: &ServiceRecordKey) -> Result<(), Error> {
        let mut guard = self.inner.write().await;
        guard.remove(&key.to_composite());
        Ok(())
    }

    fn store_name(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ServiceRecord;

    fn item(version: u64) -> StoredRecord {
        let mut record = ServiceRecord::empty(ServiceRecordKey::new("cluster", "web").unwrap());
        record.version = version;
        StoredRecord::encode(&record)
    }

    #[tokio::test]
    async fn test_memory_store_basic() {
        let store = MemoryRecordStore::new();
        let key = ServiceRecordKey::new("cluster", "web").unwrap();

        assert!(store.is_empty().await);
        assert_eq!(store.get(&key).await.unwrap(), None);

        store.put_if_version(&item(1), 0).await.unwrap();
        assert_eq!(store.len().await, 1);
        assert_eq!(store.get(&key).await.unwrap(), Some(item(1)));

        store.delete(&key).await.unwrap();
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_memory_store_version_guard() {
        let store = MemoryRecordStore::new();

        // absent item: any read version passes the guard
        store.put_if_version(&item(1), 0).await.unwrap();
        store.put_if_version(&item(2), 1).await.unwrap();

        let err = store.put_if_version(&item(2), 1).await.unwrap_err();
        assert!(err.is_version_conflict());
    }

    #[tokio::test]
    async fn test_clones_share_state() {
        let store = MemoryRecordStore::new();
        let other = store.clone();

        store.put_if_version(&item(1), 0).await.unwrap();
        assert_eq!(other.len().await, 1);
    }
}
