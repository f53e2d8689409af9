// # Record Store Trait
//
// Versioned persistence of `StoredRecord` items keyed by
// `ServiceRecordKey`.
//
// ## Write guard
//
// `put_if_version` must succeed only when either
// - no item exists for the key, or
// - the stored item's `version` equals `read_version`.
//
// Anything else is reported as `Error::VersionConflict`. The guard and the
// write must be a single atomic step from the point of view of other
// writers; `RecordsTable` relies on it for lost-update protection.
//
// ## Implementations
//
// - In-memory: `state::MemoryRecordStore`
// - JSON file: `state::FileRecordStore`
// - DynamoDB: `taskdns-store-dynamodb` crate

use async_trait::async_trait;

use crate::model::{ServiceRecordKey, StoredRecord};

/// Trait for record store implementations
///
/// Implementations must be thread-safe and must not retry conflicts
/// themselves; the read-merge-write loop lives in `RecordsTable`.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Read the item for a key
    ///
    /// # Returns
    ///
    /// - `Ok(Some(item))`: The stored item
    /// - `Ok(None)`: No item for this key
    /// - `Err(Error)`: Storage error
    async fn get(&self, key: &ServiceRecordKey) -> Result<Option<StoredRecord>, crate::Error>;

    /// Write an item under the version guard
    ///
    /// # Parameters
    ///
    /// - `item`: The item to write, already carrying its new version
    /// - `read_version`: The version observed when the item was read
    ///
    /// # Returns
    ///
    /// - `Ok(())`: Written
    /// - `Err(Error::VersionConflict)`: The guard failed
    /// - `Err(Error)`: Storage error
    async fn put_if_version(
        &self,
        item: &StoredRecord,
        read_version: u64,
    ) -> Result<(), crate::Error>;

    /// Delete the item for a key (no-op if absent)
    async fn delete(&self, key: &ServiceRecordKey) -> Result<(), crate::Error>;

    /// Store name (for logging/debugging)
    fn store_name(&self) -> &'static str;
}
