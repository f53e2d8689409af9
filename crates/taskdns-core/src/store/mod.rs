//! Optimistic store accessor
//!
//! [`RecordsTable`] runs the read-merge-write cycle against a [`RecordStore`]:
//!
//! 1. Read the current item (absent ⇒ empty record at version 0)
//! 2. Merge the update with `now = Utc::now()`
//! 3. Bump the version and write under the version guard
//! 4. On `VersionConflict`, start over from step 1
//!
//! The loop gives up after `max_attempts` cycles with
//! [`Error::RetriesExhausted`]. Any other store error ends it immediately.

use std::sync::Arc;

use chrono::{Duration, Utc};
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::merge::{self, RecordUpdate};
use crate::model::{ServiceRecord, ServiceRecordKey, StoredRecord};
use crate::traits::RecordStore;

/// Default maximum number of read-merge-write cycles per update
pub const DEFAULT_MAX_ATTEMPTS: usize = 50;

/// Accessor for service records with optimistic concurrency control
#[derive(Clone)]
pub struct RecordsTable {
    store: Arc<dyn RecordStore>,
    max_attempts: usize,
    retention: Duration,
}

impl RecordsTable {
    /// Create an accessor with the default attempt cap and retention window
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self {
            store,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            retention: merge::default_retention(),
        }
    }

    /// Set the maximum number of read-merge-write cycles
    pub fn with_max_attempts(mut self, max_attempts: usize) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    /// Set the tombstone retention window
    pub fn with_retention(mut self, retention: Duration) -> Self {
        self.retention = retention;
        self
    }

    /// The configured attempt cap
    pub fn max_attempts(&self) -> usize {
        self.max_attempts
    }

    /// Read a record, or an empty one at version 0 when the key is absent
    pub async fn get_record(&self, key: &ServiceRecordKey) -> Result<ServiceRecord> {
        match self.store.get(key).await? {
            Some(item) => {
                debug!(%key, version = item.version, "Found a pre-existing record");
                item.decode()
            }
            None => {
                debug!(%key, "No record stored, starting from an empty one");
                Ok(ServiceRecord::empty(key.clone()))
            }
        }
    }

    /// One read-merge-write cycle, without retry
    ///
    /// Returns the committed record, or `Error::VersionConflict` if another
    /// writer got there first.
    pub async fn put_update_optimistically(
        &self,
        key: &ServiceRecordKey,
        update: &RecordUpdate,
    ) -> Result<ServiceRecord> {
        let current = self.get_record(key).await?;
        let read_version = current.version;

        let mut candidate = merge::merge(current, update, Utc::now(), self.retention);
        candidate.version = read_version + 1;

        let item = StoredRecord::encode(&candidate);
        self.store.put_if_version(&item, read_version).await?;

        Ok(candidate)
    }

    /// Apply an update, retrying the whole cycle on version conflicts
    pub async fn put_update(
        &self,
        key: &ServiceRecordKey,
        update: &RecordUpdate,
    ) -> Result<ServiceRecord> {
        for attempt in 1..=self.max_attempts {
            debug!(%key, attempt, "Putting update optimistically");

            match self.put_update_optimistically(key, update).await {
                Ok(record) => {
                    info!(
                        %key,
                        version = record.version,
                        addresses = record.addresses.len(),
                        "Committed record"
                    );
                    return Ok(record);
                }
                Err(e) if e.is_version_conflict() => {
                    debug!(%key, attempt, "Version guard rejected the write");
                    continue;
                }
                Err(e) => return Err(e),
            }
        }

        warn!(%key, attempts = self.max_attempts, "Giving up on optimistic update");
        Err(Error::RetriesExhausted {
            key: key.to_composite(),
            attempts: self.max_attempts,
        })
    }

    /// Delete the record for a key
    pub async fn delete(&self, key: &ServiceRecordKey) -> Result<()> {
        info!(%key, "Deleting record");
        self.store.delete(key).await
    }
}
