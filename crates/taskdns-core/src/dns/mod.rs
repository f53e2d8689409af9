//! DNS reconciler
//!
//! [`RecordSetAccessor`] projects an address set onto one external record
//! set with the smallest possible change:
//!
//! | addresses | record set exists | action   | outcome                       |
//! |-----------|-------------------|----------|-------------------------------|
//! | non-empty | same values + TTL | none     | [`ReconcileOutcome::Unchanged`] |
//! | non-empty | otherwise         | UPSERT   | [`ReconcileOutcome::Upserted`]  |
//! | empty     | yes               | DELETE   | [`ReconcileOutcome::Deleted`]   |
//! | empty     | no                | none     | [`ReconcileOutcome::Skipped`]   |
//!
//! Every provider call is wrapped in [`retry_with_backoff`].

pub mod cleanup;
pub mod retry;

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::error::Result;
use crate::model::RecordSetLocator;
use crate::traits::record_set_provider::RECORD_TYPE_A;
use crate::traits::{ChangeAction, RecordSet, RecordSetChange, RecordSetProvider};

pub use cleanup::{StaleCleanup, remove_stale, stale_locations};
pub use retry::{RetryPolicy, exponential_backoff, retry_with_backoff};

/// Default record TTL in seconds
pub const DEFAULT_TTL: i64 = 60;

/// Default cap on the number of values in one record set
pub const DEFAULT_MAX_RECORD_VALUES: usize = 400;

/// Default number of existence checks after a teardown delete
pub const DEFAULT_TEARDOWN_CHECKS: usize = 9;

/// Default pause between teardown existence checks
pub const DEFAULT_TEARDOWN_INTERVAL: Duration = Duration::from_secs(5);

/// What `RecordSetAccessor::update` did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// The record set was created or replaced
    Upserted {
        /// Values written
        values: Vec<String>,
    },
    /// The record set was deleted because no addresses remain
    Deleted,
    /// The record set already had the desired values and TTL
    Unchanged,
    /// No addresses and no record set; nothing to do
    Skipped,
}

/// What `RecordSetAccessor::delete_and_confirm` observed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TeardownOutcome {
    /// There was no record set to delete
    NotFound,
    /// Deleted, and a later check saw it gone
    Confirmed {
        /// Existence checks performed
        checks: usize,
    },
    /// Deleted, but it was still visible after every check
    Unconfirmed {
        /// Existence checks performed
        checks: usize,
    },
}

/// Sorted record values, capped at `max_values`
pub fn record_set_values(addresses: &BTreeSet<String>, max_values: usize) -> Vec<String> {
    addresses.iter().take(max_values).cloned().collect()
}

/// Pick the record set the locator refers to out of a provider listing
///
/// Listings start at the requested name and may contain only following,
/// unrelated record sets.
pub fn find_locator_record_set(
    locator: &RecordSetLocator,
    record_type: &str,
    candidates: impl IntoIterator<Item = RecordSet>,
) -> Option<RecordSet> {
    candidates
        .into_iter()
        .find(|candidate| candidate.record_type == record_type && locator.matches_name(&candidate.name))
}

/// Reconciles address sets into DNS record sets
#[derive(Clone)]
pub struct RecordSetAccessor {
    provider: Arc<dyn RecordSetProvider>,
    retry: RetryPolicy,
    ttl: i64,
    max_record_values: usize,
}

impl RecordSetAccessor {
    /// Create an accessor with default retry policy, TTL and value cap
    pub fn new(provider: Arc<dyn RecordSetProvider>) -> Self {
        Self {
            provider,
            retry: RetryPolicy::default(),
            ttl: DEFAULT_TTL,
            max_record_values: DEFAULT_MAX_RECORD_VALUES,
        }
    }

    /// Set the retry policy for provider calls
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Set the record TTL
    pub fn with_ttl(mut self, ttl: i64) -> Self {
        self.ttl = ttl;
        self
    }

    /// Set the cap on record values
    pub fn with_max_record_values(mut self, max_record_values: usize) -> Self {
        self.max_record_values = max_record_values;
        self
    }

    /// Look up the record set at `locator`
    pub async fn find_record_set(&self, locator: &RecordSetLocator) -> Result<Option<RecordSet>> {
        let listing = retry_with_backoff(&self.retry, || {
            self.provider.list_record_sets(locator, RECORD_TYPE_A)
        })
        .await?;

        let found = find_locator_record_set(locator, RECORD_TYPE_A, listing);
        match &found {
            Some(record_set) => debug!(%locator, values = record_set.values.len(), "Found existing record set"),
            None => debug!(%locator, "No existing record set"),
        }
        Ok(found)
    }

    /// Whether a record set exists at `locator`
    pub async fn exists(&self, locator: &RecordSetLocator) -> Result<bool> {
        Ok(self.find_record_set(locator).await?.is_some())
    }

    /// Project `addresses` onto the record set at `locator`
    pub async fn update(
        &self,
        locator: &RecordSetLocator,
        addresses: &BTreeSet<String>,
    ) -> Result<ReconcileOutcome> {
        let existing = self.find_record_set(locator).await?;

        if addresses.is_empty() {
            return match existing {
                Some(record_set) => {
                    self.apply(locator, ChangeAction::Delete, record_set).await?;
                    info!(%locator, "Deleted record set, no addresses remain");
                    Ok(ReconcileOutcome::Deleted)
                }
                None => {
                    debug!(%locator, "No addresses and no record set, nothing to do");
                    Ok(ReconcileOutcome::Skipped)
                }
            };
        }

        if addresses.len() > self.max_record_values {
            warn!(
                %locator,
                addresses = addresses.len(),
                cap = self.max_record_values,
                "Truncating record set values"
            );
        }

        let values = record_set_values(addresses, self.max_record_values);

        if let Some(current) = &existing {
            let mut current_values = current.values.clone();
            current_values.sort();
            if current_values == values && current.ttl == Some(self.ttl) {
                debug!(%locator, "Record set already up to date");
                return Ok(ReconcileOutcome::Unchanged);
            }
        }

        let record_set = RecordSet {
            name: locator.fqdn(),
            record_type: RECORD_TYPE_A.to_string(),
            ttl: Some(self.ttl),
            values: values.clone(),
        };
        self.apply(locator, ChangeAction::Upsert, record_set).await?;
        info!(%locator, values = values.len(), "Upserted record set");

        Ok(ReconcileOutcome::Upserted { values })
    }

    /// Delete the record set at `locator`
    ///
    /// Returns `false` if there was nothing to delete.
    pub async fn delete(&self, locator: &RecordSetLocator) -> Result<bool> {
        match self.find_record_set(locator).await? {
            Some(record_set) => {
                self.apply(locator, ChangeAction::Delete, record_set).await?;
                info!(%locator, "Deleted record set");
                Ok(true)
            }
            None => {
                debug!(%locator, "No record set to delete");
                Ok(false)
            }
        }
    }

    /// Delete the record set at `locator` and poll until it is gone
    ///
    /// Checks existence up to `max_checks` times, sleeping `interval`
    /// between checks.
    pub async fn delete_and_confirm(
        &self,
        locator: &RecordSetLocator,
        interval: Duration,
        max_checks: usize,
    ) -> Result<TeardownOutcome> {
        if !self.delete(locator).await? {
            return Ok(TeardownOutcome::NotFound);
        }

        info!(%locator, "Monitoring for the record set deletion");
        for check in 1..=max_checks {
            if !self.exists(locator).await? {
                info!(%locator, checks = check, "Record set has been deleted");
                return Ok(TeardownOutcome::Confirmed { checks: check });
            }

            debug!(%locator, check, "Record set still exists");
            if check < max_checks && !interval.is_zero() {
                tokio::time::sleep(interval).await;
            }
        }

        warn!(%locator, checks = max_checks, "Record set still visible after deletion");
        Ok(TeardownOutcome::Unconfirmed { checks: max_checks })
    }

    async fn apply(
        &self,
        locator: &RecordSetLocator,
        action: ChangeAction,
        record_set: RecordSet,
    ) -> Result<()> {
        let change = RecordSetChange {
            locator: locator.clone(),
            action,
            record_set,
        };

        retry_with_backoff(&self.retry, || self.provider.change_record_set(&change)).await
    }

    /// Provider name (for logging/debugging)
    pub fn provider_name(&self) -> &'static str {
        self.provider.provider_name()
    }
}
