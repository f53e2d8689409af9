//! Invocation handler
//!
//! The ReconcileEngine is responsible for:
//! - Classifying a batch of task state changes
//! - Resolving public addresses of newly running tasks
//! - Committing the batch to the service record
//! - Publishing the record's addresses to DNS
//! - Cleaning up record sets left behind at old locations
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────┐
//! │ TaskStateChange  │─── batch ───┐
//! └──────────────────┘             │
//!                                  ▼
//!                        ┌──────────────────┐
//!                        │ ReconcileEngine  │
//!                        └──────────────────┘
//!                                  │
//!        ┌─────────────────────────┼─────────────────────────┐
//!        │                         │                         │
//!        ▼                         ▼                         ▼
//! ┌─────────────────┐    ┌──────────────────┐    ┌───────────────────┐
//! │ AddressResolver │    │  RecordsTable    │    │ RecordSetAccessor │
//! │ (resolve)       │    │  (merge + CAS)   │    │ (upsert/delete)   │
//! └─────────────────┘    └──────────────────┘    └───────────────────┘
//! ```
//!
//! ## Invocation Flow
//!
//! 1. Load the reference record
//! 2. Classify changes into running / stopped / ignored
//! 3. Resolve addresses for running tasks
//! 4. Best-effort delete of stale locations
//! 5. `put_update` with the current location added and stale ones removed
//! 6. Reconcile DNS at the current location
//!
//! Stale locations are only forgotten after their delete was attempted, so a
//! failure in any later step leaves them in the record for the next attempt.
//!
//! Everything runs sequentially on the caller's task.

use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::config::TaskDnsConfig;
use crate::dns::{
    self, RecordSetAccessor, ReconcileOutcome, StaleCleanup, TeardownOutcome,
};
use crate::error::Result;
use crate::events::{self, TaskStateChange, TaskStatus};
use crate::merge::RecordUpdate;
use crate::model::{RecordSetLocator, ServiceRecord, ServiceRecordKey, TaskRecord};
use crate::store::RecordsTable;
use crate::traits::{AddressResolver, RecordSetProvider, RecordStore};

/// Summary of one invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvocationReport {
    /// Running observations committed
    pub running: usize,
    /// Stopped observations committed
    pub stopped: usize,
    /// Changes skipped (other group, other status, already stopped)
    pub ignored: usize,
    /// Version of the committed record
    pub version: u64,
    /// Addresses of the committed record
    pub addresses: BTreeSet<String>,
    /// What happened to the current record set
    pub dns: ReconcileOutcome,
    /// What happened to stale record sets
    pub stale_cleanup: StaleCleanup,
}

/// Classified batch
#[derive(Debug, Default)]
struct Collected {
    running: Vec<TaskRecord>,
    stopped: Vec<TaskRecord>,
    ignored: usize,
}

/// Core reconcile engine
///
/// One engine serves one service and one record set location. It holds no
/// per-invocation state and can be reused across invocations.
pub struct ReconcileEngine {
    key: ServiceRecordKey,
    service_name: String,
    locator: RecordSetLocator,
    records: RecordsTable,
    record_sets: RecordSetAccessor,
    resolver: Arc<dyn AddressResolver>,
    teardown_interval: Duration,
    teardown_checks: usize,
}

impl ReconcileEngine {
    /// Create a new engine
    ///
    /// # Parameters
    ///
    /// - `config`: taskdns configuration (validated here)
    /// - `store`: record store implementation
    /// - `provider`: DNS record set provider implementation
    /// - `resolver`: address resolver implementation
    pub fn new(
        config: &TaskDnsConfig,
        store: Arc<dyn RecordStore>,
        provider: Arc<dyn RecordSetProvider>,
        resolver: Arc<dyn AddressResolver>,
    ) -> Result<Self> {
        config.validate()?;

        let records = RecordsTable::new(store)
            .with_max_attempts(config.store.max_attempts)
            .with_retention(config.store.retention());

        let record_sets = RecordSetAccessor::new(provider)
            .with_retry_policy(config.dns.retry_policy())
            .with_ttl(config.record_set.ttl)
            .with_max_record_values(config.record_set.max_record_values);

        Ok(Self {
            key: config.service.key()?,
            service_name: config.service.service_name.clone(),
            locator: config.record_set.locator(),
            records,
            record_sets,
            resolver,
            teardown_interval: config.dns.teardown_interval(),
            teardown_checks: config.dns.teardown_checks,
        })
    }

    /// Store key of the service record
    pub fn key(&self) -> &ServiceRecordKey {
        &self.key
    }

    /// Current record set location
    pub fn locator(&self) -> &RecordSetLocator {
        &self.locator
    }

    /// Decode a queue envelope and handle the changes it carries
    pub async fn handle_queue_event(&self, json: &str) -> Result<InvocationReport> {
        let changes = events::decode_queue_event(json)?;
        self.handle(&changes).await
    }

    /// Handle a batch of task state changes
    pub async fn handle(&self, changes: &[TaskStateChange]) -> Result<InvocationReport> {
        info!(key = %self.key, changes = changes.len(), "Handling task state changes");

        // Reference record, used to skip tasks that are already stopped
        let reference = self.records.get_record(&self.key).await?;

        let mut collected = self.collect(changes, &reference);
        collected.running = self.resolve_addresses(collected.running).await?;

        let stale = dns::stale_locations(&reference.record_sets, &self.locator);
        let stale_cleanup = dns::remove_stale(&self.record_sets, &stale).await;
        if !stale_cleanup.failed.is_empty() {
            warn!(
                failed = stale_cleanup.failed.len(),
                "Some stale record sets could not be deleted"
            );
        }

        let mut update = RecordUpdate {
            running_tasks: collected.running,
            stopped_tasks: collected.stopped,
            ..RecordUpdate::default()
        }
        .add_record_set(self.locator.clone());
        for locator in &stale {
            update = update.remove_record_set(locator.clone());
        }

        let record = self.records.put_update(&self.key, &update).await?;

        let outcome = self.record_sets.update(&self.locator, &record.addresses).await?;

        let report = InvocationReport {
            running: update.running_tasks.len(),
            stopped: update.stopped_tasks.len(),
            ignored: collected.ignored,
            version: record.version,
            addresses: record.addresses,
            dns: outcome,
            stale_cleanup,
        };

        info!(
            key = %self.key,
            version = report.version,
            running = report.running,
            stopped = report.stopped,
            ignored = report.ignored,
            addresses = report.addresses.len(),
            "Invocation complete"
        );
        Ok(report)
    }

    /// Delete the current record set and wait until it is gone
    pub async fn teardown(&self) -> Result<TeardownOutcome> {
        info!(locator = %self.locator, "Tearing down record set");
        self.record_sets
            .delete_and_confirm(&self.locator, self.teardown_interval, self.teardown_checks)
            .await
    }

    fn collect(&self, changes: &[TaskStateChange], reference: &ServiceRecord) -> Collected {
        let mut collected = Collected::default();

        for change in changes {
            if !change.belongs_to_service(&self.service_name) {
                debug!(group = %change.group, "Skipping task from another group");
                collected.ignored += 1;
                continue;
            }

            match change.status() {
                TaskStatus::Running => {
                    if reference.task_is_stopped(&change.task_arn) {
                        info!(task_arn = %change.task_arn, "Refusing to collect already stopped task as running");
                        collected.ignored += 1;
                        continue;
                    }
                    debug!(task_arn = %change.task_arn, "Collecting as running");
                    collected.running.push(change.task_observation());
                }
                TaskStatus::Stopped => {
                    debug!(task_arn = %change.task_arn, "Collecting as stopped");
                    collected.stopped.push(change.task_observation());
                }
                TaskStatus::Other(status) => {
                    warn!(task_arn = %change.task_arn, %status, "Unexpected task status, skipping");
                    collected.ignored += 1;
                }
            }
        }

        collected
    }

    async fn resolve_addresses(&self, mut running: Vec<TaskRecord>) -> Result<Vec<TaskRecord>> {
        let mut seen = HashSet::new();
        let interface_ids: Vec<String> = running
            .iter()
            .flat_map(|task| task.interface_ids())
            .filter(|id| seen.insert(id.to_string()))
            .map(str::to_string)
            .collect();

        if interface_ids.is_empty() {
            return Ok(running);
        }

        let resolved = self.resolver.resolve(&interface_ids).await?;
        debug!(
            resolver = self.resolver.resolver_name(),
            requested = interface_ids.len(),
            resolved = resolved.len(),
            "Resolved interface addresses"
        );

        for task in &mut running {
            for eni in &mut task.network_interfaces {
                if let Some(address) = resolved.get(&eni.interface_id) {
                    eni.public_ipv4 = Some(address.clone());
                }
            }
        }

        Ok(running)
    }
}
