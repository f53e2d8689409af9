// # Record Merge Engine
//
// Folds a batch of task observations into a `ServiceRecord`. Pure and
// deterministic: the caller passes `now`, nothing here touches a clock, the
// store or DNS.
//
// ## Order
//
// 1. Record set bookkeeping (`record_sets_added`, then `record_sets_removed`)
// 2. Running observations
// 3. Stopped observations
// 4. Tombstone expiry
//
// ## Invariants kept
//
// - `addresses` equals the resolved addresses of all live tasks
// - a tombstone is never cleared, so stop wins over running regardless of
//   arrival order
// - task entries only disappear through `expire_tombstones`

use std::collections::BTreeSet;

use chrono::{DateTime, Duration, Utc};
use tracing::debug;

use crate::model::{RecordSetLocator, ServiceRecord, TaskRecord};

/// Default tombstone retention window in minutes
pub const DEFAULT_RETENTION_MINUTES: i64 = 30;

/// Default tombstone retention window
pub fn default_retention() -> Duration {
    Duration::minutes(DEFAULT_RETENTION_MINUTES)
}

/// A batch of observations to fold into a record
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordUpdate {
    /// Tasks observed running, with whatever addresses were resolved
    pub running_tasks: Vec<TaskRecord>,
    /// Tasks observed stopped
    pub stopped_tasks: Vec<TaskRecord>,
    /// Record set locations to remember
    pub record_sets_added: BTreeSet<RecordSetLocator>,
    /// Record set locations to forget
    pub record_sets_removed: BTreeSet<RecordSetLocator>,
}

impl RecordUpdate {
    /// Create an empty update
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a running observation
    pub fn running(mut self, task: TaskRecord) -> Self {
        self.running_tasks.push(task);
        self
    }

    /// Add a stopped observation
    pub fn stopped(mut self, task: TaskRecord) -> Self {
        self.stopped_tasks.push(task);
        self
    }

    /// Remember a record set location
    pub fn add_record_set(mut self, locator: RecordSetLocator) -> Self {
        self.record_sets_added.insert(locator);
        self
    }

    /// Forget a record set location
    pub fn remove_record_set(mut self, locator: RecordSetLocator) -> Self {
        self.record_sets_removed.insert(locator);
        self
    }

    /// Whether the update carries no task observations
    pub fn has_no_tasks(&self) -> bool {
        self.running_tasks.is_empty() && self.stopped_tasks.is_empty()
    }
}

/// Fold `update` into `record`
///
/// The version is left untouched; bumping it is the store accessor's job.
pub fn merge(
    mut record: ServiceRecord,
    update: &RecordUpdate,
    now: DateTime<Utc>,
    retention: Duration,
) -> ServiceRecord {
    for locator in &update.record_sets_added {
        // an added locator replaces stored spellings of the same record set
        record.record_sets.retain(|stored| !stored.matches(locator));
        record.record_sets.insert(locator.clone());
    }
    for locator in &update.record_sets_removed {
        record.record_sets.remove(locator);
    }

    for task in &update.running_tasks {
        apply_running(&mut record, task);
    }

    for task in &update.stopped_tasks {
        apply_stopped(&mut record, task, now);
    }

    expire_tombstones(&mut record, now, retention);
    record
}

fn apply_running(record: &mut ServiceRecord, task: &TaskRecord) {
    if record.task_is_stopped(&task.task_arn) {
        debug!(task_arn = %task.task_arn, "Discarding running observation for stopped task");
        return;
    }

    if record.tasks.contains_key(&task.task_arn) {
        release_addresses(record, &task.task_arn);
    }

    let mut entry = task.clone();
    entry.stopped_at = None;
    record
        .addresses
        .extend(entry.public_addresses().map(str::to_string));
    record.tasks.insert(entry.task_arn.clone(), entry);
}

fn apply_stopped(record: &mut ServiceRecord, task: &TaskRecord, now: DateTime<Utc>) {
    match record.tasks.get(&task.task_arn) {
        Some(existing) if existing.is_stopped() => {
            debug!(task_arn = %task.task_arn, "Duplicate stop observation");
        }
        Some(_) => {
            release_addresses(record, &task.task_arn);
            if let Some(existing) = record.tasks.get_mut(&task.task_arn) {
                existing.mark_stopped(now);
            }
        }
        None => {
            debug!(task_arn = %task.task_arn, "Pre-emptive tombstone for unknown task");
            let mut tombstone = task.clone();
            tombstone.mark_stopped(now);
            record.tasks.insert(tombstone.task_arn.clone(), tombstone);
        }
    }
}

/// Remove the addresses of `task_arn` that no other live task claims
fn release_addresses(record: &mut ServiceRecord, task_arn: &str) {
    let Some(task) = record.tasks.get(task_arn) else {
        return;
    };

    let releasable: Vec<String> = task
        .public_addresses()
        .filter(|address| !record.address_claimed_by_other(address, task_arn))
        .map(str::to_string)
        .collect();

    for address in releasable {
        record.addresses.remove(&address);
    }
}

/// Drop tombstones older than `retention`
///
/// Returns the number of task entries removed.
pub fn expire_tombstones(
    record: &mut ServiceRecord,
    now: DateTime<Utc>,
    retention: Duration,
) -> usize {
    let before = record.tasks.len();
    record.tasks.retain(|_, task| match task.stopped_at {
        Some(stopped_at) => now.signed_duration_since(stopped_at) <= retention,
        None => true,
    });

    let expired = before - record.tasks.len();
    if expired > 0 {
        debug!(expired, key = %record.key, "Expired tombstones");
    }
    expired
}
