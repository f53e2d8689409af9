// # Service records
//
// In-memory shape of the record kept for one service. The persisted shape
// lives in `encoding.rs`.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};

use super::key::{RecordSetLocator, ServiceRecordKey};

/// A network interface attached to a task
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkInterface {
    /// Interface id assigned by the provider (e.g. `eni-0abc`)
    pub interface_id: String,
    /// Public IPv4 address, once resolved
    pub public_ipv4: Option<String>,
}

impl NetworkInterface {
    /// An interface whose address has not been resolved yet
    pub fn unresolved(interface_id: impl Into<String>) -> Self {
        Self {
            interface_id: interface_id.into(),
            public_ipv4: None,
        }
    }

    /// An interface with a known public address
    pub fn resolved(interface_id: impl Into<String>, public_ipv4: impl Into<String>) -> Self {
        Self {
            interface_id: interface_id.into(),
            public_ipv4: Some(public_ipv4.into()),
        }
    }
}

/// Bookkeeping for one task ARN
///
/// Also used as the observation type fed into the merge: an observation is
/// a `TaskRecord` whose `stopped_at` is unset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskRecord {
    /// Task ARN
    pub task_arn: String,
    /// Attached interfaces, in event order
    pub network_interfaces: Vec<NetworkInterface>,
    /// Tombstone marker; once set it is never cleared
    pub stopped_at: Option<DateTime<Utc>>,
}

impl TaskRecord {
    /// Create a live task record
    pub fn new(task_arn: impl Into<String>, network_interfaces: Vec<NetworkInterface>) -> Self {
        Self {
            task_arn: task_arn.into(),
            network_interfaces,
            stopped_at: None,
        }
    }

    /// Whether the task carries a tombstone
    pub fn is_stopped(&self) -> bool {
        self.stopped_at.is_some()
    }

    /// Set the tombstone if it is not set yet
    pub fn mark_stopped(&mut self, at: DateTime<Utc>) {
        if self.stopped_at.is_none() {
            self.stopped_at = Some(at);
        }
    }

    /// Resolved public addresses of all interfaces
    pub fn public_addresses(&self) -> impl Iterator<Item = &str> {
        self.network_interfaces
            .iter()
            .filter_map(|eni| eni.public_ipv4.as_deref())
    }

    /// Ids of all interfaces
    pub fn interface_ids(&self) -> impl Iterator<Item = &str> {
        self.network_interfaces
            .iter()
            .map(|eni| eni.interface_id.as_str())
    }
}

/// The authoritative record of one service
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceRecord {
    /// Primary key
    pub key: ServiceRecordKey,
    /// Public addresses of all live tasks
    pub addresses: BTreeSet<String>,
    /// Every task seen and not yet expired, by ARN
    pub tasks: BTreeMap<String, TaskRecord>,
    /// Record sets this record projects or projected to
    pub record_sets: BTreeSet<RecordSetLocator>,
    /// Optimistic concurrency token
    pub version: u64,
}

impl ServiceRecord {
    /// An empty record at version 0
    pub fn empty(key: ServiceRecordKey) -> Self {
        Self {
            key,
            addresses: BTreeSet::new(),
            tasks: BTreeMap::new(),
            record_sets: BTreeSet::new(),
            version: 0,
        }
    }

    /// Whether the given task is known and tombstoned
    pub fn task_is_stopped(&self, task_arn: &str) -> bool {
        self.tasks
            .get(task_arn)
            .is_some_and(|task| task.is_stopped())
    }

    /// Addresses derived from the live tasks
    ///
    /// Equal to `addresses` whenever the record invariants hold.
    pub fn live_addresses(&self) -> BTreeSet<String> {
        self.tasks
            .values()
            .filter(|task| !task.is_stopped())
            .flat_map(|task| task.public_addresses())
            .map(str::to_string)
            .collect()
    }

    /// Whether a live task other than `except_arn` claims `address`
    pub fn address_claimed_by_other(&self, address: &str, except_arn: &str) -> bool {
        self.tasks.values().any(|task| {
            task.task_arn != except_arn
                && !task.is_stopped()
                && task.public_addresses().any(|a| a == address)
        })
    }
}
