//! Test doubles and common utilities for contract tests
//!
//! These doubles implement the collaborator traits in memory and count
//! every call so tests can assert on call patterns.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use taskdns_core::config::{RecordSetConfig, ServiceConfig, TaskDnsConfig};
use taskdns_core::error::{Error, Result};
use taskdns_core::model::{RecordSetLocator, ServiceRecordKey, StoredRecord};
use taskdns_core::state::MemoryRecordStore;
use taskdns_core::traits::{
    AddressResolver, ChangeAction, RecordSet, RecordSetChange, RecordSetProvider, RecordStore,
};

pub const CLUSTER_ARN: &str = "arn:aws:ecs:us-east-1:123456789012:cluster/main";
pub const SERVICE_NAME: &str = "web";
pub const HOSTED_ZONE_ID: &str = "ZONE_A";
pub const RECORD_NAME: &str = "test.myexample.com";

pub fn service_key() -> ServiceRecordKey {
    ServiceRecordKey::new(CLUSTER_ARN, SERVICE_NAME).unwrap()
}

pub fn locator() -> RecordSetLocator {
    RecordSetLocator::new(HOSTED_ZONE_ID, RECORD_NAME)
}

/// Configuration with immediate retries so tests never sleep
pub fn test_config() -> TaskDnsConfig {
    let mut config = TaskDnsConfig::new(
        ServiceConfig::new(CLUSTER_ARN, SERVICE_NAME),
        RecordSetConfig::new(HOSTED_ZONE_ID, RECORD_NAME),
    );
    config.dns.base_delay_ms = 0;
    config.dns.teardown_interval_secs = 0;
    config
}

/// Builds a provider error on demand (errors are not `Clone`)
pub type ErrorFactory = fn() -> Error;

/// An in-memory DNS provider that records every call
#[derive(Clone, Default)]
pub struct MockRecordSetProvider {
    zones: Arc<Mutex<HashMap<(String, String), RecordSet>>>,
    changes: Arc<Mutex<Vec<RecordSetChange>>>,
    list_call_count: Arc<AtomicUsize>,
    change_call_count: Arc<AtomicUsize>,
    /// Errors returned by the next change calls, in order
    change_failures: Arc<Mutex<VecDeque<ErrorFactory>>>,
    /// Every change call fails with this error
    always_fail_changes: Arc<Mutex<Option<ErrorFactory>>>,
    /// Zones whose calls always fail
    inaccessible_zones: Arc<Mutex<Vec<String>>>,
    /// Deleted record sets that stay visible for a number of listings
    lingering: Arc<Mutex<HashMap<(String, String), (RecordSet, usize)>>>,
    linger_listings: Arc<AtomicUsize>,
}

fn zone_key(zone: &str, name: &str) -> (String, String) {
    let mut name = name.to_ascii_lowercase();
    if !name.ends_with('.') {
        name.push('.');
    }
    (zone.to_string(), name)
}

impl MockRecordSetProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a record set
    pub fn insert(&self, locator: &RecordSetLocator, ttl: i64, values: &[&str]) {
        let record_set = RecordSet {
            name: locator.fqdn(),
            record_type: "A".to_string(),
            ttl: Some(ttl),
            values: values.iter().map(|v| v.to_string()).collect(),
        };
        self.zones
            .lock()
            .unwrap()
            .insert(zone_key(&locator.hosted_zone_id, &locator.record_name), record_set);
    }

    /// Current record set at a locator
    pub fn record_set(&self, locator: &RecordSetLocator) -> Option<RecordSet> {
        self.zones
            .lock()
            .unwrap()
            .get(&zone_key(&locator.hosted_zone_id, &locator.record_name))
            .cloned()
    }

    pub fn list_call_count(&self) -> usize {
        self.list_call_count.load(Ordering::SeqCst)
    }

    pub fn change_call_count(&self) -> usize {
        self.change_call_count.load(Ordering::SeqCst)
    }

    /// Changes that were applied successfully
    pub fn applied_changes(&self) -> Vec<RecordSetChange> {
        self.changes.lock().unwrap().clone()
    }

    /// Fail the next change calls with the given errors
    pub fn fail_next_changes(&self, failures: &[ErrorFactory]) {
        self.change_failures
            .lock()
            .unwrap()
            .extend(failures.iter().copied());
    }

    /// Fail every change call
    pub fn fail_all_changes(&self, failure: ErrorFactory) {
        *self.always_fail_changes.lock().unwrap() = Some(failure);
    }

    /// Reject every call against a zone
    pub fn make_inaccessible(&self, zone: &str) {
        self.inaccessible_zones.lock().unwrap().push(zone.to_string());
    }

    /// Keep deleted record sets visible for `listings` more listings
    pub fn linger_after_delete(&self, listings: usize) {
        self.linger_listings.store(listings, Ordering::SeqCst);
    }

    fn check_zone(&self, zone: &str) -> Result<()> {
        if self.inaccessible_zones.lock().unwrap().iter().any(|z| z == zone) {
            return Err(Error::dns_provider(format!("AccessDenied on zone {zone}")));
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl RecordSetProvider for MockRecordSetProvider {
    async fn list_record_sets(
        &self,
        locator: &RecordSetLocator,
        _record_type: &str,
    ) -> Result<Vec<RecordSet>> {
        self.list_call_count.fetch_add(1, Ordering::SeqCst);
        self.check_zone(&locator.hosted_zone_id)?;

        let key = zone_key(&locator.hosted_zone_id, &locator.record_name);

        {
            let mut lingering = self.lingering.lock().unwrap();
            if let Some((record_set, remaining)) = lingering.remove(&key) {
                if remaining > 1 {
                    lingering.insert(key.clone(), (record_set.clone(), remaining - 1));
                }
                return Ok(vec![record_set]);
            }
        }

        Ok(self
            .zones
            .lock()
            .unwrap()
            .get(&key)
            .cloned()
            .into_iter()
            .collect())
    }

    async fn change_record_set(&self, change: &RecordSetChange) -> Result<()> {
        self.change_call_count.fetch_add(1, Ordering::SeqCst);
        self.check_zone(&change.locator.hosted_zone_id)?;

        if let Some(failure) = *self.always_fail_changes.lock().unwrap() {
            return Err(failure());
        }
        if let Some(failure) = self.change_failures.lock().unwrap().pop_front() {
            return Err(failure());
        }

        let key = zone_key(&change.locator.hosted_zone_id, &change.locator.record_name);
        match change.action {
            ChangeAction::Upsert => {
                self.zones.lock().unwrap().insert(key, change.record_set.clone());
            }
            ChangeAction::Delete => {
                let existing = self
                    .zones
                    .lock()
                    .unwrap()
                    .remove(&key)
                    .ok_or_else(|| Error::dns_provider("InvalidChangeBatch: record set not found"))?;
                let linger = self.linger_listings.load(Ordering::SeqCst);
                if linger > 0 {
                    self.lingering.lock().unwrap().insert(key, (existing, linger));
                }
            }
        }

        self.changes.lock().unwrap().push(change.clone());
        Ok(())
    }

    fn provider_name(&self) -> &'static str {
        "mock"
    }
}

/// An address resolver backed by a fixed map
#[derive(Clone, Default)]
pub struct MockAddressResolver {
    addresses: Arc<Mutex<HashMap<String, String>>>,
    requests: Arc<Mutex<Vec<Vec<String>>>>,
}

impl MockAddressResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_address(self, interface_id: &str, address: &str) -> Self {
        self.addresses
            .lock()
            .unwrap()
            .insert(interface_id.to_string(), address.to_string());
        self
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn requests(&self) -> Vec<Vec<String>> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl AddressResolver for MockAddressResolver {
    async fn resolve(&self, interface_ids: &[String]) -> Result<HashMap<String, String>> {
        self.requests.lock().unwrap().push(interface_ids.to_vec());

        let addresses = self.addresses.lock().unwrap();
        Ok(interface_ids
            .iter()
            .filter_map(|id| addresses.get(id).map(|ip| (id.clone(), ip.clone())))
            .collect())
    }

    fn resolver_name(&self) -> &'static str {
        "mock"
    }
}

/// How `MockRecordStore` misbehaves on writes
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WriteBehavior {
    /// Delegate to the in-memory store
    Normal,
    /// Every write fails the version guard
    AlwaysConflict,
    /// Every write fails with a non-conflict store error
    AlwaysFail,
    /// Before the first write, another writer commits `competing`
    RaceOnce,
}

/// A record store that counts calls and can simulate contention
#[derive(Clone)]
pub struct MockRecordStore {
    inner: MemoryRecordStore,
    behavior: WriteBehavior,
    competing: Arc<Mutex<Option<StoredRecord>>>,
    get_call_count: Arc<AtomicUsize>,
    put_call_count: Arc<AtomicUsize>,
}

impl MockRecordStore {
    pub fn new(behavior: WriteBehavior) -> Self {
        Self {
            inner: MemoryRecordStore::new(),
            behavior,
            competing: Arc::new(Mutex::new(None)),
            get_call_count: Arc::new(AtomicUsize::new(0)),
            put_call_count: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Item another writer commits just before our first write
    pub fn with_competing_write(self, item: StoredRecord) -> Self {
        *self.competing.lock().unwrap() = Some(item);
        self
    }

    pub fn inner(&self) -> &MemoryRecordStore {
        &self.inner
    }

    pub fn get_call_count(&self) -> usize {
        self.get_call_count.load(Ordering::SeqCst)
    }

    pub fn put_call_count(&self) -> usize {
        self.put_call_count.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl RecordStore for MockRecordStore {
    async fn get(&self, key: &ServiceRecordKey) -> Result<Option<StoredRecord>> {
        self.get_call_count.fetch_add(1, Ordering::SeqCst);
        self.inner.get(key).await
    }

    async fn put_if_version(&self, item: &StoredRecord, read_version: u64) -> Result<()> {
        self.put_call_count.fetch_add(1, Ordering::SeqCst);

        match self.behavior {
            WriteBehavior::Normal => {}
            WriteBehavior::AlwaysConflict => {
                return Err(Error::version_conflict(&item.cluster_service, read_version));
            }
            WriteBehavior::AlwaysFail => {
                return Err(Error::state_store("ProvisionedThroughputExceededException"));
            }
            WriteBehavior::RaceOnce => {
                let competing = self.competing.lock().unwrap().take();
                if let Some(competing) = competing {
                    self.inner.insert_unchecked(competing).await;
                }
            }
        }

        self.inner.put_if_version(item, read_version).await
    }

    async fn delete(&self, key: &ServiceRecordKey) -> Result<()> {
        self.inner.delete(key).await
    }

    fn store_name(&self) -> &'static str {
        "mock"
    }
}

/// JSON for a task state change
pub fn task_change(task_arn: &str, status: &str, eni_ids: &[&str]) -> serde_json::Value {
    let attachments: Vec<_> = eni_ids
        .iter()
        .map(|id| {
            serde_json::json!({
                "type": "eni",
                "details": [
                    {"name": "subnetId", "value": "subnet-1"},
                    {"name": "networkInterfaceId", "value": id}
                ]
            })
        })
        .collect();

    serde_json::json!({
        "taskArn": task_arn,
        "lastStatus": status,
        "group": format!("service:{SERVICE_NAME}"),
        "attachments": attachments,
    })
}

/// A queue envelope carrying the given task descriptions
pub fn queue_event(details: &[serde_json::Value]) -> String {
    let records: Vec<_> = details
        .iter()
        .map(|detail| {
            let body = serde_json::json!({
                "detail-type": "ECS Task State Change",
                "detail": detail,
            });
            serde_json::json!({ "body": body.to_string() })
        })
        .collect();
    serde_json::json!({ "Records": records }).to_string()
}
