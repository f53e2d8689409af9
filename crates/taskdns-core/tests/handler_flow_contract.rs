//! Contract Test: Invocation Flow
//!
//! Constraints verified:
//! - A RUNNING change publishes the task's resolved address
//! - A later STOPPED change withdraws it and deletes the empty record set
//! - Changes from other groups and unexpected statuses are skipped
//! - Already stopped tasks are neither resolved nor re-added
//! - Stale record set locations are forgotten and deleted best-effort
//! - A stale location is never forgotten before its delete was attempted
//! - Spellings of the current location are not treated as stale
//! - Malformed batches fail before anything is written
//!
//! If this test fails, the end-to-end invocation is broken.

mod common;

use std::sync::Arc;

use common::*;
use taskdns_core::dns::{ReconcileOutcome, StaleCleanup, TeardownOutcome};
use taskdns_core::engine::ReconcileEngine;
use taskdns_core::error::Error;
use taskdns_core::model::{RecordSetLocator, ServiceRecord, StoredRecord};
use taskdns_core::traits::RecordStore;

struct Harness {
    engine: ReconcileEngine,
    store: MockRecordStore,
    dns: MockRecordSetProvider,
    resolver: MockAddressResolver,
}

fn harness(resolver: MockAddressResolver) -> Harness {
    harness_with_store(resolver, WriteBehavior::Normal)
}

fn harness_with_store(resolver: MockAddressResolver, behavior: WriteBehavior) -> Harness {
    let store = MockRecordStore::new(behavior);
    let dns = MockRecordSetProvider::new();

    let engine = ReconcileEngine::new(
        &test_config(),
        Arc::new(store.clone()),
        Arc::new(dns.clone()),
        Arc::new(resolver.clone()),
    )
    .unwrap();

    Harness {
        engine,
        store,
        dns,
        resolver,
    }
}

#[tokio::test]
async fn running_then_stopped_round_trip() {
    let h = harness(MockAddressResolver::new().with_address("eni1", "9.9.9.9"));

    // RUNNING with eni1 → 9.9.9.9
    let report = h
        .engine
        .handle_queue_event(&queue_event(&[task_change("T1", "RUNNING", &["eni1"])]))
        .await
        .unwrap();

    assert_eq!(report.version, 1);
    assert_eq!(report.running, 1);
    assert_eq!(
        report.addresses.iter().cloned().collect::<Vec<_>>(),
        vec!["9.9.9.9".to_string()]
    );
    assert!(matches!(report.dns, ReconcileOutcome::Upserted { .. }));
    assert_eq!(
        h.dns.record_set(&locator()).unwrap().values,
        vec!["9.9.9.9".to_string()]
    );

    // STOPPED for the same task
    let report = h
        .engine
        .handle_queue_event(&queue_event(&[task_change("T1", "STOPPED", &["eni1"])]))
        .await
        .unwrap();

    assert_eq!(report.version, 2);
    assert!(report.addresses.is_empty());
    assert_eq!(report.dns, ReconcileOutcome::Deleted);
    assert!(h.dns.record_set(&locator()).is_none());

    let stored = h.store.get(&service_key()).await.unwrap().unwrap();
    assert!(stored.task_info["T1"].stopped_datetime.is_some());
    // stopped tasks are never resolved
    assert_eq!(h.resolver.call_count(), 1);
}

#[tokio::test]
async fn replayed_batch_is_idempotent() {
    let h = harness(MockAddressResolver::new().with_address("eni1", "9.9.9.9"));
    let event = queue_event(&[task_change("T1", "RUNNING", &["eni1"])]);

    h.engine.handle_queue_event(&event).await.unwrap();
    let report = h.engine.handle_queue_event(&event).await.unwrap();

    assert_eq!(report.dns, ReconcileOutcome::Unchanged);
    assert_eq!(h.dns.change_call_count(), 1);
}

#[tokio::test]
async fn late_running_for_stopped_task_is_not_resolved() {
    let h = harness(MockAddressResolver::new().with_address("eni1", "9.9.9.9"));

    h.engine
        .handle_queue_event(&queue_event(&[task_change("T1", "STOPPED", &["eni1"])]))
        .await
        .unwrap();
    let report = h
        .engine
        .handle_queue_event(&queue_event(&[task_change("T1", "RUNNING", &["eni1"])]))
        .await
        .unwrap();

    assert_eq!(report.running, 0);
    assert_eq!(report.ignored, 1);
    assert!(report.addresses.is_empty());
    assert_eq!(h.resolver.call_count(), 0);
    assert_eq!(report.dns, ReconcileOutcome::Skipped);
}

#[tokio::test]
async fn irrelevant_changes_are_skipped() {
    let h = harness(MockAddressResolver::new().with_address("eni1", "9.9.9.9"));

    let mut other_group = task_change("T2", "RUNNING", &["eni2"]);
    other_group["group"] = serde_json::json!("service:other");
    let pending = task_change("T3", "PENDING", &["eni3"]);

    let report = h
        .engine
        .handle_queue_event(&queue_event(&[
            other_group,
            pending,
            task_change("T1", "RUNNING", &["eni1"]),
        ]))
        .await
        .unwrap();

    assert_eq!(report.ignored, 2);
    assert_eq!(report.running, 1);
    assert_eq!(h.resolver.requests(), vec![vec!["eni1".to_string()]]);
}

#[tokio::test]
async fn no_interfaces_means_no_resolver_call() {
    let h = harness(MockAddressResolver::new());

    let report = h
        .engine
        .handle_queue_event(&queue_event(&[task_change("T1", "RUNNING", &[])]))
        .await
        .unwrap();

    assert_eq!(report.running, 1);
    assert_eq!(h.resolver.call_count(), 0);
    assert_eq!(report.dns, ReconcileOutcome::Skipped);
}

#[tokio::test]
async fn stale_location_is_forgotten_even_when_delete_fails() {
    let h = harness(MockAddressResolver::new().with_address("eni1", "9.9.9.9"));

    // The record remembers a location in a zone we can no longer reach
    let old = RecordSetLocator::new("ZONE_OLD", RECORD_NAME);
    let mut seeded = ServiceRecord::empty(service_key());
    seeded.record_sets.insert(old.clone());
    seeded.version = 4;
    h.store.inner().insert_unchecked(StoredRecord::encode(&seeded)).await;
    h.dns.insert(&old, 60, &["8.8.8.8"]);
    h.dns.make_inaccessible("ZONE_OLD");

    let report = h
        .engine
        .handle_queue_event(&queue_event(&[task_change("T1", "RUNNING", &["eni1"])]))
        .await
        .unwrap();

    assert_eq!(report.version, 5);
    assert_eq!(report.stale_cleanup.failed, vec![old.clone()]);
    let stored = h.store.get(&service_key()).await.unwrap().unwrap();
    assert_eq!(stored.record_sets, vec![locator()]);
}

#[tokio::test]
async fn stale_location_is_deleted() {
    let h = harness(MockAddressResolver::new().with_address("eni1", "9.9.9.9"));

    let old = RecordSetLocator::new(HOSTED_ZONE_ID, "old.myexample.com");
    let mut seeded = ServiceRecord::empty(service_key());
    seeded.record_sets.insert(old.clone());
    h.store.inner().insert_unchecked(StoredRecord::encode(&seeded)).await;
    h.dns.insert(&old, 60, &["8.8.8.8"]);

    let report = h
        .engine
        .handle_queue_event(&queue_event(&[task_change("T1", "RUNNING", &["eni1"])]))
        .await
        .unwrap();

    assert_eq!(report.stale_cleanup.deleted, vec![old.clone()]);
    assert!(h.dns.record_set(&old).is_none());
    assert!(h.dns.record_set(&locator()).is_some());
}

#[tokio::test]
async fn stale_location_is_deleted_even_when_current_update_fails() {
    let h = harness(MockAddressResolver::new().with_address("eni1", "9.9.9.9"));

    let old = RecordSetLocator::new("ZONE_OLD", RECORD_NAME);
    let mut seeded = ServiceRecord::empty(service_key());
    seeded.record_sets.insert(old.clone());
    h.store.inner().insert_unchecked(StoredRecord::encode(&seeded)).await;
    h.dns.insert(&old, 60, &["8.8.8.8"]);
    h.dns.make_inaccessible(HOSTED_ZONE_ID);

    let event = queue_event(&[task_change("T1", "RUNNING", &["eni1"])]);
    let err = h.engine.handle_queue_event(&event).await.unwrap_err();

    assert!(matches!(err, Error::DnsProvider(_)));
    assert!(h.dns.record_set(&old).is_none());
    let stored = h.store.get(&service_key()).await.unwrap().unwrap();
    assert_eq!(stored.record_sets, vec![locator()]);
}

#[tokio::test]
async fn stale_location_is_remembered_when_commit_fails() {
    let h = harness_with_store(
        MockAddressResolver::new().with_address("eni1", "9.9.9.9"),
        WriteBehavior::AlwaysFail,
    );

    let old = RecordSetLocator::new(HOSTED_ZONE_ID, "old.myexample.com");
    let mut seeded = ServiceRecord::empty(service_key());
    seeded.record_sets.insert(old.clone());
    h.store.inner().insert_unchecked(StoredRecord::encode(&seeded)).await;
    h.dns.insert(&old, 60, &["8.8.8.8"]);

    let event = queue_event(&[task_change("T1", "RUNNING", &["eni1"])]);
    assert!(h.engine.handle_queue_event(&event).await.is_err());

    // the delete already ran; the record still lists the location for the retry
    assert!(h.dns.record_set(&old).is_none());
    let stored = h.store.get(&service_key()).await.unwrap().unwrap();
    assert_eq!(stored.record_sets, vec![old]);
    assert!(h.dns.record_set(&locator()).is_none());
}

#[tokio::test]
async fn respelled_current_location_is_not_stale() {
    let h = harness(MockAddressResolver::new().with_address("eni1", "9.9.9.9"));

    let respelled = RecordSetLocator::new(HOSTED_ZONE_ID, "Test.MyExample.com.");
    let mut seeded = ServiceRecord::empty(service_key());
    seeded.record_sets.insert(respelled);
    h.store.inner().insert_unchecked(StoredRecord::encode(&seeded)).await;

    let report = h
        .engine
        .handle_queue_event(&queue_event(&[task_change("T1", "RUNNING", &["eni1"])]))
        .await
        .unwrap();

    assert_eq!(report.stale_cleanup, StaleCleanup::default());
    assert!(h.dns.record_set(&locator()).is_some());
    let stored = h.store.get(&service_key()).await.unwrap().unwrap();
    assert_eq!(stored.record_sets, vec![locator()]);
}

#[tokio::test]
async fn malformed_batch_writes_nothing() {
    let h = harness(MockAddressResolver::new().with_address("eni1", "9.9.9.9"));

    let mut missing_arn = task_change("T2", "RUNNING", &["eni2"]);
    missing_arn.as_object_mut().unwrap().remove("taskArn");

    let err = h
        .engine
        .handle_queue_event(&queue_event(&[
            task_change("T1", "RUNNING", &["eni1"]),
            missing_arn,
        ]))
        .await
        .unwrap_err();

    assert!(matches!(err, Error::MalformedInput(_)));
    assert_eq!(h.store.put_call_count(), 0);
    assert_eq!(h.dns.change_call_count(), 0);
}

#[tokio::test]
async fn teardown_deletes_current_record_set() {
    let h = harness(MockAddressResolver::new().with_address("eni1", "9.9.9.9"));

    h.engine
        .handle_queue_event(&queue_event(&[task_change("T1", "RUNNING", &["eni1"])]))
        .await
        .unwrap();
    h.dns.linger_after_delete(1);

    let outcome = h.engine.teardown().await.unwrap();

    assert_eq!(outcome, TeardownOutcome::Confirmed { checks: 2 });
    assert!(h.dns.record_set(&locator()).is_none());
}
