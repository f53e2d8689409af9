//! Contract Test: Stop Wins & Address Consistency
//!
//! Constraints verified:
//! - A stopped task is never resurrected, whatever order events arrive in
//! - Duplicate batches leave the record unchanged
//! - `addresses` always equals the addresses of live tasks
//! - Tombstones disappear only after the retention window
//!
//! If this test fails, the merge engine is broken.

mod common;

use chrono::{Duration, TimeZone, Utc};
use proptest::prelude::*;
use taskdns_core::merge::{RecordUpdate, default_retention, merge};
use taskdns_core::model::{NetworkInterface, ServiceRecord, TaskRecord};

fn empty() -> ServiceRecord {
    ServiceRecord::empty(common::service_key())
}

fn running(arn: &str, ip: &str) -> TaskRecord {
    TaskRecord::new(arn, vec![NetworkInterface::resolved(format!("eni-{arn}"), ip)])
}

fn stopped(arn: &str) -> TaskRecord {
    TaskRecord::new(arn, vec![])
}

#[test]
fn stop_before_running_across_batches() {
    let t0 = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();

    // STOPPED arrives first, RUNNING for the same task later
    let record = merge(empty(), &RecordUpdate::new().stopped(stopped("T1")), t0, default_retention());
    let record = merge(
        record,
        &RecordUpdate::new().running(running("T1", "9.9.9.9")),
        t0 + Duration::seconds(10),
        default_retention(),
    );

    assert!(record.addresses.is_empty());
    assert_eq!(record.tasks["T1"].stopped_at, Some(t0));
}

#[test]
fn stop_and_running_in_one_batch_in_either_order() {
    let t0 = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();

    let a = RecordUpdate::new()
        .running(running("T1", "9.9.9.9"))
        .stopped(stopped("T1"));
    let b = RecordUpdate::new()
        .stopped(stopped("T1"))
        .running(running("T1", "9.9.9.9"));

    let from_a = merge(empty(), &a, t0, default_retention());
    let from_b = merge(empty(), &b, t0, default_retention());

    assert!(from_a.addresses.is_empty());
    assert!(from_b.addresses.is_empty());
    assert!(from_a.task_is_stopped("T1"));
    assert!(from_b.task_is_stopped("T1"));
}

#[test]
fn tombstone_rejects_running_until_expired() {
    let t0 = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();

    let record = merge(empty(), &RecordUpdate::new().stopped(stopped("T1")), t0, default_retention());

    // within the window: rejected
    let record = merge(
        record,
        &RecordUpdate::new().running(running("T1", "9.9.9.9")),
        t0 + Duration::minutes(29),
        default_retention(),
    );
    assert!(record.addresses.is_empty());

    // past the window the tombstone is gone
    let record = merge(record, &RecordUpdate::new(), t0 + Duration::minutes(31), default_retention());
    assert!(record.tasks.is_empty());
}

#[test]
fn replayed_batch_is_a_no_op() {
    let t0 = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
    let batch = RecordUpdate::new()
        .running(running("T1", "1.1.1.1"))
        .running(running("T2", "2.2.2.2"))
        .stopped(stopped("T2"))
        .stopped(stopped("T3"));

    let once = merge(empty(), &batch, t0, default_retention());
    let twice = merge(once.clone(), &batch, t0 + Duration::seconds(1), default_retention());

    assert_eq!(once, twice);
}

#[derive(Debug, Clone)]
enum Observation {
    Running { task: u8, ip: u8 },
    Stopped { task: u8 },
}

fn observation() -> impl Strategy<Value = Observation> {
    prop_oneof![
        (0u8..6, 0u8..4).prop_map(|(task, ip)| Observation::Running { task, ip }),
        (0u8..6).prop_map(|task| Observation::Stopped { task }),
    ]
}

proptest! {
    #[test]
    fn addresses_match_live_tasks(batches in prop::collection::vec(prop::collection::vec(observation(), 0..6), 0..12)) {
        let t0 = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let mut record = empty();
        let mut ever_stopped = std::collections::BTreeSet::new();

        for (step, batch) in batches.iter().enumerate() {
            let mut update = RecordUpdate::new();
            for observation in batch {
                match observation {
                    Observation::Running { task, ip } => {
                        update = update.running(running(&format!("T{task}"), &format!("10.0.0.{ip}")));
                    }
                    Observation::Stopped { task } => {
                        update = update.stopped(stopped(&format!("T{task}")));
                        ever_stopped.insert(format!("T{task}"));
                    }
                }
            }

            let now = t0 + Duration::seconds(step as i64);
            record = merge(record, &update, now, default_retention());

            prop_assert_eq!(&record.addresses, &record.live_addresses());
            for arn in &ever_stopped {
                prop_assert!(record.task_is_stopped(arn));
            }
        }
    }
}
