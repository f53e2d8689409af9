// # Stored record encoding
//
// Wire shape of a `ServiceRecord` as persisted by every `RecordStore`:
//
// ```json
// {
//   "cluster_service": "<cluster_arn>#<service_name>",
//   "version": 12,
//   "ipv4s": ["1.1.2.1", "1.1.2.2"],
//   "task_info": {
//     "TASK1_ARN": {
//       "task_arn": "TASK1_ARN",
//       "stopped_datetime": "2020-10-04T23:47:36.322158Z",
//       "enis": [{ "eni_id": "TASK1_ENI1_ID", "public_ipv4": "1.1.1.1" }]
//     }
//   },
//   "record_sets": [{ "hosted_zone_id": "Z1", "record_name": "api.example.com" }]
// }
// ```
//
// Empty optional fields are omitted entirely, never written as `[]`, `{}` or
// `null`, to keep items small.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::key::{RecordSetLocator, ServiceRecordKey};
use super::record::{NetworkInterface, ServiceRecord, TaskRecord};
use crate::error::Result;

/// Attribute name of the composite primary key
pub const PRIMARY_KEY_ATTRIBUTE: &str = "cluster_service";

/// Attribute name of the version guard
pub const VERSION_ATTRIBUTE: &str = "version";

/// Persisted form of a [`ServiceRecord`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredRecord {
    /// Composite primary key
    pub cluster_service: String,
    /// Version guard
    pub version: u64,
    /// Sorted live addresses
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ipv4s: Vec<String>,
    /// Task bookkeeping by ARN
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub task_info: BTreeMap<String, StoredTask>,
    /// Known record set locations
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub record_sets: Vec<RecordSetLocator>,
}

/// Persisted form of a [`TaskRecord`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredTask {
    pub task_arn: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stopped_datetime: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub enis: Vec<StoredEni>,
}

/// Persisted form of a [`NetworkInterface`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredEni {
    pub eni_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub public_ipv4: Option<String>,
}

impl StoredRecord {
    /// Encode a record
    pub fn encode(record: &ServiceRecord) -> Self {
        Self {
            cluster_service: record.key.to_composite(),
            version: record.version,
            ipv4s: record.addresses.iter().cloned().collect(),
            task_info: record
                .tasks
                .iter()
                .map(|(arn, task)| (arn.clone(), StoredTask::encode(task)))
                .collect(),
            record_sets: record.record_sets.iter().cloned().collect(),
        }
    }

    /// Decode into a record, validating the composite key
    pub fn decode(self) -> Result<ServiceRecord> {
        let key = ServiceRecordKey::from_composite(&self.cluster_service)?;

        Ok(ServiceRecord {
            key,
            addresses: self.ipv4s.into_iter().collect(),
            tasks: self
                .task_info
                .into_iter()
                .map(|(arn, task)| (arn, task.decode()))
                .collect(),
            record_sets: self.record_sets.into_iter().collect(),
            version: self.version,
        })
    }

    /// Serialize to JSON
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Deserialize from JSON
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

impl StoredTask {
    fn encode(task: &TaskRecord) -> Self {
        Self {
            task_arn: task.task_arn.clone(),
            stopped_datetime: task.stopped_at,
            enis: task
                .network_interfaces
                .iter()
                .map(|eni| StoredEni {
                    eni_id: eni.interface_id.clone(),
                    public_ipv4: eni.public_ipv4.clone(),
                })
                .collect(),
        }
    }

    fn decode(self) -> TaskRecord {
        TaskRecord {
            task_arn: self.task_arn,
            network_interfaces: self
                .enis
                .into_iter()
                .map(|eni| NetworkInterface {
                    interface_id: eni.eni_id,
                    public_ipv4: eni.public_ipv4,
                })
                .collect(),
            stopped_at: self.stopped_datetime,
        }
    }
}
