//! Configuration types for the taskdns system
//!
//! This module defines all configuration structures used throughout the crate.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::dns::{self, RetryPolicy};
use crate::model::{RecordSetLocator, ServiceRecordKey};

/// Main taskdns configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskDnsConfig {
    /// The service whose tasks are tracked
    pub service: ServiceConfig,

    /// The record set the service's addresses are published to
    pub record_set: RecordSetConfig,

    /// Optimistic store accessor settings
    #[serde(default)]
    pub store: StoreConfig,

    /// DNS reconciler settings
    #[serde(default)]
    pub dns: DnsConfig,

    /// Record store backend
    #[serde(default)]
    pub state_store: StateStoreConfig,
}

impl TaskDnsConfig {
    /// Create a configuration with default tuning
    pub fn new(service: ServiceConfig, record_set: RecordSetConfig) -> Self {
        Self {
            service,
            record_set,
            store: StoreConfig::default(),
            dns: DnsConfig::default(),
            state_store: StateStoreConfig::default(),
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        self.service.validate()?;
        self.record_set.validate()?;
        self.store.validate()?;
        self.dns.validate()?;
        self.state_store.validate()?;
        Ok(())
    }
}

/// Service identity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Cluster ARN
    pub cluster_arn: String,

    /// Service name, matched against the `service:<name>` task group
    pub service_name: String,
}

impl ServiceConfig {
    /// Create a new service configuration
    pub fn new(cluster_arn: impl Into<String>, service_name: impl Into<String>) -> Self {
        Self {
            cluster_arn: cluster_arn.into(),
            service_name: service_name.into(),
        }
    }

    /// Validate the service configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        self.key().map(|_| ()).map_err(|e| crate::Error::config(e.to_string()))
    }

    /// Store key of the service record
    pub fn key(&self) -> Result<ServiceRecordKey, crate::Error> {
        ServiceRecordKey::new(&self.cluster_arn, &self.service_name)
    }
}

/// Published record set
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordSetConfig {
    /// Hosted zone id
    pub hosted_zone_id: String,

    /// Record name (e.g. "api.example.com")
    pub record_name: String,

    /// Record TTL in seconds
    #[serde(default = "default_ttl")]
    pub ttl: i64,

    /// Maximum number of values in the record set
    #[serde(default = "default_max_record_values")]
    pub max_record_values: usize,
}

impl RecordSetConfig {
    /// Create a new record set configuration
    pub fn new(hosted_zone_id: impl Into<String>, record_name: impl Into<String>) -> Self {
        Self {
            hosted_zone_id: hosted_zone_id.into(),
            record_name: record_name.into(),
            ttl: default_ttl(),
            max_record_values: default_max_record_values(),
        }
    }

    /// Validate the record set configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.hosted_zone_id.is_empty() {
            return Err(crate::Error::config("Hosted zone id cannot be empty"));
        }
        if self.record_name.is_empty() {
            return Err(crate::Error::config("Record name cannot be empty"));
        }
        if self.ttl <= 0 {
            return Err(crate::Error::config("Record TTL must be > 0"));
        }
        if self.max_record_values == 0 {
            return Err(crate::Error::config("Maximum record values must be > 0"));
        }
        Ok(())
    }

    /// Locator of the configured record set
    pub fn locator(&self) -> RecordSetLocator {
        RecordSetLocator::new(&self.hosted_zone_id, &self.record_name)
    }
}

fn default_ttl() -> i64 {
    dns::DEFAULT_TTL
}

fn default_max_record_values() -> usize {
    dns::DEFAULT_MAX_RECORD_VALUES
}

/// Optimistic store accessor configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Maximum read-merge-write cycles per update
    #[serde(default = "default_store_max_attempts")]
    pub max_attempts: usize,

    /// Minutes a tombstone is kept before it is expired
    #[serde(default = "default_retention_minutes")]
    pub retention_minutes: i64,
}

impl StoreConfig {
    /// Validate the store configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.max_attempts == 0 {
            return Err(crate::Error::config("Store max attempts must be > 0"));
        }
        if self.retention_minutes <= 0 {
            return Err(crate::Error::config("Tombstone retention must be > 0"));
        }
        Ok(())
    }

    /// Tombstone retention window
    pub fn retention(&self) -> chrono::Duration {
        chrono::Duration::minutes(self.retention_minutes)
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_store_max_attempts(),
            retention_minutes: default_retention_minutes(),
        }
    }
}

fn default_store_max_attempts() -> usize {
    crate::store::DEFAULT_MAX_ATTEMPTS
}

fn default_retention_minutes() -> i64 {
    crate::merge::DEFAULT_RETENTION_MINUTES
}

/// DNS reconciler configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DnsConfig {
    /// Total provider calls per operation, including the first
    #[serde(default = "default_dns_max_attempts")]
    pub max_attempts: usize,

    /// Backoff base delay (in milliseconds)
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,

    /// Existence checks after a teardown delete
    #[serde(default = "default_teardown_checks")]
    pub teardown_checks: usize,

    /// Pause between teardown existence checks (in seconds)
    #[serde(default = "default_teardown_interval_secs")]
    pub teardown_interval_secs: u64,
}

impl DnsConfig {
    /// Validate the DNS configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.max_attempts == 0 {
            return Err(crate::Error::config("DNS max attempts must be > 0"));
        }
        Ok(())
    }

    /// Retry policy for provider calls
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.max_attempts, Duration::from_millis(self.base_delay_ms))
    }

    /// Pause between teardown existence checks
    pub fn teardown_interval(&self) -> Duration {
        Duration::from_secs(self.teardown_interval_secs)
    }
}

impl Default for DnsConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_dns_max_attempts(),
            base_delay_ms: default_base_delay_ms(),
            teardown_checks: default_teardown_checks(),
            teardown_interval_secs: default_teardown_interval_secs(),
        }
    }
}

fn default_dns_max_attempts() -> usize {
    dns::retry::DEFAULT_MAX_ATTEMPTS
}

fn default_base_delay_ms() -> u64 {
    dns::retry::DEFAULT_BASE_DELAY.as_millis() as u64
}

fn default_teardown_checks() -> usize {
    dns::DEFAULT_TEARDOWN_CHECKS
}

fn default_teardown_interval_secs() -> u64 {
    dns::DEFAULT_TEARDOWN_INTERVAL.as_secs()
}

/// Record store configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StateStoreConfig {
    /// DynamoDB table
    #[serde(rename = "dynamodb")]
    DynamoDb {
        /// Table name
        table_name: String,
    },

    /// JSON file
    File {
        /// Path to the record file
        path: String,
    },

    /// In-memory store (not persistent)
    #[default]
    Memory,
}

impl StateStoreConfig {
    /// Validate the record store configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        match self {
            StateStoreConfig::DynamoDb { table_name } if table_name.is_empty() => {
                Err(crate::Error::config("DynamoDB table name cannot be empty"))
            }
            StateStoreConfig::File { path } if path.is_empty() => {
                Err(crate::Error::config("Record file path cannot be empty"))
            }
            _ => Ok(()),
        }
    }

    /// Get the store type name
    pub fn type_name(&self) -> &'static str {
        match self {
            StateStoreConfig::DynamoDb { .. } => "dynamodb",
            StateStoreConfig::File { .. } => "file",
            StateStoreConfig::Memory => "memory",
        }
    }
}
