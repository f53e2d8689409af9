// # Record keys
//
// `ServiceRecordKey` is the primary key of a stored record and
// `RecordSetLocator` names the external DNS record set a record projects to.
//
// The store key is encoded as `<cluster_arn>#<service_name>`. Neither
// component may contain `#`, so the encoding is reversible.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Separator used by the composite key encoding
pub const KEY_SEPARATOR: char = '#';

/// Identifies the record of one service in one cluster
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ServiceRecordKey {
    cluster_arn: String,
    service_name: String,
}

impl ServiceRecordKey {
    /// Create a key, rejecting components that contain the separator
    pub fn new(cluster_arn: impl Into<String>, service_name: impl Into<String>) -> Result<Self> {
        let cluster_arn = cluster_arn.into();
        let service_name = service_name.into();

        for (field, value) in [("cluster_arn", &cluster_arn), ("service_name", &service_name)] {
            if value.is_empty() {
                return Err(Error::invalid_input(format!("{field} cannot be empty")));
            }
            if value.contains(KEY_SEPARATOR) {
                return Err(Error::invalid_input(format!(
                    "{field} '{value}' cannot contain '{KEY_SEPARATOR}'"
                )));
            }
        }

        Ok(Self {
            cluster_arn,
            service_name,
        })
    }

    /// The cluster component
    pub fn cluster_arn(&self) -> &str {
        &self.cluster_arn
    }

    /// The service component
    pub fn service_name(&self) -> &str {
        &self.service_name
    }

    /// Encode as `<cluster_arn>#<service_name>`
    pub fn to_composite(&self) -> String {
        format!("{}{}{}", self.cluster_arn, KEY_SEPARATOR, self.service_name)
    }

    /// Decode a composite key produced by [`ServiceRecordKey::to_composite`]
    pub fn from_composite(composite: &str) -> Result<Self> {
        let (cluster_arn, service_name) = composite
            .split_once(KEY_SEPARATOR)
            .ok_or_else(|| Error::malformed(format!("composite key '{composite}' has no separator")))?;

        if service_name.contains(KEY_SEPARATOR) {
            return Err(Error::malformed(format!(
                "composite key '{composite}' has more than two components"
            )));
        }

        Self::new(cluster_arn, service_name).map_err(|e| Error::malformed(e.to_string()))
    }
}

impl fmt::Display for ServiceRecordKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_composite())
    }
}

/// Identifies an external DNS record set by hosted zone and record name
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RecordSetLocator {
    /// Hosted zone holding the record set
    pub hosted_zone_id: String,
    /// Record name, with or without the trailing dot
    pub record_name: String,
}

impl RecordSetLocator {
    /// Create a new locator
    pub fn new(hosted_zone_id: impl Into<String>, record_name: impl Into<String>) -> Self {
        Self {
            hosted_zone_id: hosted_zone_id.into(),
            record_name: record_name.into(),
        }
    }

    /// The record name as a fully qualified name (always ends with `.`)
    pub fn fqdn(&self) -> String {
        fqdn(&self.record_name)
    }

    /// Whether both locators address the same record set
    ///
    /// Record names are compared ignoring ASCII case and the trailing dot.
    pub fn matches(&self, other: &RecordSetLocator) -> bool {
        self.hosted_zone_id == other.hosted_zone_id && self.matches_name(&other.record_name)
    }

    /// Whether `name` is this locator's record name
    pub fn matches_name(&self, name: &str) -> bool {
        fqdn(&self.record_name).eq_ignore_ascii_case(&fqdn(name))
    }
}

impl fmt::Display for RecordSetLocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.hosted_zone_id, self.record_name)
    }
}

fn fqdn(name: &str) -> String {
    if name.ends_with('.') {
        name.to_string()
    } else {
        format!("{name}.")
    }
}
