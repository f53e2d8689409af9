//! DynamoDB-backed [`RecordStore`].
//!
//! Each service record is one item keyed by `cluster_service`. Attributes
//! are stored natively (`version` as a number, `task_info` as a map, and so
//! on) so the conditional write can compare `version` server side.
//!
//! # Version guard
//!
//! Every put carries the condition
//!
//! ```text
//! attribute_not_exists(version) OR version = :read_version
//! ```
//!
//! and a failed condition surfaces as [`Error::VersionConflict`], which the
//! optimistic loop in `RecordsTable` retries.
//!
//! # Table schema
//!
//! | Attribute         | Type | Description                     |
//! |-------------------|------|---------------------------------|
//! | `cluster_service` | S    | Partition key                   |
//! | `version`         | N    | Version guard                   |
//! | `ipv4s`           | L    | Sorted live addresses           |
//! | `task_info`       | M    | Task bookkeeping by ARN         |
//! | `record_sets`     | L    | Known record set locations      |

use std::collections::HashMap;

use async_trait::async_trait;
use aws_sdk_dynamodb::Client;
use aws_sdk_dynamodb::error::DisplayErrorContext;
use aws_sdk_dynamodb::types::AttributeValue;
use serde_json::{Map, Number, Value};
use taskdns_core::model::encoding::{PRIMARY_KEY_ATTRIBUTE, VERSION_ATTRIBUTE};
use taskdns_core::model::{ServiceRecordKey, StoredRecord};
use taskdns_core::traits::RecordStore;
use taskdns_core::{Error, Result};
use tracing::{debug, info};

/// DynamoDB record store.
#[derive(Debug, Clone)]
pub struct DynamoDbRecordStore {
    client: Client,
    table_name: String,
}

impl DynamoDbRecordStore {
    /// Creates a store over an existing client.
    pub fn new(client: Client, table_name: impl Into<String>) -> Self {
        Self {
            client,
            table_name: table_name.into(),
        }
    }

    /// Creates a store using the standard AWS SDK config chain.
    pub async fn from_env(table_name: impl Into<String>) -> Self {
        let config = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;
        Self::new(Client::new(&config), table_name)
    }

    /// Name of the backing table.
    pub fn table_name(&self) -> &str {
        &self.table_name
    }
}

// ---------------------------------------------------------------------------
// Attribute conversion
// ---------------------------------------------------------------------------

fn to_attribute(value: Value) -> AttributeValue {
    match value {
        Value::Null => AttributeValue::Null(true),
        Value::Bool(b) => AttributeValue::Bool(b),
        Value::Number(n) => AttributeValue::N(n.to_string()),
        Value::String(s) => AttributeValue::S(s),
        Value::Array(items) => AttributeValue::L(items.into_iter().map(to_attribute).collect()),
        Value::Object(fields) => AttributeValue::M(
            fields
                .into_iter()
                .map(|(name, value)| (name, to_attribute(value)))
                .collect(),
        ),
    }
}

fn parse_number(n: &str) -> Result<Number> {
    if let Ok(u) = n.parse::<u64>() {
        return Ok(Number::from(u));
    }
    if let Ok(i) = n.parse::<i64>() {
        return Ok(Number::from(i));
    }
    n.parse::<f64>()
        .ok()
        .and_then(Number::from_f64)
        .ok_or_else(|| Error::state_store(format!("invalid number attribute '{n}'")))
}

fn from_attribute(attribute: &AttributeValue) -> Result<Value> {
    Ok(match attribute {
        AttributeValue::Null(_) => Value::Null,
        AttributeValue::Bool(b) => Value::Bool(*b),
        AttributeValue::N(n) => Value::Number(parse_number(n)?),
        AttributeValue::S(s) => Value::String(s.clone()),
        AttributeValue::L(items) => {
            Value::Array(items.iter().map(from_attribute).collect::<Result<_>>()?)
        }
        AttributeValue::M(fields) => Value::Object(from_attributes(fields)?),
        other => {
            return Err(Error::state_store(format!(
                "unsupported attribute type: {other:?}"
            )));
        }
    })
}

fn from_attributes(fields: &HashMap<String, AttributeValue>) -> Result<Map<String, Value>> {
    fields
        .iter()
        .map(|(name, value)| Ok((name.clone(), from_attribute(value)?)))
        .collect()
}

/// Encodes a stored record as a DynamoDB item.
fn to_item(record: &StoredRecord) -> Result<HashMap<String, AttributeValue>> {
    match to_attribute(serde_json::to_value(record)?) {
        AttributeValue::M(item) => Ok(item),
        _ => Err(Error::state_store("stored record did not encode to a map")),
    }
}

/// Decodes a DynamoDB item into a stored record.
fn from_item(item: &HashMap<String, AttributeValue>) -> Result<StoredRecord> {
    let value = Value::Object(from_attributes(item)?);
    Ok(serde_json::from_value(value)?)
}

fn map_sdk_error(err: impl std::error::Error + 'static, operation: &str, key: &str) -> Error {
    Error::state_store(format!(
        "DynamoDB {operation} failed for {key}: {}",
        DisplayErrorContext(&err)
    ))
}

// ---------------------------------------------------------------------------
// RecordStore implementation
// ---------------------------------------------------------------------------

#[async_trait]
impl RecordStore for DynamoDbRecordStore {
    async fn get(&self, key: &ServiceRecordKey) -> Result<Option<StoredRecord>> {
        let composite = key.to_composite();

        let result = self
            .client
            .get_item()
            .table_name(&self.table_name)
            .key(PRIMARY_KEY_ATTRIBUTE, AttributeValue::S(composite.clone()))
            .consistent_read(true)
            .send()
            .await
            .map_err(|e| map_sdk_error(e, "GetItem", &composite))?;

        match result.item() {
            Some(item) => {
                debug!(key = %composite, "Found a pre-existing record");
                from_item(item).map(Some)
            }
            None => Ok(None),
        }
    }

    async fn put_if_version(&self, item: &StoredRecord, read_version: u64) -> Result<()> {
        let attributes = to_item(item)?;

        let outcome = self
            .client
            .put_item()
            .table_name(&self.table_name)
            .set_item(Some(attributes))
            .condition_expression("attribute_not_exists(#v) OR #v = :read_version")
            .expression_attribute_names("#v", VERSION_ATTRIBUTE)
            .expression_attribute_values(":read_version", AttributeValue::N(read_version.to_string()))
            .send()
            .await;

        match outcome {
            Ok(_) => Ok(()),
            Err(sdk_err) => {
                if let Some(service_err) = sdk_err.as_service_error() {
                    if service_err.is_conditional_check_failed_exception() {
                        return Err(Error::version_conflict(&item.cluster_service, read_version));
                    }
                }
                Err(map_sdk_error(sdk_err, "PutItem", &item.cluster_service))
            }
        }
    }

    async fn delete(&self, key: &ServiceRecordKey) -> Result<()> {
        let composite = key.to_composite();
        info!(key = %composite, "Deleting record");

        self.client
            .delete_item()
            .table_name(&self.table_name)
            .key(PRIMARY_KEY_ATTRIBUTE, AttributeValue::S(composite.clone()))
            .send()
            .await
            .map_err(|e| map_sdk_error(e, "DeleteItem", &composite))?;

        Ok(())
    }

    fn store_name(&self) -> &'static str {
        "dynamodb"
    }
}
