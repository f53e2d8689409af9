//! Lifecycle notification decoding
//!
//! Task state changes arrive wrapped twice: a queue envelope
//! `{"Records": [{"body": "<json>"}, ...]}` whose bodies are events carrying
//! the task description under `detail`.
//!
//! Decoding is strict about required fields: a body that is not JSON, or a
//! task description without `taskArn`, `lastStatus` or `group`, fails the
//! whole batch with [`Error::MalformedInput`]. Bodies without a task
//! description (other event kinds on the same queue) are skipped. Unknown
//! statuses decode fine and are left for the caller to skip.

use serde::Deserialize;
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::model::{NetworkInterface, TaskRecord};

/// Attachment type carrying a network interface
pub const ENI_ATTACHMENT_TYPE: &str = "eni";

/// Attachment detail naming the interface id
pub const NETWORK_INTERFACE_ID_DETAIL: &str = "networkInterfaceId";

/// Last reported status of a task
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskStatus {
    Running,
    Stopped,
    /// Any other status (PROVISIONING, PENDING, DEPROVISIONING, ...)
    Other(String),
}

impl TaskStatus {
    /// Parse an event status string
    pub fn parse(status: &str) -> Self {
        match status {
            "RUNNING" => TaskStatus::Running,
            "STOPPED" => TaskStatus::Stopped,
            other => TaskStatus::Other(other.to_string()),
        }
    }
}

/// One task state change notification
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskStateChange {
    pub task_arn: String,
    pub last_status: String,
    /// Deployment group, `service:<name>` for service tasks
    pub group: String,
    #[serde(default, alias = "networkInterfaces")]
    pub attachments: Vec<Attachment>,
}

/// A task attachment
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Attachment {
    #[serde(rename = "type", default)]
    pub attachment_type: String,
    #[serde(default)]
    pub details: Vec<AttachmentDetail>,
}

/// A name/value pair on an attachment
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AttachmentDetail {
    pub name: String,
    #[serde(default)]
    pub value: String,
}

impl TaskStateChange {
    /// Parsed status
    pub fn status(&self) -> TaskStatus {
        TaskStatus::parse(&self.last_status)
    }

    /// Whether the task belongs to the given service
    pub fn belongs_to_service(&self, service_name: &str) -> bool {
        self.group
            .strip_prefix("service:")
            .is_some_and(|name| name == service_name)
    }

    /// Interface ids of all ENI attachments
    pub fn interface_ids(&self) -> Vec<String> {
        self.attachments
            .iter()
            .filter(|attachment| attachment.attachment_type == ENI_ATTACHMENT_TYPE)
            .flat_map(|attachment| attachment.details.iter())
            .filter(|detail| detail.name == NETWORK_INTERFACE_ID_DETAIL)
            .map(|detail| detail.value.clone())
            .collect()
    }

    /// The task as an observation with unresolved interfaces
    pub fn task_observation(&self) -> TaskRecord {
        TaskRecord::new(
            self.task_arn.clone(),
            self.interface_ids()
                .into_iter()
                .map(NetworkInterface::unresolved)
                .collect(),
        )
    }
}

#[derive(Debug, Deserialize)]
struct QueueEnvelope {
    #[serde(rename = "Records")]
    records: Vec<QueueMessage>,
}

#[derive(Debug, Deserialize)]
struct QueueMessage {
    body: String,
}

/// Decode a queue envelope into the task state changes it carries
pub fn decode_queue_event(json: &str) -> Result<Vec<TaskStateChange>> {
    let envelope: QueueEnvelope = serde_json::from_str(json)
        .map_err(|e| Error::malformed(format!("invalid queue envelope: {e}")))?;

    let mut changes = Vec::with_capacity(envelope.records.len());
    for (index, message) in envelope.records.iter().enumerate() {
        if let Some(change) = decode_message_body(index, &message.body)? {
            changes.push(change);
        }
    }

    debug!(
        messages = envelope.records.len(),
        changes = changes.len(),
        "Decoded queue event"
    );
    Ok(changes)
}

fn decode_message_body(index: usize, body: &str) -> Result<Option<TaskStateChange>> {
    let mut message: serde_json::Value = serde_json::from_str(body)
        .map_err(|e| Error::malformed(format!("message {index} body is not JSON: {e}")))?;

    let detail = match message.get_mut("detail") {
        Some(detail) => detail.take(),
        None => {
            info!(index, "Received a non-task state message, skipping");
            return Ok(None);
        }
    };

    let change = serde_json::from_value(detail)
        .map_err(|e| Error::malformed(format!("message {index} task description: {e}")))?;
    Ok(Some(change))
}
