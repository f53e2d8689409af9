//! Error types for the taskdns system
//!
//! This module defines all error types used throughout the crate. Retry
//! decisions are made by matching on variants, never on message text.

use thiserror::Error;

/// Result type alias for taskdns operations
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for the taskdns system
#[derive(Error, Debug)]
pub enum Error {
    /// The conditional write was rejected because the stored version moved
    #[error("Version conflict on {key}: expected stored version {expected}")]
    VersionConflict {
        /// Composite key of the record
        key: String,
        /// Version the writer read before merging
        expected: u64,
    },

    /// The optimistic read-merge-write cycle never won the version guard
    #[error("Exceeded maximum retries ({attempts}) while optimistically putting changes to {key}")]
    RetriesExhausted {
        /// Composite key of the record
        key: String,
        /// Number of attempts made
        attempts: usize,
    },

    /// The DNS provider asked us to slow down
    #[error("Throttled: {0}")]
    Throttled(String),

    /// A previous change to the record set is still being applied
    #[error("Prior change still in progress: {0}")]
    ChangeInProgress(String),

    /// A notification or stored item is missing required fields
    #[error("Malformed input: {0}")]
    MalformedInput(String),

    /// Invalid input supplied by the caller
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Record not found
    #[error("Record not found: {0}")]
    NotFound(String),

    /// Record store errors
    #[error("State store error: {0}")]
    StateStore(String),

    /// DNS provider errors
    #[error("DNS provider error: {0}")]
    DnsProvider(String),

    /// Address resolver errors
    #[error("Address resolver error: {0}")]
    AddressResolver(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic error with context
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create a version conflict error
    pub fn version_conflict(key: impl Into<String>, expected: u64) -> Self {
        Self::VersionConflict {
            key: key.into(),
            expected,
        }
    }

    /// Create a throttling error
    pub fn throttled(msg: impl Into<String>) -> Self {
        Self::Throttled(msg.into())
    }

    /// Create a "change in progress" error
    pub fn change_in_progress(msg: impl Into<String>) -> Self {
        Self::ChangeInProgress(msg.into())
    }

    /// Create a malformed input error
    pub fn malformed(msg: impl Into<String>) -> Self {
        Self::MalformedInput(msg.into())
    }

    /// Create an invalid input error
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    /// Create a "not found" error
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    /// Create a state store error
    pub fn state_store(msg: impl Into<String>) -> Self {
        Self::StateStore(msg.into())
    }

    /// Create a DNS provider error
    pub fn dns_provider(msg: impl Into<String>) -> Self {
        Self::DnsProvider(msg.into())
    }

    /// Create an address resolver error
    pub fn address_resolver(msg: impl Into<String>) -> Self {
        Self::AddressResolver(msg.into())
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Whether the store rejected a write because of the version guard
    pub fn is_version_conflict(&self) -> bool {
        matches!(self, Self::VersionConflict { .. })
    }

    /// Whether a DNS provider call may succeed if repeated after a pause
    pub fn is_transient_dns(&self) -> bool {
        matches!(self, Self::Throttled(_) | Self::ChangeInProgress(_))
    }
}

/// Helper for converting anyhow::Error to our Error type
impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Self::Other(err.to_string())
    }
}
