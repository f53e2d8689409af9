// # Record Set Provider Trait
//
// Defines the interface for reading and mutating DNS record sets.
//
// ## Implementations
//
// - Route 53: `taskdns-provider-route53` crate
//
// Providers are thin: one API call per method, no retry or backoff. They map
// "slow down" responses to `Error::Throttled` and "previous change still
// applying" responses to `Error::ChangeInProgress`; the `dns` module decides
// whether to retry.

use async_trait::async_trait;

use crate::model::RecordSetLocator;

/// Record type managed by taskdns
pub const RECORD_TYPE_A: &str = "A";

/// A DNS record set as reported by (or sent to) the provider
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordSet {
    /// Fully qualified name, with trailing dot
    pub name: String,
    /// Record type (`A`)
    pub record_type: String,
    /// Time-to-live in seconds
    pub ttl: Option<i64>,
    /// Record values, in provider order
    pub values: Vec<String>,
}

/// Mutation to apply to a record set
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeAction {
    /// Create or replace
    Upsert,
    /// Delete; the record set must match the existing one exactly
    Delete,
}

impl ChangeAction {
    /// Provider-facing action name
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeAction::Upsert => "UPSERT",
            ChangeAction::Delete => "DELETE",
        }
    }
}

/// A single record set change
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordSetChange {
    /// Where to apply the change
    pub locator: RecordSetLocator,
    /// What to do
    pub action: ChangeAction,
    /// The record set to upsert, or the existing one to delete
    pub record_set: RecordSet,
}

/// Trait for DNS record set provider implementations
#[async_trait]
pub trait RecordSetProvider: Send + Sync {
    /// List record sets starting at the locator's name and `record_type`
    ///
    /// Providers may return record sets that sort after the requested one
    /// when it does not exist; callers filter with
    /// [`crate::dns::find_locator_record_set`].
    async fn list_record_sets(
        &self,
        locator: &RecordSetLocator,
        record_type: &str,
    ) -> Result<Vec<RecordSet>, crate::Error>;

    /// Apply one change
    async fn change_record_set(&self, change: &RecordSetChange) -> Result<(), crate::Error>;

    /// Provider name (for logging/debugging)
    fn provider_name(&self) -> &'static str;
}
