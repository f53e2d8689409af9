// # Route 53 Record Set Provider
//
// This crate provides a Route 53 implementation of `RecordSetProvider` for
// taskdns.
//
// ## Responsibilities
//
// - Looks up a record set with a single `ListResourceRecordSets` call
//   starting at the record's name and type
// - Applies exactly one change per call with `ChangeResourceRecordSets`
// - Maps Route 53 error codes onto the core error variants so the core can
//   decide what to retry
// - Dry-run mode: lookups are performed, changes are only logged
//
// ## What it does NOT do
//
// - No retry or backoff (owned by `RecordSetAccessor`)
// - No record comparison (owned by `RecordSetAccessor`)
// - No caching, no background tasks
//
// ## API Reference
//
// - ListResourceRecordSets: GET `/2013-04-01/hostedzone/{Id}/rrset`
// - ChangeResourceRecordSets: POST `/2013-04-01/hostedzone/{Id}/rrset`

use async_trait::async_trait;
use aws_sdk_route53::Client;
use aws_sdk_route53::error::{DisplayErrorContext, ProvideErrorMetadata};
use aws_sdk_route53::types::{
    Change, ChangeAction as SdkChangeAction, ChangeBatch, ResourceRecord, ResourceRecordSet,
    RrType,
};
use taskdns_core::model::RecordSetLocator;
use taskdns_core::traits::{ChangeAction, RecordSet, RecordSetChange, RecordSetProvider};
use taskdns_core::{Error, Result};
use tracing::{debug, info};

/// Comment attached to every change batch
pub const CHANGE_COMMENT: &str = "Automatic";

/// Route 53 error codes that mean "slow down"
const THROTTLING_CODES: &[&str] = &["Throttling", "ThrottlingException", "TooManyRequests"];

/// Route 53 error code for a change that collides with one still propagating
const PRIOR_REQUEST_NOT_COMPLETE: &str = "PriorRequestNotComplete";

/// Route 53 record set provider
///
/// Stateless and single-shot: every trait call maps to exactly one API call.
#[derive(Debug, Clone)]
pub struct Route53RecordSetProvider {
    client: Client,

    /// Dry-run mode: list calls go through, change calls are only logged
    dry_run: bool,
}

impl Route53RecordSetProvider {
    /// Create a provider from an existing client
    pub fn new(client: Client, dry_run: bool) -> Self {
        Self { client, dry_run }
    }

    /// Create a provider using the standard AWS SDK config chain
    pub async fn from_env(dry_run: bool) -> Self {
        let config = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;
        Self::new(Client::new(&config), dry_run)
    }

    /// Whether changes are skipped
    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }
}

/// Map a Route 53 error code to the core error taxonomy
fn classify_error(code: Option<&str>, detail: String) -> Error {
    match code {
        Some(code) if THROTTLING_CODES.contains(&code) => Error::throttled(detail),
        Some(PRIOR_REQUEST_NOT_COMPLETE) => Error::change_in_progress(detail),
        _ => Error::dns_provider(detail),
    }
}

fn map_sdk_error<E>(err: E, operation: &str, locator: &RecordSetLocator) -> Error
where
    E: ProvideErrorMetadata + std::error::Error + 'static,
{
    let code = err.code().map(str::to_string);
    let detail = format!("{operation} on {locator} failed: {}", DisplayErrorContext(&err));
    classify_error(code.as_deref(), detail)
}

fn from_sdk_record_set(record_set: &ResourceRecordSet) -> RecordSet {
    RecordSet {
        name: record_set.name().to_string(),
        record_type: record_set.r#type().as_str().to_string(),
        ttl: record_set.ttl(),
        values: record_set
            .resource_records()
            .iter()
            .map(|record| record.value().to_string())
            .collect(),
    }
}

fn to_sdk_change(change: &RecordSetChange) -> Result<ChangeBatch> {
    let build_error = |e: aws_sdk_route53::error::BuildError| {
        Error::dns_provider(format!("Invalid change for {}: {e}", change.locator))
    };

    let records = change
        .record_set
        .values
        .iter()
        .map(|value| ResourceRecord::builder().value(value).build().map_err(build_error))
        .collect::<Result<Vec<_>>>()?;

    let record_set = ResourceRecordSet::builder()
        .name(&change.record_set.name)
        .r#type(RrType::from(change.record_set.record_type.as_str()))
        .set_ttl(change.record_set.ttl)
        .set_resource_records(Some(records))
        .build()
        .map_err(build_error)?;

    let action = match change.action {
        ChangeAction::Upsert => SdkChangeAction::Upsert,
        ChangeAction::Delete => SdkChangeAction::Delete,
    };

    let sdk_change = Change::builder()
        .action(action)
        .resource_record_set(record_set)
        .build()
        .map_err(build_error)?;

    ChangeBatch::builder()
        .comment(CHANGE_COMMENT)
        .changes(sdk_change)
        .build()
        .map_err(build_error)
}

#[async_trait]
impl RecordSetProvider for Route53RecordSetProvider {
    async fn list_record_sets(
        &self,
        locator: &RecordSetLocator,
        record_type: &str,
    ) -> Result<Vec<RecordSet>> {
        debug!(%locator, record_type, "Listing record sets");

        let output = self
            .client
            .list_resource_record_sets()
            .hosted_zone_id(&locator.hosted_zone_id)
            .start_record_name(locator.fqdn())
            .start_record_type(RrType::from(record_type))
            .max_items(1)
            .send()
            .await
            .map_err(|e| map_sdk_error(e, "ListResourceRecordSets", locator))?;

        Ok(output
            .resource_record_sets()
            .iter()
            .map(from_sdk_record_set)
            .collect())
    }

    async fn change_record_set(&self, change: &RecordSetChange) -> Result<()> {
        let batch = to_sdk_change(change)?;

        info!(
            "{} {} {} (values: {})",
            if self.dry_run { "Would apply" } else { "Applying" },
            change.action.as_str(),
            change.locator,
            change.record_set.values.len()
        );

        if self.dry_run {
            info!("DRY-RUN: change for {} skipped", change.locator);
            return Ok(());
        }

        let output = self
            .client
            .change_resource_record_sets()
            .hosted_zone_id(&change.locator.hosted_zone_id)
            .change_batch(batch)
            .send()
            .await
            .map_err(|e| map_sdk_error(e, "ChangeResourceRecordSets", &change.locator))?;

        if let Some(info) = output.change_info() {
            debug!(change_id = info.id(), status = info.status().as_str(), "Change submitted");
        }

        Ok(())
    }

    fn provider_name(&self) -> &'static str {
        "route53"
    }
}
