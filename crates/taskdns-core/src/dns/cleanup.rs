// # Stale-location cleanup
//
// When the configured record location changes (new zone or new name), the
// record still remembers the old one. Those locations are deleted on a
// best-effort basis: the old zone may no longer be reachable with our
// credentials, and that must not fail the invocation.

use std::collections::BTreeSet;

use tracing::{info, warn};

use super::RecordSetAccessor;
use crate::model::RecordSetLocator;

/// Tally of a best-effort cleanup pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StaleCleanup {
    /// Locations whose record set was deleted
    pub deleted: Vec<RecordSetLocator>,
    /// Locations that had no record set
    pub absent: Vec<RecordSetLocator>,
    /// Locations whose deletion failed
    pub failed: Vec<RecordSetLocator>,
}

/// Remembered locations that do not match `current`
pub fn stale_locations(
    remembered: &BTreeSet<RecordSetLocator>,
    current: &RecordSetLocator,
) -> Vec<RecordSetLocator> {
    remembered
        .iter()
        .filter(|locator| !locator.matches(current))
        .cloned()
        .collect()
}

/// Try to delete every stale location; never fails
pub async fn remove_stale(accessor: &RecordSetAccessor, stale: &[RecordSetLocator]) -> StaleCleanup {
    let mut cleanup = StaleCleanup::default();

    for locator in stale {
        match accessor.delete(locator).await {
            Ok(true) => {
                info!(%locator, "Deleted stale record set");
                cleanup.deleted.push(locator.clone());
            }
            Ok(false) => cleanup.absent.push(locator.clone()),
            Err(e) => {
                warn!(%locator, "Could not delete the stale record set: {}", e);
                cleanup.failed.push(locator.clone());
            }
        }
    }

    cleanup
}
