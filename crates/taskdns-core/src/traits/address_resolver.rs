// # Address Resolver Trait
//
// Looks up the public IPv4 address currently associated with each network
// interface. Pagination of the underlying API is the implementation's
// concern; callers get one complete map.
//
// ## Implementations
//
// - EC2: `taskdns-resolver-ec2` crate

use std::collections::HashMap;

use async_trait::async_trait;

/// Trait for address resolver implementations
///
/// Implementations are single-shot lookups: no retries, no caching across
/// calls. Errors are returned as `Error::AddressResolver`.
#[async_trait]
pub trait AddressResolver: Send + Sync {
    /// Resolve interface ids to public addresses
    ///
    /// # Parameters
    ///
    /// - `interface_ids`: Interface ids to look up (never empty when called by the core)
    ///
    /// # Returns
    ///
    /// - `Ok(map)`: interface id → public IPv4. Interfaces without a public
    ///   address, or unknown to the provider, are absent from the map.
    /// - `Err(Error)`: If the lookup failed
    async fn resolve(
        &self,
        interface_ids: &[String],
    ) -> Result<HashMap<String, String>, crate::Error>;

    /// Resolver name (for logging/debugging)
    fn resolver_name(&self) -> &'static str;
}
