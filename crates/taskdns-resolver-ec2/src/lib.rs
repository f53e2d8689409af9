// # EC2 Address Resolver
//
// Resolves network interface identifiers to their public IPv4 addresses
// using `DescribeNetworkInterfaces`.
//
// ## Behavior
//
// - All identifiers go into one paginated query
// - Interfaces without a public address association are left out of the result
// - Interfaces the query returns but nobody asked for are ignored
// - Errors (including unknown interface ids) fail the whole lookup
//
// The engine never calls this with an empty id list, and never asks about
// tasks that are already stopped, whose interfaces are likely gone.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use aws_sdk_ec2::Client;
use aws_sdk_ec2::error::DisplayErrorContext;
use aws_sdk_ec2::types::NetworkInterface;
use taskdns_core::traits::AddressResolver;
use taskdns_core::{Error, Result};
use tracing::debug;

/// Resolver backed by the EC2 API
#[derive(Debug, Clone)]
pub struct Ec2AddressResolver {
    client: Client,
}

impl Ec2AddressResolver {
    /// Create a resolver from an existing client
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Create a resolver using the standard AWS SDK config chain
    pub async fn from_env() -> Self {
        let config = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;
        Self::new(Client::new(&config))
    }
}

/// Public address of a described interface, if it was requested and has one
fn public_address<'a>(
    interface: &'a NetworkInterface,
    requested: &HashSet<&str>,
) -> Option<(&'a str, &'a str)> {
    let id = interface.network_interface_id()?;
    if !requested.contains(id) {
        return None;
    }

    let address = interface.association()?.public_ip()?;
    if address.is_empty() {
        return None;
    }

    Some((id, address))
}

#[async_trait]
impl AddressResolver for Ec2AddressResolver {
    async fn resolve(&self, interface_ids: &[String]) -> Result<HashMap<String, String>> {
        let mut resolved = HashMap::new();
        if interface_ids.is_empty() {
            return Ok(resolved);
        }

        let requested: HashSet<&str> = interface_ids.iter().map(String::as_str).collect();

        let mut pages = self
            .client
            .describe_network_interfaces()
            .set_network_interface_ids(Some(interface_ids.to_vec()))
            .into_paginator()
            .send();

        while let Some(page) = pages.next().await {
            let page = page.map_err(|e| {
                Error::address_resolver(format!(
                    "DescribeNetworkInterfaces failed: {}",
                    DisplayErrorContext(&e)
                ))
            })?;

            for interface in page.network_interfaces() {
                if let Some((id, address)) = public_address(interface, &requested) {
                    resolved.insert(id.to_string(), address.to_string());
                }
            }
        }

        debug!(
            requested = interface_ids.len(),
            resolved = resolved.len(),
            "Described network interfaces"
        );
        Ok(resolved)
    }

    fn resolver_name(&self) -> &'static str {
        "ec2"
    }
}
