//! Collaborator traits for the taskdns system
//!
//! This module defines the seams through which the core talks to the outside world.
//!
//! - [`AddressResolver`]: Look up public addresses of network interfaces
//! - [`RecordStore`]: Versioned persistence of service records
//! - [`RecordSetProvider`]: Read and mutate external DNS record sets

pub mod address_resolver;
pub mod record_set_provider;
pub mod record_store;

pub use address_resolver::AddressResolver;
pub use record_set_provider::{ChangeAction, RecordSet, RecordSetChange, RecordSetProvider};
pub use record_store::RecordStore;
