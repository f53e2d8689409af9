// # taskdns-core
//
// Core library that keeps a DNS record set in step with the public
// addresses of a container service's running tasks.
//
// ## Architecture Overview
//
// - **AddressResolver**: Trait for looking up public addresses of network interfaces
// - **RecordStore**: Trait for versioned persistence of service records
// - **RecordSetProvider**: Trait for reading and mutating DNS record sets
// - **merge**: Pure fold of task observations into a service record
// - **RecordsTable**: Optimistic read-merge-write loop over a RecordStore
// - **RecordSetAccessor**: Minimal-change DNS reconciler with backoff
// - **ReconcileEngine**: Orchestrates one invocation end to end
//
// ## Design Principles
//
// 1. **Stop wins**: a stopped task can never be resurrected by a late event
// 2. **Lost-update safety**: every write is guarded by the version read
// 3. **Idempotency**: replaying a batch leaves record and DNS unchanged
// 4. **Library-First**: adapters and the daemon are thin wrappers

pub mod config;
pub mod dns;
pub mod engine;
pub mod error;
pub mod events;
pub mod merge;
pub mod model;
pub mod state;
pub mod store;
pub mod traits;

// Re-export core types for convenience
pub use config::{DnsConfig, RecordSetConfig, ServiceConfig, StateStoreConfig, StoreConfig, TaskDnsConfig};
pub use dns::{ReconcileOutcome, RecordSetAccessor, TeardownOutcome};
pub use engine::{InvocationReport, ReconcileEngine};
pub use error::{Error, Result};
pub use events::{TaskStateChange, TaskStatus};
pub use merge::RecordUpdate;
pub use model::{NetworkInterface, RecordSetLocator, ServiceRecord, ServiceRecordKey, StoredRecord, TaskRecord};
pub use state::{FileRecordStore, MemoryRecordStore};
pub use store::RecordsTable;
pub use traits::{AddressResolver, RecordSetProvider, RecordStore};
