//! Data model
//!
//! - [`ServiceRecordKey`] / [`RecordSetLocator`]: identifiers
//! - [`ServiceRecord`] / [`TaskRecord`] / [`NetworkInterface`]: the aggregate
//! - [`StoredRecord`]: the persisted encoding

pub mod encoding;
pub mod key;
pub mod record;

pub use encoding::{StoredEni, StoredRecord, StoredTask};
pub use key::{KEY_SEPARATOR, RecordSetLocator, ServiceRecordKey};
pub use record::{NetworkInterface, ServiceRecord, TaskRecord};
