// # Record Store Implementations
//
// This module provides implementations of the RecordStore trait for
// different persistence strategies. The DynamoDB store lives in its own
// crate.

pub mod file;
pub mod memory;

pub use file::FileRecordStore;
pub use memory::MemoryRecordStore;
