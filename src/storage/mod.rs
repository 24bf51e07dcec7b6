// Storage module - snapshot persistence and the operation journal

mod disk;
pub mod journal;

pub use disk::StorageEngine;
pub use journal::{JournalManager, LogEntry, Operation};
