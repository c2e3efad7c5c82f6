#![forbid(unsafe_code)]

pub mod kv;
pub mod repository;
pub mod snapshot;
pub mod sqlite;

pub use kv::{FileKeyValueStore, InMemoryKeyValueStore, KeyValueStore};
pub use repository::{
    AttemptLog, InMemoryRepository, QuestionStore, Storage, StorageError, SubjectCatalog,
};
pub use snapshot::{SESSION_SNAPSHOT_KEY, SnapshotStore};
