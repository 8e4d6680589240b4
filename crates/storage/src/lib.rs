pub mod records;
pub mod repository;
pub mod snapshot;
pub mod sqlite;
pub mod store;

pub use repository::{DocumentRepository, InMemoryRepository, StorageError};
pub use snapshot::{Backup, Snapshot, StorageUsage};
pub use store::PersistentStore;
