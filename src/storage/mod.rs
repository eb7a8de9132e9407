//! Storage collaborator for the stand board
//!
//! The engine only talks to storage through [`OccupancyStore`]. Two
//! implementations are provided: SQLite for the running service and an
//! in-memory store for tests and dry runs.

mod memory;
pub mod repository;
mod sqlite;

use std::path::Path;
use std::sync::Arc;

use thiserror::Error;

pub use memory::MemoryOccupancyStore;
pub use repository::{OccupancyStore, RecordedOrder};
pub use sqlite::SqliteOccupancyStore;

use crate::catalog;

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors raised by a storage backend
#[derive(Error, Debug)]
pub enum StorageError {
    /// SQLite failure
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Filesystem failure while opening the database
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A previous holder of the connection lock panicked
    #[error("Storage lock poisoned")]
    Poisoned,

    /// A stored value could not be decoded
    #[error("Corrupt record: {0}")]
    Corrupt(String),

    /// Backend temporarily refusing requests
    #[error("Storage unavailable: {0}")]
    Unavailable(String),
}

impl StorageError {
    /// Check if the failure is likely transient
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::Sqlite(rusqlite::Error::SqliteFailure(err, _)) => matches!(
                err.code,
                rusqlite::ErrorCode::DatabaseBusy | rusqlite::ErrorCode::DatabaseLocked
            ),
            Self::Io(_) | Self::Unavailable(_) => true,
            _ => false,
        }
    }
}

/// Thread-safe shared store handle
pub type SharedOccupancyStore = Arc<dyn OccupancyStore>;

/// Open (or create) the SQLite store and seed the bundled catalog
pub fn create_sqlite_store(path: impl AsRef<Path>) -> StorageResult<SharedOccupancyStore> {
    let store = SqliteOccupancyStore::new(path)?;
    seed_catalog(&store)?;
    Ok(Arc::new(store))
}

/// Create an in-memory store seeded with the bundled catalog
pub fn create_memory_store() -> StorageResult<SharedOccupancyStore> {
    let store = MemoryOccupancyStore::new();
    seed_catalog(&store)?;
    Ok(Arc::new(store))
}

/// Insert the default stands when the store has no locations yet
///
/// Returns the number of stands inserted.
pub fn seed_catalog(store: &dyn OccupancyStore) -> StorageResult<usize> {
    if !store.locations()?.is_empty() {
        return Ok(0);
    }

    let locations = catalog::default_locations();
    for location in &locations {
        store.upsert_location(location)?;
    }

    tracing::info!(count = locations.len(), "Seeded default stand catalog");
    Ok(locations.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seed_catalog_once() {
        let store = MemoryOccupancyStore::new();
        assert_eq!(seed_catalog(&store).unwrap(), 21);
        assert_eq!(seed_catalog(&store).unwrap(), 0);
        assert_eq!(store.locations().unwrap().len(), 21);
    }

    #[test]
    fn test_storage_error_recoverability() {
        assert!(StorageError::Unavailable("down".to_string()).is_recoverable());
        assert!(!StorageError::Corrupt("bad timestamp".to_string()).is_recoverable());
        assert!(!StorageError::Poisoned.is_recoverable());
    }
}
