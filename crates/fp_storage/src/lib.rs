use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;

use fp_core::{ContentRepository, Error, ListStorage, Result, VersionGate};
use tracing::info;

pub mod backends;
pub mod sync;

pub use backends::*;
pub use sync::StorageSync;

/// A store that serves both lists and content items.
pub trait StorageBackend: ListStorage + ContentRepository {}

impl<T: ListStorage + ContentRepository> StorageBackend for T {}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageKind {
    Memory,
    SQLite,
}

impl FromStr for StorageKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "memory" => Ok(Self::Memory),
            "sqlite" => Ok(Self::SQLite),
            other => Err(Error::InvalidInput(format!("Unknown storage backend: {}", other))),
        }
    }
}

#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub kind: StorageKind,
    pub db_path: PathBuf,
    pub gate: VersionGate,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            kind: StorageKind::Memory,
            db_path: PathBuf::from("lists.db"),
            gate: VersionGate::default(),
        }
    }
}

/// Both halves of the persistence boundary, usually backed by the same store.
#[derive(Clone)]
pub struct Storage {
    pub lists: Arc<dyn ListStorage>,
    pub content: Arc<dyn ContentRepository>,
}

impl Storage {
    pub fn from_backend<B: StorageBackend + 'static>(backend: B) -> Self {
        let backend = Arc::new(backend);
        Self {
            lists: backend.clone(),
            content: backend,
        }
    }
}

pub async fn create_storage(config: &StorageConfig) -> Result<Storage> {
    let storage = match config.kind {
        StorageKind::Memory => Storage::from_backend(MemoryStorage::with_gate(config.gate)),
        #[cfg(feature = "sqlite")]
        StorageKind::SQLite => {
            Storage::from_backend(SQLiteStorage::new_with_path(&config.db_path, config.gate).await?)
        }
        #[cfg(not(feature = "sqlite"))]
        StorageKind::SQLite => {
            return Err(Error::Storage(
                "SQLite support was not compiled in (enable the `sqlite` feature)".to_string(),
            ))
        }
    };
    info!("🏦 Storage backend initialized ({:?})", config.kind);
    Ok(storage)
}

pub mod prelude {
    pub use super::backends::*;
    pub use super::{create_storage, Storage, StorageConfig, StorageKind, StorageSync};
}
