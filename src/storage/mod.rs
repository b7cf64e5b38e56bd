//! Durable client-side key-value storage.
//!
//! The session store keeps exactly one entry here (the persisted session).
//! [`MemoryStore`] is used by tests and embedders; [`FileStore`] backs the CLI
//! with a JSON file in the config directory.

mod file;
mod memory;

use thiserror::Error;

pub use file::FileStore;
pub use memory::MemoryStore;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Failed to access storage file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Storage file is not a valid JSON object: {0}")]
    Format(#[from] serde_json::Error),
}

/// A synchronous string key-value slot, last writer wins.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;

    /// Removing a missing key is not an error.
    fn remove(&self, key: &str) -> Result<(), StorageError>;
}
