//! Storage factory for creating persistence backends based on configuration

use std::sync::Arc;

use crate::core::config::{StorageConfig, StorageType};
use crate::storage::{FileStore, MemStore, Persistence};

/// Shared persistence handle used by the engine
pub type SharedStorage = Arc<dyn Persistence>;

/// Create a persistence backend based on configuration
pub fn create_storage(config: &StorageConfig) -> SharedStorage {
    match config.storage_type {
        StorageType::Memory => Arc::new(MemStore::new()),
        StorageType::File => Arc::new(FileStore::new(config.data_dir.clone())),
    }
}
