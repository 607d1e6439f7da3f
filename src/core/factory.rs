//! Engine factory wiring storage and strategies from configuration

use std::sync::Arc;
use tracing::info;

use crate::core::config::Config;
use crate::core::engine::DocumentEngine;
use crate::core::error::Result;
use crate::core::hashing::hasher_for;
use crate::core::id_gen::id_generator_for;
use crate::storage::factory::{create_storage, SharedStorage};

/// Build an engine from validated configuration
pub fn create_engine(config: &Config) -> Result<DocumentEngine> {
    config.validate()?;
    let storage = create_storage(&config.storage);
    info!(
        storage = ?config.storage.storage_type,
        ids = ?config.ids.strategy,
        hashing = ?config.hashing.algorithm,
        snapshot_interval = config.engine.snapshot_interval,
        "Engine created"
    );
    Ok(create_engine_with_storage(config, storage))
}

/// Build an engine over an existing backend, taking the remaining settings
/// from `config`
pub fn create_engine_with_storage(config: &Config, storage: SharedStorage) -> DocumentEngine {
    DocumentEngine::new(storage, config.engine.clone())
        .with_id_generator(Arc::from(id_generator_for(config.ids.strategy)))
        .with_hasher(Arc::from(hasher_for(config.hashing.algorithm)))
}
