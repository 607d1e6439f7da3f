//! Core engine and foundations
//!
//! This module contains the document engine together with the pieces it is
//! built from: error handling, configuration, logging, identifier and hash
//! strategies, sort-key allocation, payload extraction, the pending patch
//! buffer and per-document locks.

pub mod config;
pub mod engine;
pub mod error;
pub mod factory;
pub mod hashing;
pub mod id_gen;
pub mod locks;
pub mod logging;
pub mod payload;
pub mod pending;
pub mod sort_key;

// Re-export commonly used items
pub use config::Config;
pub use engine::DocumentEngine;
pub use error::{Error, Result, StorageError};
pub use factory::{create_engine, create_engine_with_storage};
pub use hashing::{Blake3Hasher, ContentHasher, Fnv1aHasher};
pub use id_gen::{Base62IdGenerator, IdGenerator, SequentialIdGenerator, UuidIdGenerator};
pub use locks::DocLocks;
pub use pending::PendingPatchBuffer;
