//! Identifier generation strategies injected into the engine.

use rand::{rng, Rng};
use std::sync::atomic::{AtomicU64, Ordering};

use crate::constants::{BASE62_CHARS, ID16_LENGTH};
use crate::core::config::IdStrategy;

/// Source of new document and block identifiers
pub trait IdGenerator: Send + Sync {
    /// Produce a fresh identifier, unique within this generator's lifetime
    fn next_id(&self) -> String;
}

/// Random UUID v4 identifiers
#[derive(Debug, Default, Clone, Copy)]
pub struct UuidIdGenerator;

impl IdGenerator for UuidIdGenerator {
    fn next_id(&self) -> String {
        uuid::Uuid::new_v4().to_string()
    }
}

/// Random 16-character base62 identifiers from the thread-local RNG.
///
/// Used where a UUID source is unavailable or unwanted.
#[derive(Debug, Default, Clone, Copy)]
pub struct Base62IdGenerator;

impl IdGenerator for Base62IdGenerator {
    fn next_id(&self) -> String {
        let mut rng = rng();
        (0..ID16_LENGTH)
            .map(|_| BASE62_CHARS[rng.random_range(0..BASE62_CHARS.len())] as char)
            .collect()
    }
}

/// Deterministic `prefix-N` identifiers, for tests and tooling
#[derive(Debug)]
pub struct SequentialIdGenerator {
    prefix: String,
    counter: AtomicU64,
}

impl SequentialIdGenerator {
    /// Start at `prefix-1`
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            counter: AtomicU64::new(0),
        }
    }
}

impl IdGenerator for SequentialIdGenerator {
    fn next_id(&self) -> String {
        let n = self.counter.fetch_add(1, Ordering::Relaxed) + 1;
        format!("{}-{}", self.prefix, n)
    }
}

/// Generator for a configured strategy
pub fn id_generator_for(strategy: IdStrategy) -> Box<dyn IdGenerator> {
    match strategy {
        IdStrategy::Uuid => Box::new(UuidIdGenerator),
        IdStrategy::Base62 => Box::new(Base62IdGenerator),
    }
}
