//! Blockdoc - A versioned block-document engine
//!
//! Documents are trees of independently versioned blocks. Every edit writes
//! an immutable block version, commits append revisions to a per-document
//! log, and state at any version is rebuilt by replaying that log over the
//! nearest snapshot. Siblings are ordered with fractional sort keys so
//! inserts never renumber existing blocks.
#![warn(missing_docs)]

// Core foundational modules
pub mod constants;
pub mod core;
pub mod types;

// Main functional modules
pub mod delta;
pub mod storage;
pub mod system;

// Re-export commonly used items for convenience
pub use core::{Config, DocumentEngine, Error, Result};
pub use storage::Persistence;

/// Crate version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
/// Crate name
pub const NAME: &str = env!("CARGO_PKG_NAME");

/// Initialize logging from configuration and register metrics
pub fn init(config: &Config) -> Result<()> {
    core::logging::init_logging(&config.logging)?;
    tracing::info!("Initializing {} v{}", NAME, VERSION);

    if system::Metrics::global().is_none() {
        tracing::warn!("Metrics registry unavailable");
    }

    Ok(())
}
