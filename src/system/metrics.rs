//! Metrics collection for the block-document engine
//!
//! Prometheus counters registered once in a process-wide registry.

use crate::core::error::Result;
use once_cell::sync::Lazy;
use prometheus::{Histogram, HistogramOpts, IntCounter, Registry};

/// Global metrics registry
static REGISTRY: Lazy<Registry> = Lazy::new(Registry::new);

/// Block operation counters
pub struct BlockMetrics {
    /// Blocks created
    pub created: IntCounter,
    /// Content updates
    pub updated: IntCounter,
    /// Moves
    pub moved: IntCounter,
    /// Soft deletes
    pub deleted: IntCounter,
}

/// Revision log metrics
pub struct HistoryMetrics {
    /// Revisions committed
    pub revisions_committed: IntCounter,
    /// Snapshots written
    pub snapshots_created: IntCounter,
    /// Revisions replayed per state resolution
    pub replay_length: Histogram,
}

/// Centralized metrics for the engine
pub struct Metrics {
    /// Block operations
    pub blocks: BlockMetrics,
    /// Revisions and snapshots
    pub history: HistoryMetrics,
}

fn counter(name: &str, help: &str) -> Result<IntCounter> {
    let counter = IntCounter::new(name, help)?;
    REGISTRY.register(Box::new(counter.clone()))?;
    Ok(counter)
}

impl Metrics {
    /// Create and register all metrics
    fn new() -> Result<Self> {
        let replay_length = Histogram::with_opts(
            HistogramOpts::new(
                "bd_replay_revisions",
                "Revisions replayed on top of a snapshot per state resolution",
            )
            .buckets(vec![0.0, 1.0, 5.0, 10.0, 25.0, 50.0, 100.0, 250.0]),
        )?;
        REGISTRY.register(Box::new(replay_length.clone()))?;

        Ok(Self {
            blocks: BlockMetrics {
                created: counter("bd_blocks_created_total", "Total number of blocks created")?,
                updated: counter("bd_blocks_updated_total", "Total number of block content updates")?,
                moved: counter("bd_blocks_moved_total", "Total number of block moves")?,
                deleted: counter("bd_blocks_deleted_total", "Total number of block soft deletes")?,
            },
            history: HistoryMetrics {
                revisions_committed: counter(
                    "bd_revisions_committed_total",
                    "Total number of document revisions committed",
                )?,
                snapshots_created: counter(
                    "bd_snapshots_created_total",
                    "Total number of document snapshots written",
                )?,
                replay_length,
            },
        })
    }

    /// Get the global metrics instance, if registration succeeded
    pub fn global() -> Option<&'static Metrics> {
        static INSTANCE: Lazy<Option<Metrics>> = Lazy::new(|| match Metrics::new() {
            Ok(metrics) => Some(metrics),
            Err(e) => {
                tracing::warn!("metrics disabled: {}", e);
                None
            }
        });
        INSTANCE.as_ref()
    }
}

/// Registry holding every engine metric, for exposition by the host
pub fn registry() -> &'static Registry {
    &REGISTRY
}

/// Run `f` against the global metrics when they are available
pub(crate) fn record(f: impl FnOnce(&Metrics)) {
    if let Some(metrics) = Metrics::global() {
        f(metrics);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_global_metrics_register_once() {
        let before = Metrics::global().unwrap().blocks.created.get();
        record(|m| m.blocks.created.inc());
        assert!(Metrics::global().unwrap().blocks.created.get() > before);
        assert!(registry()
            .gather()
            .iter()
            .any(|family| family.get_name() == "bd_blocks_created_total"));
    }
}
