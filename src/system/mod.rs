//! System utilities and monitoring
//!
//! This module contains process-wide monitoring for the engine.

pub mod metrics;

pub use metrics::Metrics;
