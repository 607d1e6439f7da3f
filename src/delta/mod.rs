//! Diff module for block versions and resolved document states.
//!
//! This module provides:
//! - Per-block comparison of placement, content hash and plain text
//! - Line-based text diffs rendered as an annotated listing
//! - Changed-block sets between two resolved document states

pub mod diff;
pub mod text;

// Re-export main types for convenience
pub use diff::{
    diff_block_versions, diff_doc_states, BlockChange, BlockVersionDiff, DocVersionDiff,
};
pub use text::{diff_lines, DiffOp, TextDiff};
