//! Block-version and document-state diffs.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use super::text::{diff_lines, TextDiff};
use crate::core::error::{Error, Result};
use crate::types::{BlockId, BlockVer, BlockVersion, DocStateResolved, DocVer};

/// Differences between two versions of the same block
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockVersionDiff {
    /// Block compared
    pub block_id: BlockId,
    /// Older side
    pub from_ver: BlockVer,
    /// Newer side
    pub to_ver: BlockVer,
    /// Parent, sort key or indent differ
    pub moved: bool,
    /// `moved` or the collapsed flag differs
    pub structure_changed: bool,
    /// Content hash differs
    pub content_changed: bool,
    /// Line diff of the plain text, when it differs
    pub text_diff: Option<TextDiff>,
}

/// Compare two versions of one block.
///
/// Fails with `InvalidInput` when the versions belong to different blocks.
pub fn diff_block_versions(from: &BlockVersion, to: &BlockVersion) -> Result<BlockVersionDiff> {
    if from.block_id != to.block_id {
        return Err(Error::invalid_input(format!(
            "cannot diff versions of different blocks ({} vs {})",
            from.block_id, to.block_id
        )));
    }

    let moved = from.parent_id != to.parent_id
        || from.sort_key != to.sort_key
        || from.indent != to.indent;
    let structure_changed = moved || from.collapsed != to.collapsed;
    let text_diff =
        (from.plain_text != to.plain_text).then(|| diff_lines(&from.plain_text, &to.plain_text));

    Ok(BlockVersionDiff {
        block_id: from.block_id.clone(),
        from_ver: from.ver,
        to_ver: to.ver,
        moved,
        structure_changed,
        content_changed: from.hash != to.hash,
        text_diff,
    })
}

/// Block ids whose resolved version differs between two states, including
/// blocks present on one side only
pub fn diff_doc_states(a: &DocStateResolved, b: &DocStateResolved) -> BTreeSet<BlockId> {
    let left = &a.block_version_map;
    let right = &b.block_version_map;
    left.keys()
        .chain(right.keys())
        .filter(|id| left.get(*id) != right.get(*id))
        .cloned()
        .collect()
}

/// Per-block change between two document versions
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockChange {
    /// Changed block
    pub block_id: BlockId,
    /// Version on the `from` side, `None` when absent there
    pub from: Option<BlockVer>,
    /// Version on the `to` side, `None` when absent there
    pub to: Option<BlockVer>,
}

/// Changed-block report between two document versions
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocVersionDiff {
    /// Resolved version on the left
    pub from_ver: DocVer,
    /// Resolved version on the right
    pub to_ver: DocVer,
    /// Changes ordered by block id
    pub changes: Vec<BlockChange>,
}

impl DocVersionDiff {
    /// Build the report from two resolved states
    pub fn between(a: &DocStateResolved, b: &DocStateResolved) -> Self {
        let changes = diff_doc_states(a, b)
            .into_iter()
            .map(|block_id| BlockChange {
                from: a.block_version_map.get(&block_id).copied(),
                to: b.block_version_map.get(&block_id).copied(),
                block_id,
            })
            .collect();
        Self {
            from_ver: a.doc_ver,
            to_ver: b.doc_ver,
            changes,
        }
    }

    /// Ids of all changed blocks
    pub fn changed_ids(&self) -> BTreeSet<BlockId> {
        self.changes.iter().map(|c| c.block_id.clone()).collect()
    }
}
