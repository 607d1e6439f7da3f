//! Block create, update, move and delete, plus sibling key allocation.

use chrono::Utc;
use std::collections::{HashMap, HashSet};
use tracing::debug;

use super::DocumentEngine;
use crate::core::error::{Error, Result};
use crate::core::sort_key::{first_key, key_between};
use crate::system::metrics;
use crate::types::{
    BlockId, BlockIdentity, BlockOp, BlockOutcome, BlockVersion, CreateBlock, DeleteBlock,
    DeleteOutcome, DocId, Document, MoveBlock, UpdateBlock,
};

fn ensure_live(block: &BlockIdentity) -> Result<()> {
    if block.is_deleted {
        return Err(Error::invariant(format!("block {} is deleted", block.id)));
    }
    Ok(())
}

/// Children of `parent_id` in sort-key order, without `exclude`
fn siblings<'a>(
    layout: &'a [BlockVersion],
    parent_id: &BlockId,
    exclude: Option<&BlockId>,
) -> Vec<&'a BlockVersion> {
    let mut group: Vec<&BlockVersion> = layout
        .iter()
        .filter(|v| &v.parent_id == parent_id && !v.is_self_parented())
        .filter(|v| Some(&v.block_id) != exclude)
        .collect();
    group.sort_by(|a, b| {
        a.sort_key
            .cmp(&b.sort_key)
            .then_with(|| a.block_id.cmp(&b.block_id))
    });
    group
}

impl DocumentEngine {
    /// Create a block under `input.parent_id` (default: root).
    ///
    /// The new block gets version 1 and a sort key placed by the `after` /
    /// `before` anchors, or after the last sibling when neither is given.
    pub async fn create_block(&self, input: CreateBlock) -> Result<BlockOutcome> {
        let _guard = self.locks.acquire(&input.doc_id).await;
        let mut doc = self.load_document(&input.doc_id).await?;

        let parent_id = input
            .parent_id
            .unwrap_or_else(|| doc.root_block_id.clone());
        ensure_live(&self.load_block(&doc.id, &parent_id).await?)?;

        let layout = self.working_layout(&doc).await?;
        let sort_key = self
            .allocate_key(
                &doc.id,
                &layout,
                &parent_id,
                None,
                input.after.as_ref(),
                input.before.as_ref(),
            )
            .await?;

        let now = Utc::now();
        let block = BlockIdentity {
            id: BlockId::new(self.ids.next_id()),
            doc_id: doc.id.clone(),
            block_type: input.block_type,
            created_at: now,
            created_by: input.actor.clone(),
            latest_ver: 1,
            latest_at: now,
            latest_by: input.actor.clone(),
            is_deleted: false,
            deleted_at: None,
            deleted_by: None,
        };
        let version = self.new_version(
            &block,
            1,
            parent_id,
            sort_key,
            input.indent,
            false,
            input.payload,
            input.actor.as_ref(),
        );
        self.store.upsert_block(&block).await?;
        self.store.upsert_block_version(&version).await?;

        metrics::record(|m| m.blocks.created.inc());
        debug!(
            doc_id = %doc.id,
            block_id = %block.id,
            parent = %version.parent_id,
            sort_key = %version.sort_key,
            "Block created"
        );

        let revision = self
            .record_change(
                &mut doc,
                &block.id,
                0,
                1,
                BlockOp::Create,
                input.create_version,
                input.actor,
            )
            .await?;
        Ok(BlockOutcome {
            block,
            version,
            revision,
        })
    }

    /// Write a new version of a block with a replaced payload; placement is
    /// carried over from the latest version
    pub async fn update_block_content(&self, input: UpdateBlock) -> Result<BlockOutcome> {
        let _guard = self.locks.acquire(&input.doc_id).await;
        let mut doc = self.load_document(&input.doc_id).await?;
        let mut block = self.load_block(&doc.id, &input.block_id).await?;
        ensure_live(&block)?;

        let current = self.load_version(&block.id, block.latest_ver).await?;
        let ver = block.latest_ver + 1;
        let version = self.new_version(
            &block,
            ver,
            current.parent_id.clone(),
            current.sort_key.clone(),
            current.indent,
            current.collapsed,
            input.payload,
            input.actor.as_ref(),
        );
        self.store.upsert_block_version(&version).await?;

        block.latest_ver = ver;
        block.latest_at = version.created_at;
        block.latest_by = input.actor.clone();
        self.store.upsert_block(&block).await?;

        metrics::record(|m| m.blocks.updated.inc());
        debug!(doc_id = %doc.id, block_id = %block.id, ver, "Block content updated");

        let revision = self
            .record_change(
                &mut doc,
                &block.id,
                current.ver,
                ver,
                BlockOp::Update,
                input.create_version,
                input.actor,
            )
            .await?;
        Ok(BlockOutcome {
            block,
            version,
            revision,
        })
    }

    /// Re-parent and/or re-order a block, writing a new version.
    ///
    /// The root cannot move, and a block cannot move under itself or one of
    /// its descendants.
    pub async fn move_block(&self, input: MoveBlock) -> Result<BlockOutcome> {
        let _guard = self.locks.acquire(&input.doc_id).await;
        let mut doc = self.load_document(&input.doc_id).await?;

        if input.block_id == doc.root_block_id {
            return Err(Error::invariant(format!(
                "root block {} cannot be moved",
                input.block_id
            )));
        }
        let mut block = self.load_block(&doc.id, &input.block_id).await?;
        ensure_live(&block)?;

        let parent_id = input
            .parent_id
            .unwrap_or_else(|| doc.root_block_id.clone());
        ensure_live(&self.load_block(&doc.id, &parent_id).await?)?;

        let layout = self.working_layout(&doc).await?;
        ensure_not_descendant(&layout, &block.id, &parent_id)?;
        let sort_key = self
            .allocate_key(
                &doc.id,
                &layout,
                &parent_id,
                Some(&block.id),
                input.after.as_ref(),
                input.before.as_ref(),
            )
            .await?;

        let current = self.load_version(&block.id, block.latest_ver).await?;
        let ver = block.latest_ver + 1;
        let version = self.new_version(
            &block,
            ver,
            parent_id,
            sort_key,
            input.indent.unwrap_or(current.indent),
            current.collapsed,
            current.payload.clone(),
            input.actor.as_ref(),
        );
        self.store.upsert_block_version(&version).await?;

        block.latest_ver = ver;
        block.latest_at = version.created_at;
        block.latest_by = input.actor.clone();
        self.store.upsert_block(&block).await?;

        metrics::record(|m| m.blocks.moved.inc());
        debug!(
            doc_id = %doc.id,
            block_id = %block.id,
            parent = %version.parent_id,
            sort_key = %version.sort_key,
            ver,
            "Block moved"
        );

        let revision = self
            .record_change(
                &mut doc,
                &block.id,
                current.ver,
                ver,
                BlockOp::Move,
                input.create_version,
                input.actor,
            )
            .await?;
        Ok(BlockOutcome {
            block,
            version,
            revision,
        })
    }

    /// Soft-delete a block. Version history is kept; the recorded patch has
    /// `from == to == latest_ver`. Deleting an already deleted block changes
    /// nothing.
    pub async fn delete_block(&self, input: DeleteBlock) -> Result<DeleteOutcome> {
        let _guard = self.locks.acquire(&input.doc_id).await;
        let mut doc = self.load_document(&input.doc_id).await?;

        if input.block_id == doc.root_block_id {
            return Err(Error::invariant(format!(
                "root block {} cannot be deleted",
                input.block_id
            )));
        }
        let mut block = self.load_block(&doc.id, &input.block_id).await?;
        if block.is_deleted {
            debug!(doc_id = %doc.id, block_id = %block.id, "Block already deleted");
            return Ok(DeleteOutcome {
                block,
                revision: None,
            });
        }

        block.is_deleted = true;
        block.deleted_at = Some(Utc::now());
        block.deleted_by = input.actor.clone();
        self.store.upsert_block(&block).await?;

        metrics::record(|m| m.blocks.deleted.inc());
        debug!(doc_id = %doc.id, block_id = %block.id, "Block deleted");

        let ver = block.latest_ver;
        let revision = self
            .record_change(
                &mut doc,
                &block.id,
                ver,
                ver,
                BlockOp::Delete,
                input.create_version,
                input.actor,
            )
            .await?;
        Ok(DeleteOutcome { block, revision })
    }

    /// Sort key for a new child of `parent_id` (default: root) placed by the
    /// optional anchors
    pub async fn compute_sort_key(
        &self,
        doc_id: &DocId,
        parent_id: Option<&BlockId>,
        after: Option<&BlockId>,
        before: Option<&BlockId>,
    ) -> Result<String> {
        let doc = self.load_document(doc_id).await?;
        let parent_id = parent_id.unwrap_or(&doc.root_block_id);
        self.load_block(&doc.id, parent_id).await?;

        let layout = self.working_layout(&doc).await?;
        self.allocate_key(&doc.id, &layout, parent_id, None, after, before)
            .await
    }

    /// Head state with buffered changes laid over it, as loaded versions
    async fn working_layout(&self, doc: &Document) -> Result<Vec<BlockVersion>> {
        let mut map = self.resolve(doc, None).await?.block_version_map;
        for (block_id, entry) in self.pending.peek(&doc.id) {
            map.insert(block_id, entry.span.to);
        }

        let mut layout = Vec::with_capacity(map.len());
        for (block_id, ver) in &map {
            if let Some(version) = self.store.get_block_version(block_id, *ver).await? {
                layout.push(version);
            }
        }
        Ok(layout)
    }

    async fn allocate_key(
        &self,
        doc_id: &DocId,
        layout: &[BlockVersion],
        parent_id: &BlockId,
        exclude: Option<&BlockId>,
        after: Option<&BlockId>,
        before: Option<&BlockId>,
    ) -> Result<String> {
        for anchor in after.into_iter().chain(before) {
            ensure_live(&self.load_block(doc_id, anchor).await?)?;
        }

        let group = siblings(layout, parent_id, exclude);
        let position = |anchor: &BlockId| {
            group
                .iter()
                .position(|v| &v.block_id == anchor)
                .ok_or_else(|| {
                    Error::invariant(format!("block {} is not a child of {}", anchor, parent_id))
                })
        };

        let key = match (after, before) {
            (None, None) => match group.last() {
                Some(last) => key_between(Some(last.sort_key.as_str()), None)?,
                None => first_key(),
            },
            (Some(after), None) => {
                let i = position(after)?;
                let next = group.get(i + 1).map(|v| v.sort_key.as_str());
                key_between(Some(group[i].sort_key.as_str()), next)?
            }
            (None, Some(before)) => {
                let i = position(before)?;
                let prev = i.checked_sub(1).map(|j| group[j].sort_key.as_str());
                key_between(prev, Some(group[i].sort_key.as_str()))?
            }
            (Some(after), Some(before)) => {
                let lower = group[position(after)?].sort_key.as_str();
                let upper = group[position(before)?].sort_key.as_str();
                key_between(Some(lower), Some(upper))?
            }
        };
        Ok(key)
    }
}

/// Reject a move of `block_id` under `parent_id` when the parent chain of
/// `parent_id` reaches `block_id`
fn ensure_not_descendant(
    layout: &[BlockVersion],
    block_id: &BlockId,
    parent_id: &BlockId,
) -> Result<()> {
    let parents: HashMap<&BlockId, &BlockId> = layout
        .iter()
        .filter(|v| !v.is_self_parented())
        .map(|v| (&v.block_id, &v.parent_id))
        .collect();

    let mut seen = HashSet::new();
    let mut cursor = Some(parent_id);
    while let Some(id) = cursor {
        if id == block_id {
            return Err(Error::invariant(format!(
                "cannot move block {} under itself or its descendant {}",
                block_id, parent_id
            )));
        }
        if !seen.insert(id) {
            break;
        }
        cursor = parents.get(id).copied();
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use serde_json::json;

    fn version(id: &str, parent: &str, key: &str) -> BlockVersion {
        BlockVersion {
            block_id: BlockId::from(id),
            ver: 1,
            parent_id: BlockId::from(parent),
            sort_key: key.into(),
            indent: 0,
            collapsed: false,
            payload: json!({}),
            hash: String::new(),
            plain_text: String::new(),
            refs: Vec::new(),
            created_at: Utc::now(),
            created_by: None,
        }
    }

    #[test]
    fn test_siblings_sorted_and_filtered() {
        let layout = vec![
            version("root", "root", "V"),
            version("b", "root", "k"),
            version("a", "root", "V"),
            version("x", "b", "V"),
        ];
        let ids: Vec<&str> = siblings(&layout, &BlockId::from("root"), Some(&BlockId::from("b")))
            .iter()
            .map(|v| v.block_id.as_str())
            .collect();
        assert_eq!(ids, vec!["a"]);
    }

    #[test]
    fn test_descendant_check() {
        let layout = vec![
            version("root", "root", "V"),
            version("a", "root", "V"),
            version("a1", "a", "V"),
            version("a2", "a1", "V"),
        ];
        let a = BlockId::from("a");
        assert!(ensure_not_descendant(&layout, &a, &BlockId::from("a2")).is_err());
        assert!(ensure_not_descendant(&layout, &a, &a).is_err());
        assert!(ensure_not_descendant(&layout, &BlockId::from("a2"), &BlockId::from("root")).is_ok());
    }
}
