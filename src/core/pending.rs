//! Pending patch buffer.
//!
//! Edits made without an immediate commit are parked here per document, one
//! entry per block: the first `from` seen and the latest `to`. The buffer is
//! process memory only; anything still in it when the process stops is gone,
//! so callers must commit or discard before shutdown (see
//! [`PendingPatchBuffer::pending_documents`]).

use dashmap::DashMap;
use std::collections::BTreeMap;

use crate::types::{BlockId, BlockOp, BlockVer, DocId, OpSummary, PendingStatus, VersionSpan};

/// Coalesced pending change for one block
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingEntry {
    /// Pre-batch version and latest version
    pub span: VersionSpan,
    /// Operations folded into this entry
    pub ops: OpSummary,
}

/// Buffered entries of one document, ordered by block id
pub type PendingBatch = BTreeMap<BlockId, PendingEntry>;

/// Per-document buffer of uncommitted block version changes
#[derive(Debug, Default)]
pub struct PendingPatchBuffer {
    docs: DashMap<DocId, PendingBatch>,
}

impl PendingPatchBuffer {
    /// Create an empty buffer
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a change of `block_id` from `from` to `to`, coalescing with any
    /// entry already buffered for that block
    pub fn record(&self, doc_id: &DocId, block_id: &BlockId, from: BlockVer, to: BlockVer, op: BlockOp) {
        let mut batch = self.docs.entry(doc_id.clone()).or_default();
        batch
            .entry(block_id.clone())
            .and_modify(|entry| {
                entry.span.to = to;
                entry.ops.record(op);
            })
            .or_insert_with(|| PendingEntry {
                span: VersionSpan { from, to },
                ops: OpSummary::of(op),
            });
    }

    /// Count of blocks with buffered changes
    pub fn status(&self, doc_id: &DocId) -> PendingStatus {
        let pending_count = self.docs.get(doc_id).map(|b| b.len()).unwrap_or(0);
        PendingStatus {
            pending_count,
            has_pending: pending_count > 0,
        }
    }

    /// Copy of the document's batch, leaving it buffered
    pub fn peek(&self, doc_id: &DocId) -> PendingBatch {
        self.docs.get(doc_id).map(|b| b.clone()).unwrap_or_default()
    }

    /// Remove and return the document's batch in one step
    pub fn take(&self, doc_id: &DocId) -> Option<PendingBatch> {
        self.docs
            .remove(doc_id)
            .map(|(_, batch)| batch)
            .filter(|batch| !batch.is_empty())
    }

    /// Remove one block's entry so an immediate commit can absorb it
    pub fn take_block(&self, doc_id: &DocId, block_id: &BlockId) -> Option<PendingEntry> {
        let entry = self.docs.get_mut(doc_id)?.remove(block_id);
        self.docs.remove_if(doc_id, |_, batch| batch.is_empty());
        entry
    }

    /// Put a batch back after a failed commit, merging with anything recorded since
    pub fn restore(&self, doc_id: &DocId, batch: PendingBatch) {
        let mut current = self.docs.entry(doc_id.clone()).or_default();
        for (block_id, older) in batch {
            current
                .entry(block_id)
                .and_modify(|newer| {
                    newer.span.from = older.span.from;
                    newer.ops.merge(&older.ops);
                })
                .or_insert(older);
        }
    }

    /// Documents that still have buffered changes
    pub fn pending_documents(&self) -> Vec<DocId> {
        let mut docs: Vec<DocId> = self
            .docs
            .iter()
            .filter(|e| !e.value().is_empty())
            .map(|e| e.key().clone())
            .collect();
        docs.sort();
        docs
    }
}
