//! Revision log entries, snapshots and resolved document states.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::ids::{ActorId, BlockId, BlockVer, DocId, DocVer};

/// Block-version map of a document at some version
pub type BlockVersionMap = BTreeMap<BlockId, BlockVer>;

/// One block's version change within a revision
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionSpan {
    /// Version before the change
    pub from: BlockVer,
    /// Version after the change
    pub to: BlockVer,
}

/// Block version change recorded by a revision
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Patch {
    /// Changed block
    pub block_id: BlockId,
    /// Version before the change; 0 when the block was created by this revision
    pub from: BlockVer,
    /// Version after the change
    pub to: BlockVer,
}

/// Which line of history a revision belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Branch {
    /// Working edits
    #[default]
    Draft,
    /// Edits made as part of publishing
    Published,
}

/// Kind of block operation that produced a patch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BlockOp {
    /// Document initialization (root block)
    Init,
    /// Block created
    Create,
    /// Content updated
    Update,
    /// Re-parented or re-ordered
    Move,
    /// Soft-deleted
    Delete,
}

impl BlockOp {
    /// Lowercase verb used in commit messages
    pub fn as_str(&self) -> &'static str {
        match self {
            BlockOp::Init => "init",
            BlockOp::Create => "create",
            BlockOp::Update => "update",
            BlockOp::Move => "move",
            BlockOp::Delete => "delete",
        }
    }
}

/// Count of block operations folded into a revision
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct OpSummary {
    /// Initialization commits
    pub init: u32,
    /// Blocks created
    pub created: u32,
    /// Content updates
    pub updated: u32,
    /// Moves
    pub moved: u32,
    /// Soft deletes
    pub deleted: u32,
}

impl OpSummary {
    /// Summary holding a single operation
    pub fn of(op: BlockOp) -> Self {
        let mut summary = Self::default();
        summary.record(op);
        summary
    }

    /// Count one more operation
    pub fn record(&mut self, op: BlockOp) {
        match op {
            BlockOp::Init => self.init += 1,
            BlockOp::Create => self.created += 1,
            BlockOp::Update => self.updated += 1,
            BlockOp::Move => self.moved += 1,
            BlockOp::Delete => self.deleted += 1,
        }
    }

    /// Add another summary into this one
    pub fn merge(&mut self, other: &OpSummary) {
        self.init += other.init;
        self.created += other.created;
        self.updated += other.updated;
        self.moved += other.moved;
        self.deleted += other.deleted;
    }

    /// Total number of operations
    pub fn total(&self) -> u32 {
        self.init + self.created + self.updated + self.moved + self.deleted
    }
}

/// Append-only log entry keyed by `(doc_id, doc_ver)`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocRevision {
    /// Document
    pub doc_id: DocId,
    /// Version this revision produced
    pub doc_ver: DocVer,
    /// Block version changes
    pub patches: Vec<Patch>,
    /// Commit message
    pub message: String,
    /// Optional branch tag
    pub branch: Option<Branch>,
    /// Operation counts
    pub op_summary: OpSummary,
    /// Commit time
    pub created_at: DateTime<Utc>,
    /// Committer
    pub created_by: Option<ActorId>,
}

/// Compacted block-version map at a given document version
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocSnapshot {
    /// Document
    pub doc_id: DocId,
    /// Version captured
    pub doc_ver: DocVer,
    /// Resolved block versions at `doc_ver`
    pub block_version_map: BlockVersionMap,
    /// Capture time
    pub created_at: DateTime<Utc>,
}

/// Fully resolved document state at one version
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocStateResolved {
    /// Document
    pub doc_id: DocId,
    /// Resolved version
    pub doc_ver: DocVer,
    /// Block versions live at `doc_ver`
    pub block_version_map: BlockVersionMap,
}

/// Options for a commit of buffered patches
#[derive(Debug, Clone, Default)]
pub struct CommitOptions {
    /// Commit message
    pub message: String,
    /// Committer
    pub actor: Option<ActorId>,
    /// Branch tag
    pub branch: Option<Branch>,
}

impl CommitOptions {
    /// Commit with the given message and no actor
    pub fn message(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            ..Self::default()
        }
    }
}

/// Pending buffer status for one document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingStatus {
    /// Number of distinct blocks with buffered patches
    pub pending_count: usize,
    /// `pending_count > 0`
    pub has_pending: bool,
}
