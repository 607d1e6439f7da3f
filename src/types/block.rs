//! Block identities, immutable block versions and block operation inputs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::ids::{ActorId, BlockId, BlockVer, DocId};
use super::revision::DocRevision;

/// Version-independent record of one block.
///
/// Only the `latest_*` pointers and the soft-delete fields change after
/// creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlockIdentity {
    /// Block identifier
    pub id: BlockId,
    /// Document the block belongs to
    pub doc_id: DocId,
    /// Type tag, e.g. `paragraph`, `heading`, `page`
    pub block_type: String,
    /// Creation time
    pub created_at: DateTime<Utc>,
    /// Creator
    pub created_by: Option<ActorId>,
    /// Highest version number written for this block
    pub latest_ver: BlockVer,
    /// When the latest version was written
    pub latest_at: DateTime<Utc>,
    /// Author of the latest version
    pub latest_by: Option<ActorId>,
    /// Soft-delete flag
    pub is_deleted: bool,
    /// Deletion time
    pub deleted_at: Option<DateTime<Utc>>,
    /// Who deleted the block
    pub deleted_by: Option<ActorId>,
}

/// Kind of entity an outbound reference points at
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RefKind {
    /// Another document
    Doc,
    /// A block (any document)
    Block,
    /// An uploaded asset
    Asset,
}

/// Outbound reference found in a block payload
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BlockRef {
    /// What is referenced
    pub kind: RefKind,
    /// Target identifier
    pub target: String,
}

/// Immutable snapshot of one block at one version
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlockVersion {
    /// Block identifier
    pub block_id: BlockId,
    /// Version number, `previous + 1`
    pub ver: BlockVer,
    /// Parent block; the root block names itself
    pub parent_id: BlockId,
    /// Fractional key ordering this block among its siblings
    pub sort_key: String,
    /// Visual indent level
    pub indent: u32,
    /// Whether children are collapsed in the editor
    pub collapsed: bool,
    /// Opaque editor payload
    pub payload: Value,
    /// Content hash over block type and payload
    pub hash: String,
    /// Plain text extracted from the payload
    pub plain_text: String,
    /// Outbound references extracted from the payload
    pub refs: Vec<BlockRef>,
    /// Write time
    pub created_at: DateTime<Utc>,
    /// Author
    pub created_by: Option<ActorId>,
}

impl BlockVersion {
    /// True for the root block, whose parent pointer is itself
    pub fn is_self_parented(&self) -> bool {
        self.parent_id == self.block_id
    }
}

/// Input for `create_block`
#[derive(Debug, Clone)]
pub struct CreateBlock {
    /// Target document
    pub doc_id: DocId,
    /// Block type tag
    pub block_type: String,
    /// Editor payload
    pub payload: Value,
    /// Parent block; the document root when `None`
    pub parent_id: Option<BlockId>,
    /// Insert directly after this sibling
    pub after: Option<BlockId>,
    /// Insert directly before this sibling
    pub before: Option<BlockId>,
    /// Indent level
    pub indent: u32,
    /// Acting user
    pub actor: Option<ActorId>,
    /// Commit immediately (`true`) or buffer the patch (`false`)
    pub create_version: bool,
}

impl CreateBlock {
    /// Append a block of `block_type` under the root, committing immediately
    pub fn new(doc_id: impl Into<DocId>, block_type: impl Into<String>, payload: Value) -> Self {
        Self {
            doc_id: doc_id.into(),
            block_type: block_type.into(),
            payload,
            parent_id: None,
            after: None,
            before: None,
            indent: 0,
            actor: None,
            create_version: true,
        }
    }
}

/// Input for `update_block_content`
#[derive(Debug, Clone)]
pub struct UpdateBlock {
    /// Target document
    pub doc_id: DocId,
    /// Block to update
    pub block_id: BlockId,
    /// New payload
    pub payload: Value,
    /// Acting user
    pub actor: Option<ActorId>,
    /// Commit immediately or buffer
    pub create_version: bool,
}

/// Input for `move_block`
#[derive(Debug, Clone)]
pub struct MoveBlock {
    /// Target document
    pub doc_id: DocId,
    /// Block to move
    pub block_id: BlockId,
    /// New parent; the document root when `None`
    pub parent_id: Option<BlockId>,
    /// Place directly after this sibling
    pub after: Option<BlockId>,
    /// Place directly before this sibling
    pub before: Option<BlockId>,
    /// New indent; unchanged when `None`
    pub indent: Option<u32>,
    /// Acting user
    pub actor: Option<ActorId>,
    /// Commit immediately or buffer
    pub create_version: bool,
}

/// Input for `delete_block`
#[derive(Debug, Clone)]
pub struct DeleteBlock {
    /// Target document
    pub doc_id: DocId,
    /// Block to soft-delete
    pub block_id: BlockId,
    /// Acting user
    pub actor: Option<ActorId>,
    /// Commit immediately or buffer
    pub create_version: bool,
}

/// Result of a block create/update/move
#[derive(Debug, Clone)]
pub struct BlockOutcome {
    /// Identity after the operation
    pub block: BlockIdentity,
    /// Version written by the operation
    pub version: BlockVersion,
    /// Revision committed, when `create_version` was set
    pub revision: Option<DocRevision>,
}

/// Result of a block delete
#[derive(Debug, Clone)]
pub struct DeleteOutcome {
    /// Identity after the operation
    pub block: BlockIdentity,
    /// Revision committed, when `create_version` was set and the block was live
    pub revision: Option<DocRevision>,
}
