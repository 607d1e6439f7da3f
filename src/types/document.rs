//! Document records.
//!
//! A [`Document`] is the head pointer of a block tree: it names the root block
//! and carries `head` (the latest committed version) and `published_head`
//! (the latest version exposed to readers, never above `head`).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ids::{ActorId, BlockId, DocId, DocVer};

/// Lifecycle status of a document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DocStatus {
    /// Editable working copy
    #[default]
    Active,
    /// Read-only, kept for reference
    Archived,
}

/// Who may read the document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    /// Only workspace members
    #[default]
    Private,
    /// Anyone with the link, at `published_head`
    Public,
}

/// Persisted document record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    /// Document identifier
    pub id: DocId,
    /// Human readable title
    pub title: String,
    /// Owning workspace, if any
    pub workspace_id: Option<String>,
    /// Current editable version; advances by one per commit
    pub head: DocVer,
    /// Last version exposed to readers (`<= head`)
    pub published_head: DocVer,
    /// Root block of the tree
    pub root_block_id: BlockId,
    /// Lifecycle status
    pub status: DocStatus,
    /// Read visibility
    pub visibility: Visibility,
    /// Creation time
    pub created_at: DateTime<Utc>,
    /// Creator
    pub created_by: Option<ActorId>,
    /// Last metadata or head change
    pub updated_at: DateTime<Utc>,
    /// Author of the last change
    pub updated_by: Option<ActorId>,
}

impl Document {
    /// Record that `actor` changed the document now
    pub fn touch(&mut self, actor: Option<&str>) {
        self.updated_at = Utc::now();
        self.updated_by = actor.map(str::to_string);
    }
}

/// Input for creating a document
#[derive(Debug, Clone, Default)]
pub struct CreateDocument {
    /// Explicit id; generated when `None`
    pub doc_id: Option<DocId>,
    /// Title
    pub title: String,
    /// Owning workspace
    pub workspace_id: Option<String>,
    /// Acting user
    pub actor: Option<ActorId>,
}

/// Metadata changes applied by `update_document_meta`. `None` leaves a field as is.
#[derive(Debug, Clone, Default)]
pub struct DocumentPatch {
    /// New title
    pub title: Option<String>,
    /// New status
    pub status: Option<DocStatus>,
    /// New visibility
    pub visibility: Option<Visibility>,
}
