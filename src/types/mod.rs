//! Type definitions for the block-document engine
//!
//! This module contains the data model, organized by entity.

/// Identifier types
pub mod ids;
/// Document records
pub mod document;
/// Block identities and versions
pub mod block;
/// Revisions, snapshots and resolved states
pub mod revision;
/// Rendered block trees
pub mod tree;

// Re-export commonly used types for convenience
pub use ids::{ActorId, BlockId, BlockVer, DocId, DocVer};
pub use document::{CreateDocument, DocStatus, Document, DocumentPatch, Visibility};
pub use block::{
    BlockIdentity, BlockOutcome, BlockRef, BlockVersion, CreateBlock, DeleteBlock, DeleteOutcome,
    MoveBlock, RefKind, UpdateBlock,
};
pub use revision::{
    BlockOp, BlockVersionMap, Branch, CommitOptions, DocRevision, DocSnapshot, DocStateResolved,
    OpSummary, Patch, PendingStatus, VersionSpan,
};
pub use tree::{BlockNode, RenderOptions, RenderedNode};
