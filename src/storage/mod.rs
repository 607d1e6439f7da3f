//! Storage layer for the block-document engine
//!
//! This module provides the persistence capability the engine consumes.
//! Backends store and fetch entities; they never validate relationships
//! between them, which is the engine's job.

use async_trait::async_trait;

use crate::core::error::StorageResult;
use crate::types::{
    BlockId, BlockIdentity, BlockVer, BlockVersion, DocId, DocRevision, DocSnapshot, DocVer,
    Document,
};

/// In-memory reference backend
pub mod mem_store;

/// JSON-file-per-entity backend
pub mod file_store;

/// Backend selection from configuration
pub mod factory;

pub use factory::create_storage;
pub use file_store::FileStore;
pub use mem_store::MemStore;

/// Persistence capability for documents, blocks, revisions and snapshots.
///
/// Lookups return `Ok(None)` when the entity does not exist; `Err` is reserved
/// for backend failures and reaches the caller unchanged.
#[async_trait]
pub trait Persistence: Send + Sync {
    /// Get a document by ID
    async fn get_document(&self, id: &DocId) -> StorageResult<Option<Document>>;

    /// Insert or replace a document
    async fn upsert_document(&self, doc: &Document) -> StorageResult<()>;

    /// Get a block identity by ID
    async fn get_block(&self, id: &BlockId) -> StorageResult<Option<BlockIdentity>>;

    /// Insert or replace a block identity
    async fn upsert_block(&self, block: &BlockIdentity) -> StorageResult<()>;

    /// All block identities of a document, deleted ones included
    async fn list_blocks(&self, doc_id: &DocId) -> StorageResult<Vec<BlockIdentity>>;

    /// Get one version of a block
    async fn get_block_version(
        &self,
        block_id: &BlockId,
        ver: BlockVer,
    ) -> StorageResult<Option<BlockVersion>>;

    /// Insert or replace a block version
    async fn upsert_block_version(&self, version: &BlockVersion) -> StorageResult<()>;

    /// All versions of a block, ascending by version
    async fn list_block_versions(&self, block_id: &BlockId) -> StorageResult<Vec<BlockVersion>>;

    /// Get the revision that produced `doc_ver`
    async fn get_revision(
        &self,
        doc_id: &DocId,
        doc_ver: DocVer,
    ) -> StorageResult<Option<DocRevision>>;

    /// Insert or replace a revision
    async fn upsert_revision(&self, revision: &DocRevision) -> StorageResult<()>;

    /// Most recent revisions first, at most `limit` of them
    async fn list_revisions(
        &self,
        doc_id: &DocId,
        limit: Option<usize>,
    ) -> StorageResult<Vec<DocRevision>>;

    /// Revisions with `after < doc_ver <= through`, ascending.
    ///
    /// The default walks `get_revision` one version at a time and skips gaps;
    /// backends with ordered indexes should override it.
    async fn list_revisions_range(
        &self,
        doc_id: &DocId,
        after: DocVer,
        through: DocVer,
    ) -> StorageResult<Vec<DocRevision>> {
        let mut revisions = Vec::new();
        for ver in (after + 1)..=through {
            if let Some(revision) = self.get_revision(doc_id, ver).await? {
                revisions.push(revision);
            }
        }
        Ok(revisions)
    }

    /// Insert or replace a snapshot
    async fn upsert_snapshot(&self, snapshot: &DocSnapshot) -> StorageResult<()>;

    /// Snapshots of a document, newest first
    async fn list_snapshots(&self, doc_id: &DocId) -> StorageResult<Vec<DocSnapshot>>;

    /// Snapshot with the greatest `doc_ver <= at`, if any
    async fn nearest_snapshot(
        &self,
        doc_id: &DocId,
        at: DocVer,
    ) -> StorageResult<Option<DocSnapshot>>;
}
