//! In-memory persistence backend using DashMap
//!
//! Entities are kept in concurrent maps keyed by their identifiers; version
//! histories live in ordered maps so range and nearest-at-or-before lookups
//! stay logarithmic.

use async_trait::async_trait;
use dashmap::DashMap;
use std::collections::{BTreeMap, BTreeSet};

use crate::core::error::StorageResult;
use crate::storage::Persistence;
use crate::types::{
    BlockId, BlockIdentity, BlockVer, BlockVersion, DocId, DocRevision, DocSnapshot, DocVer,
    Document,
};

/// In-memory store. Contents are lost when the process exits.
#[derive(Debug, Default)]
pub struct MemStore {
    /// Documents by id
    documents: DashMap<DocId, Document>,
    /// Block identities by id
    blocks: DashMap<BlockId, BlockIdentity>,
    /// Block ids per document
    doc_blocks: DashMap<DocId, BTreeSet<BlockId>>,
    /// Block versions per block, ordered by version
    versions: DashMap<BlockId, BTreeMap<BlockVer, BlockVersion>>,
    /// Revisions per document, ordered by document version
    revisions: DashMap<DocId, BTreeMap<DocVer, DocRevision>>,
    /// Snapshots per document, ordered by document version
    snapshots: DashMap<DocId, BTreeMap<DocVer, DocSnapshot>>,
}

impl MemStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored documents
    pub fn document_count(&self) -> usize {
        self.documents.len()
    }

    /// Number of stored block identities
    pub fn block_count(&self) -> usize {
        self.blocks.len()
    }

    /// Number of stored revisions for a document
    pub fn revision_count(&self, doc_id: &DocId) -> usize {
        self.revisions.get(doc_id).map(|r| r.len()).unwrap_or(0)
    }
}

#[async_trait]
impl Persistence for MemStore {
    async fn get_document(&self, id: &DocId) -> StorageResult<Option<Document>> {
        Ok(self.documents.get(id).map(|d| d.clone()))
    }

    async fn upsert_document(&self, doc: &Document) -> StorageResult<()> {
        self.documents.insert(doc.id.clone(), doc.clone());
        Ok(())
    }

    async fn get_block(&self, id: &BlockId) -> StorageResult<Option<BlockIdentity>> {
        Ok(self.blocks.get(id).map(|b| b.clone()))
    }

    async fn upsert_block(&self, block: &BlockIdentity) -> StorageResult<()> {
        self.doc_blocks
            .entry(block.doc_id.clone())
            .or_default()
            .insert(block.id.clone());
        self.blocks.insert(block.id.clone(), block.clone());
        Ok(())
    }

    async fn list_blocks(&self, doc_id: &DocId) -> StorageResult<Vec<BlockIdentity>> {
        let ids: Vec<BlockId> = match self.doc_blocks.get(doc_id) {
            Some(ids) => ids.iter().cloned().collect(),
            None => return Ok(Vec::new()),
        };
        Ok(ids
            .iter()
            .filter_map(|id| self.blocks.get(id).map(|b| b.clone()))
            .collect())
    }

    async fn get_block_version(
        &self,
        block_id: &BlockId,
        ver: BlockVer,
    ) -> StorageResult<Option<BlockVersion>> {
        Ok(self
            .versions
            .get(block_id)
            .and_then(|history| history.get(&ver).cloned()))
    }

    async fn upsert_block_version(&self, version: &BlockVersion) -> StorageResult<()> {
        self.versions
            .entry(version.block_id.clone())
            .or_default()
            .insert(version.ver, version.clone());
        Ok(())
    }

    async fn list_block_versions(&self, block_id: &BlockId) -> StorageResult<Vec<BlockVersion>> {
        Ok(self
            .versions
            .get(block_id)
            .map(|history| history.values().cloned().collect())
            .unwrap_or_default())
    }

    async fn get_revision(
        &self,
        doc_id: &DocId,
        doc_ver: DocVer,
    ) -> StorageResult<Option<DocRevision>> {
        Ok(self
            .revisions
            .get(doc_id)
            .and_then(|log| log.get(&doc_ver).cloned()))
    }

    async fn upsert_revision(&self, revision: &DocRevision) -> StorageResult<()> {
        self.revisions
            .entry(revision.doc_id.clone())
            .or_default()
            .insert(revision.doc_ver, revision.clone());
        Ok(())
    }

    async fn list_revisions(
        &self,
        doc_id: &DocId,
        limit: Option<usize>,
    ) -> StorageResult<Vec<DocRevision>> {
        let Some(log) = self.revisions.get(doc_id) else {
            return Ok(Vec::new());
        };
        let newest_first = log.values().rev().cloned();
        Ok(match limit {
            Some(limit) => newest_first.take(limit).collect(),
            None => newest_first.collect(),
        })
    }

    async fn list_revisions_range(
        &self,
        doc_id: &DocId,
        after: DocVer,
        through: DocVer,
    ) -> StorageResult<Vec<DocRevision>> {
        if through <= after {
            return Ok(Vec::new());
        }
        Ok(self
            .revisions
            .get(doc_id)
            .map(|log| log.range(after + 1..=through).map(|(_, r)| r.clone()).collect())
            .unwrap_or_default())
    }

    async fn upsert_snapshot(&self, snapshot: &DocSnapshot) -> StorageResult<()> {
        self.snapshots
            .entry(snapshot.doc_id.clone())
            .or_default()
            .insert(snapshot.doc_ver, snapshot.clone());
        Ok(())
    }

    async fn list_snapshots(&self, doc_id: &DocId) -> StorageResult<Vec<DocSnapshot>> {
        Ok(self
            .snapshots
            .get(doc_id)
            .map(|snaps| snaps.values().rev().cloned().collect())
            .unwrap_or_default())
    }

    async fn nearest_snapshot(
        &self,
        doc_id: &DocId,
        at: DocVer,
    ) -> StorageResult<Option<DocSnapshot>> {
        Ok(self
            .snapshots
            .get(doc_id)
            .and_then(|snaps| snaps.range(..=at).next_back().map(|(_, s)| s.clone())))
    }
}
