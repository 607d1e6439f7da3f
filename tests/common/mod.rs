//! Shared helpers for engine integration tests
#![allow(dead_code)]

use async_trait::async_trait;
use blockdoc::core::config::EngineConfig;
use blockdoc::core::error::{StorageError, StorageResult};
use blockdoc::core::SequentialIdGenerator;
use blockdoc::storage::{MemStore, Persistence};
use blockdoc::types::{
    BlockId, BlockIdentity, BlockOutcome, BlockVer, BlockVersion, CreateBlock, CreateDocument,
    DocId, DocRevision, DocSnapshot, DocVer, Document,
};
use blockdoc::DocumentEngine;
use serde_json::json;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Engine over `store` with deterministic block ids
pub fn engine_on(store: Arc<dyn Persistence>, snapshot_interval: u64) -> DocumentEngine {
    let config = EngineConfig {
        snapshot_interval,
        ..Default::default()
    };
    DocumentEngine::new(store, config).with_id_generator(Arc::new(SequentialIdGenerator::new("blk")))
}

/// In-memory engine with snapshots disabled
pub fn mem_engine() -> DocumentEngine {
    engine_on(Arc::new(MemStore::new()), 0)
}

/// Create document `id` titled `T`
pub async fn new_doc(engine: &DocumentEngine, id: &str) -> Document {
    engine
        .create_document(CreateDocument {
            doc_id: Some(DocId::from(id)),
            title: "T".into(),
            ..Default::default()
        })
        .await
        .unwrap()
}

/// Append a committed paragraph under the root
pub async fn paragraph(engine: &DocumentEngine, doc_id: &DocId, text: &str) -> BlockOutcome {
    engine
        .create_block(CreateBlock::new(
            doc_id.clone(),
            "paragraph",
            json!({ "text": text }),
        ))
        .await
        .unwrap()
}

/// Memory store whose writes or reads can be switched to fail
#[derive(Default)]
pub struct FlakyStore {
    inner: MemStore,
    /// Fail `upsert_revision`
    pub fail_revisions: AtomicBool,
    /// Fail `get_document`
    pub fail_document_reads: AtomicBool,
    /// Fail `upsert_snapshot`
    pub fail_snapshots: AtomicBool,
}

impl FlakyStore {
    pub fn set_fail_revisions(&self, fail: bool) {
        self.fail_revisions.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_document_reads(&self, fail: bool) {
        self.fail_document_reads.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_snapshots(&self, fail: bool) {
        self.fail_snapshots.store(fail, Ordering::SeqCst);
    }
}

fn injected(what: &str) -> StorageError {
    StorageError::Backend(format!("injected {} failure", what))
}

#[async_trait]
impl Persistence for FlakyStore {
    async fn get_document(&self, id: &DocId) -> StorageResult<Option<Document>> {
        if self.fail_document_reads.load(Ordering::SeqCst) {
            return Err(injected("document read"));
        }
        self.inner.get_document(id).await
    }

    async fn upsert_document(&self, doc: &Document) -> StorageResult<()> {
        self.inner.upsert_document(doc).await
    }

    async fn get_block(&self, id: &BlockId) -> StorageResult<Option<BlockIdentity>> {
        self.inner.get_block(id).await
    }

    async fn upsert_block(&self, block: &BlockIdentity) -> StorageResult<()> {
        self.inner.upsert_block(block).await
    }

    async fn list_blocks(&self, doc_id: &DocId) -> StorageResult<Vec<BlockIdentity>> {
        self.inner.list_blocks(doc_id).await
    }

    async fn get_block_version(
        &self,
        block_id: &BlockId,
        ver: BlockVer,
    ) -> StorageResult<Option<BlockVersion>> {
        self.inner.get_block_version(block_id, ver).await
    }

    async fn upsert_block_version(&self, version: &BlockVersion) -> StorageResult<()> {
        self.inner.upsert_block_version(version).await
    }

    async fn list_block_versions(&self, block_id: &BlockId) -> StorageResult<Vec<BlockVersion>> {
        self.inner.list_block_versions(block_id).await
    }

    async fn get_revision(
        &self,
        doc_id: &DocId,
        doc_ver: DocVer,
    ) -> StorageResult<Option<DocRevision>> {
        self.inner.get_revision(doc_id, doc_ver).await
    }

    async fn upsert_revision(&self, revision: &DocRevision) -> StorageResult<()> {
        if self.fail_revisions.load(Ordering::SeqCst) {
            return Err(injected("revision write"));
        }
        self.inner.upsert_revision(revision).await
    }

    async fn list_revisions(
        &self,
        doc_id: &DocId,
        limit: Option<usize>,
    ) -> StorageResult<Vec<DocRevision>> {
        self.inner.list_revisions(doc_id, limit).await
    }

    async fn upsert_snapshot(&self, snapshot: &DocSnapshot) -> StorageResult<()> {
        if self.fail_snapshots.load(Ordering::SeqCst) {
            return Err(injected("snapshot write"));
        }
        self.inner.upsert_snapshot(snapshot).await
    }

    async fn list_snapshots(&self, doc_id: &DocId) -> StorageResult<Vec<DocSnapshot>> {
        self.inner.list_snapshots(doc_id).await
    }

    async fn nearest_snapshot(
        &self,
        doc_id: &DocId,
        at: DocVer,
    ) -> StorageResult<Option<DocSnapshot>> {
        self.inner.nearest_snapshot(doc_id, at).await
    }
}
