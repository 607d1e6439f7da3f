//! Document engine
//!
//! The engine owns document and block lifecycles on top of a
//! [`Persistence`] backend. Every block edit writes a new immutable
//! [`BlockVersion`]; commits append a [`DocRevision`] and advance the
//! document head by one. State at any version is rebuilt by replaying
//! revisions over the nearest snapshot.
//!
//! Mutating operations hold the document's entry in [`DocLocks`] for their
//! whole read-modify-write sequence. Edits made with `create_version: false`
//! are parked in the injected [`PendingPatchBuffer`] until
//! [`DocumentEngine::commit_pending`]; that buffer is not durable.

mod blocks;
mod history;
mod tree;

use chrono::Utc;
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::constants::{INIT_COMMIT_MESSAGE, ROOT_BLOCK_TYPE};
use crate::core::config::EngineConfig;
use crate::core::error::{Error, Result};
use crate::core::hashing::{Blake3Hasher, ContentHasher};
use crate::core::id_gen::{IdGenerator, UuidIdGenerator};
use crate::core::locks::DocLocks;
use crate::core::payload::{extract_plain_text, extract_refs};
use crate::core::pending::{PendingBatch, PendingEntry, PendingPatchBuffer};
use crate::core::sort_key::first_key;
use crate::storage::Persistence;
use crate::system::metrics;
use crate::types::{
    ActorId, BlockId, BlockIdentity, BlockOp, BlockVer, BlockVersion, Branch, CommitOptions,
    CreateDocument, DocId, DocRevision, DocStatus, DocVer, Document, DocumentPatch, OpSummary,
    Patch, PendingStatus, Visibility,
};

/// Versioned block-document engine
pub struct DocumentEngine {
    store: Arc<dyn Persistence>,
    ids: Arc<dyn IdGenerator>,
    hasher: Arc<dyn ContentHasher>,
    pending: Arc<PendingPatchBuffer>,
    locks: Arc<DocLocks>,
    config: EngineConfig,
}

impl DocumentEngine {
    /// Create an engine over `store` with UUID ids, BLAKE3 hashes and
    /// private pending buffer and lock table
    pub fn new(store: Arc<dyn Persistence>, config: EngineConfig) -> Self {
        Self {
            store,
            ids: Arc::new(UuidIdGenerator),
            hasher: Arc::new(Blake3Hasher),
            pending: Arc::new(PendingPatchBuffer::new()),
            locks: Arc::new(DocLocks::new()),
            config,
        }
    }

    /// Replace the identifier source
    pub fn with_id_generator(mut self, ids: Arc<dyn IdGenerator>) -> Self {
        self.ids = ids;
        self
    }

    /// Replace the content hasher
    pub fn with_hasher(mut self, hasher: Arc<dyn ContentHasher>) -> Self {
        self.hasher = hasher;
        self
    }

    /// Share a pending buffer with other engine instances
    pub fn with_pending_buffer(mut self, pending: Arc<PendingPatchBuffer>) -> Self {
        self.pending = pending;
        self
    }

    /// Share a lock table with other engine instances
    pub fn with_locks(mut self, locks: Arc<DocLocks>) -> Self {
        self.locks = locks;
        self
    }

    /// Engine settings
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Backing store
    pub fn store(&self) -> &Arc<dyn Persistence> {
        &self.store
    }

    // ---- documents ----

    /// Create a document with a root block and its `init` revision (head 1).
    ///
    /// Fails with `AlreadyExists` when `input.doc_id` is taken.
    pub async fn create_document(&self, input: CreateDocument) -> Result<Document> {
        let doc_id = input
            .doc_id
            .unwrap_or_else(|| DocId::new(self.ids.next_id()));
        let _guard = self.locks.acquire(&doc_id).await;

        if self.store.get_document(&doc_id).await?.is_some() {
            return Err(Error::already_exists(format!("document {}", doc_id)));
        }

        let now = Utc::now();
        let actor = input.actor;
        let root_id = BlockId::new(self.ids.next_id());
        let mut doc = Document {
            id: doc_id.clone(),
            title: input.title,
            workspace_id: input.workspace_id,
            head: 0,
            published_head: 0,
            root_block_id: root_id.clone(),
            status: DocStatus::Active,
            visibility: Visibility::Private,
            created_at: now,
            created_by: actor.clone(),
            updated_at: now,
            updated_by: actor.clone(),
        };
        self.store.upsert_document(&doc).await?;

        let root = BlockIdentity {
            id: root_id.clone(),
            doc_id: doc_id.clone(),
            block_type: ROOT_BLOCK_TYPE.to_string(),
            created_at: now,
            created_by: actor.clone(),
            latest_ver: 1,
            latest_at: now,
            latest_by: actor.clone(),
            is_deleted: false,
            deleted_at: None,
            deleted_by: None,
        };
        let root_version = self.new_version(
            &root,
            1,
            root_id.clone(),
            first_key(),
            0,
            false,
            json!({}),
            actor.as_ref(),
        );
        self.store.upsert_block(&root).await?;
        self.store.upsert_block_version(&root_version).await?;

        let patch = Patch {
            block_id: root_id,
            from: 0,
            to: 1,
        };
        let options = CommitOptions {
            message: INIT_COMMIT_MESSAGE.to_string(),
            actor,
            branch: None,
        };
        self.commit_locked(&mut doc, vec![patch], OpSummary::of(BlockOp::Init), &options)
            .await?;

        info!(doc_id = %doc.id, root = %doc.root_block_id, "Document created");
        Ok(doc)
    }

    /// Fetch a document, `NotFound` when absent
    pub async fn get_document(&self, doc_id: &DocId) -> Result<Document> {
        self.load_document(doc_id).await
    }

    /// Apply title/status/visibility changes
    pub async fn update_document_meta(
        &self,
        doc_id: &DocId,
        patch: DocumentPatch,
        actor: Option<ActorId>,
    ) -> Result<Document> {
        let _guard = self.locks.acquire(doc_id).await;
        let mut doc = self.load_document(doc_id).await?;

        if let Some(title) = patch.title {
            doc.title = title;
        }
        if let Some(status) = patch.status {
            doc.status = status;
        }
        if let Some(visibility) = patch.visibility {
            doc.visibility = visibility;
        }
        doc.touch(actor.as_deref());
        self.store.upsert_document(&doc).await?;

        debug!(doc_id = %doc_id, "Document metadata updated");
        Ok(doc)
    }

    /// Expose `ver` (default: head) to readers.
    ///
    /// Versions above head are an `InvariantViolation`; version 0 is
    /// `InvalidInput`.
    pub async fn publish(
        &self,
        doc_id: &DocId,
        ver: Option<DocVer>,
        actor: Option<ActorId>,
    ) -> Result<Document> {
        let _guard = self.locks.acquire(doc_id).await;
        let mut doc = self.load_document(doc_id).await?;

        let ver = ver.unwrap_or(doc.head);
        if ver == 0 {
            return Err(Error::invalid_input("cannot publish version 0"));
        }
        if ver > doc.head {
            return Err(Error::invariant(format!(
                "published head {} would exceed head {} of document {}",
                ver, doc.head, doc_id
            )));
        }

        doc.published_head = ver;
        doc.touch(actor.as_deref());
        self.store.upsert_document(&doc).await?;

        info!(doc_id = %doc_id, published_head = ver, "Document published");
        Ok(doc)
    }

    // ---- pending buffer ----

    /// Number of blocks with uncommitted changes in `doc_id`
    pub fn get_pending_versions(&self, doc_id: &DocId) -> PendingStatus {
        self.pending.status(doc_id)
    }

    /// Commit the document's buffered patches as one revision.
    ///
    /// Returns `None` when nothing is buffered. If the commit fails the
    /// batch goes back into the buffer.
    pub async fn commit_pending(
        &self,
        doc_id: &DocId,
        options: CommitOptions,
    ) -> Result<Option<DocRevision>> {
        let _guard = self.locks.acquire(doc_id).await;
        let mut doc = self.load_document(doc_id).await?;

        let Some(batch) = self.pending.take(doc_id) else {
            return Ok(None);
        };

        let mut summary = OpSummary::default();
        let patches = batch
            .iter()
            .map(|(block_id, entry)| {
                summary.merge(&entry.ops);
                Patch {
                    block_id: block_id.clone(),
                    from: entry.span.from,
                    to: entry.span.to,
                }
            })
            .collect();

        match self.commit_locked(&mut doc, patches, summary, &options).await {
            Ok(revision) => Ok(Some(revision)),
            Err(e) => {
                warn!(doc_id = %doc_id, error = %e, "Commit failed, restoring pending batch");
                self.pending.restore(doc_id, batch);
                Err(e)
            }
        }
    }

    /// Drop the document's buffered patches; returns how many were dropped.
    ///
    /// Each touched block is rolled back to its committed version: the
    /// identity's latest pointers return to the pre-batch version, a
    /// buffered delete is undone, and a block created inside the batch is
    /// marked deleted so later edits cannot bring it back.
    pub async fn discard_pending(&self, doc_id: &DocId) -> Result<usize> {
        let _guard = self.locks.acquire(doc_id).await;
        let Some(mut batch) = self.pending.take(doc_id) else {
            return Ok(0);
        };
        let dropped = batch.len();

        while let Some((block_id, entry)) = batch.pop_first() {
            if let Err(e) = self.revert_block(&block_id, &entry).await {
                batch.insert(block_id, entry);
                self.pending.restore(doc_id, batch);
                return Err(e);
            }
        }

        debug!(doc_id = %doc_id, dropped, "Pending patches discarded");
        Ok(dropped)
    }

    /// Documents with uncommitted changes, to flush before shutdown
    pub fn pending_documents(&self) -> Vec<DocId> {
        self.pending.pending_documents()
    }

    // ---- internals ----

    async fn load_document(&self, doc_id: &DocId) -> Result<Document> {
        self.store
            .get_document(doc_id)
            .await?
            .ok_or_else(|| Error::not_found(format!("document {}", doc_id)))
    }

    /// Block identity that must belong to `doc_id`
    async fn load_block(&self, doc_id: &DocId, block_id: &BlockId) -> Result<BlockIdentity> {
        let block = self
            .store
            .get_block(block_id)
            .await?
            .ok_or_else(|| Error::not_found(format!("block {}", block_id)))?;
        if &block.doc_id != doc_id {
            return Err(Error::invariant(format!(
                "block {} belongs to document {}, not {}",
                block_id, block.doc_id, doc_id
            )));
        }
        Ok(block)
    }

    async fn load_version(&self, block_id: &BlockId, ver: BlockVer) -> Result<BlockVersion> {
        self.store
            .get_block_version(block_id, ver)
            .await?
            .ok_or_else(|| Error::not_found(format!("block {} version {}", block_id, ver)))
    }

    #[allow(clippy::too_many_arguments)]
    fn new_version(
        &self,
        block: &BlockIdentity,
        ver: BlockVer,
        parent_id: BlockId,
        sort_key: String,
        indent: u32,
        collapsed: bool,
        payload: serde_json::Value,
        actor: Option<&ActorId>,
    ) -> BlockVersion {
        BlockVersion {
            block_id: block.id.clone(),
            ver,
            parent_id,
            sort_key,
            indent,
            collapsed,
            hash: self.hasher.hash_content(&block.block_type, &payload),
            plain_text: extract_plain_text(&payload),
            refs: extract_refs(&payload),
            payload,
            created_at: Utc::now(),
            created_by: actor.cloned(),
        }
    }

    /// Point a block's identity back at the version it had before a
    /// discarded batch
    async fn revert_block(&self, block_id: &BlockId, entry: &PendingEntry) -> Result<()> {
        let Some(mut block) = self.store.get_block(block_id).await? else {
            return Ok(());
        };

        if entry.ops.deleted > 0 {
            block.is_deleted = false;
            block.deleted_at = None;
            block.deleted_by = None;
        }
        if entry.span.from == 0 {
            block.is_deleted = true;
            block.deleted_at = Some(Utc::now());
            block.deleted_by = None;
        } else {
            let committed = self.load_version(block_id, entry.span.from).await?;
            block.latest_ver = committed.ver;
            block.latest_at = committed.created_at;
            block.latest_by = committed.created_by;
        }
        self.store.upsert_block(&block).await?;

        debug!(block_id = %block_id, ver = block.latest_ver, "Block reverted to committed version");
        Ok(())
    }

    /// Commit one block change immediately or park it in the pending buffer.
    ///
    /// An immediate commit absorbs the block's buffered entry, so a later
    /// flush cannot roll the block back to an older version.
    #[allow(clippy::too_many_arguments)]
    async fn record_change(
        &self,
        doc: &mut Document,
        block_id: &BlockId,
        from: BlockVer,
        to: BlockVer,
        op: BlockOp,
        create_version: bool,
        actor: Option<ActorId>,
    ) -> Result<Option<DocRevision>> {
        if !create_version {
            self.pending.record(&doc.id, block_id, from, to, op);
            debug!(doc_id = %doc.id, block_id = %block_id, from, to, op = op.as_str(), "Patch buffered");
            return Ok(None);
        }

        let absorbed = self.pending.take_block(&doc.id, block_id);
        let mut summary = OpSummary::of(op);
        let from = match &absorbed {
            Some(entry) => {
                summary.merge(&entry.ops);
                entry.span.from
            }
            None => from,
        };

        let patch = Patch {
            block_id: block_id.clone(),
            from,
            to,
        };
        let options = CommitOptions {
            message: format!("{} block {}", op.as_str(), block_id),
            actor,
            branch: Some(Branch::Draft),
        };
        match self.commit_locked(doc, vec![patch], summary, &options).await {
            Ok(revision) => Ok(Some(revision)),
            Err(e) => {
                if let Some(entry) = absorbed {
                    self.pending
                        .restore(&doc.id, PendingBatch::from([(block_id.clone(), entry)]));
                }
                Err(e)
            }
        }
    }

    /// Append a revision at `head + 1`, advance head and take a snapshot
    /// when the new head lands on the interval. Caller holds the lock.
    ///
    /// Errors only when the revision or document write fails. A failed
    /// automatic snapshot is logged and the commit still succeeds.
    async fn commit_locked(
        &self,
        doc: &mut Document,
        patches: Vec<Patch>,
        op_summary: OpSummary,
        options: &CommitOptions,
    ) -> Result<DocRevision> {
        let doc_ver = doc.head + 1;
        let revision = DocRevision {
            doc_id: doc.id.clone(),
            doc_ver,
            patches,
            message: options.message.clone(),
            branch: options.branch,
            op_summary,
            created_at: Utc::now(),
            created_by: options.actor.clone(),
        };
        self.store.upsert_revision(&revision).await?;

        doc.head = doc_ver;
        doc.touch(options.actor.as_deref());
        self.store.upsert_document(doc).await?;

        metrics::record(|m| m.history.revisions_committed.inc());
        info!(
            doc_id = %doc.id,
            doc_ver,
            patches = revision.patches.len(),
            message = %revision.message,
            "Revision committed"
        );

        // Revision and head are durable here
        let interval = self.config.snapshot_interval;
        if interval > 0 && doc_ver % interval == 0 {
            if let Err(e) = self.snapshot_at(doc, doc_ver).await {
                warn!(doc_id = %doc.id, doc_ver, error = %e, "Automatic snapshot failed");
            }
        }
        Ok(revision)
    }
}
