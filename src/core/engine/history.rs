//! State resolution, rendering, history listings, diffs and snapshots.

use chrono::Utc;
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, info};

use super::tree::{build_tree, TreeInput};
use super::DocumentEngine;
use crate::core::error::{Error, Result};
use crate::delta::{self, BlockVersionDiff, DocVersionDiff};
use crate::system::metrics;
use crate::types::{
    BlockId, BlockIdentity, BlockVer, BlockVersion, BlockVersionMap, DocId, DocRevision,
    DocSnapshot, DocStateResolved, DocVer, Document, RenderOptions, RenderedNode,
};

impl DocumentEngine {
    /// Resolve the block-version map of `doc_id` at `target` (default: head).
    ///
    /// The target is clamped to `[1, head]`. The result depends only on the
    /// nearest snapshot at or before the target and the revisions after it.
    pub async fn get_doc_state(
        &self,
        doc_id: &DocId,
        target: Option<DocVer>,
    ) -> Result<DocStateResolved> {
        let doc = self.load_document(doc_id).await?;
        self.resolve(&doc, target).await
    }

    /// Render the block tree at `doc_ver` (default: head) with the
    /// configured deleted-block policy
    pub async fn get_rendered_tree(
        &self,
        doc_id: &DocId,
        doc_ver: Option<DocVer>,
    ) -> Result<RenderedNode> {
        let options = RenderOptions {
            include_deleted: self.config.include_deleted_in_render,
        };
        self.get_rendered_tree_with(doc_id, doc_ver, options).await
    }

    /// Render the block tree at `doc_ver` (default: head)
    pub async fn get_rendered_tree_with(
        &self,
        doc_id: &DocId,
        doc_ver: Option<DocVer>,
        options: RenderOptions,
    ) -> Result<RenderedNode> {
        let doc = self.load_document(doc_id).await?;
        let state = self.resolve(&doc, doc_ver).await?;

        let mut versions = HashMap::with_capacity(state.block_version_map.len());
        let mut missing = BTreeMap::new();
        for (block_id, &ver) in &state.block_version_map {
            match self.store.get_block_version(block_id, ver).await? {
                Some(version) => {
                    versions.insert(block_id.clone(), version);
                }
                None => {
                    missing.insert(block_id.clone(), ver);
                }
            }
        }

        let identities: HashMap<BlockId, BlockIdentity> = self
            .store
            .list_blocks(doc_id)
            .await?
            .into_iter()
            .map(|block| (block.id.clone(), block))
            .collect();

        let input = TreeInput {
            root_id: doc.root_block_id.clone(),
            versions,
            missing,
            identities,
            include_deleted: options.include_deleted,
        };
        let tree = build_tree(&input);
        debug!(doc_id = %doc_id, doc_ver = state.doc_ver, nodes = tree.node_count(), "Tree rendered");
        Ok(tree)
    }

    /// Revisions of a document, newest first. `limit` defaults to the
    /// configured revision list limit.
    pub async fn list_doc_revisions(
        &self,
        doc_id: &DocId,
        limit: Option<usize>,
    ) -> Result<Vec<DocRevision>> {
        self.load_document(doc_id).await?;
        let limit = limit.unwrap_or(self.config.revision_list_limit);
        Ok(self.store.list_revisions(doc_id, Some(limit)).await?)
    }

    /// Versions of a block up to its latest, oldest first (deleted blocks
    /// included). Versions left behind by a discarded batch are skipped.
    pub async fn list_block_versions(&self, block_id: &BlockId) -> Result<Vec<BlockVersion>> {
        let block = self.get_block(block_id).await?;
        let mut versions = self.store.list_block_versions(block_id).await?;
        versions.retain(|v| v.ver <= block.latest_ver);
        Ok(versions)
    }

    /// Block identity, `NotFound` when absent
    pub async fn get_block(&self, block_id: &BlockId) -> Result<BlockIdentity> {
        self.store
            .get_block(block_id)
            .await?
            .ok_or_else(|| Error::not_found(format!("block {}", block_id)))
    }

    /// One version of a block, `NotFound` when absent
    pub async fn get_block_version(&self, block_id: &BlockId, ver: BlockVer) -> Result<BlockVersion> {
        self.load_version(block_id, ver).await
    }

    /// Compare two versions of one block
    pub async fn diff_block_versions(
        &self,
        block_id: &BlockId,
        from: BlockVer,
        to: BlockVer,
    ) -> Result<BlockVersionDiff> {
        let older = self.load_version(block_id, from).await?;
        let newer = self.load_version(block_id, to).await?;
        delta::diff_block_versions(&older, &newer)
    }

    /// Blocks whose resolved version differs between two document versions
    pub async fn diff_doc_versions(
        &self,
        doc_id: &DocId,
        from: DocVer,
        to: DocVer,
    ) -> Result<DocVersionDiff> {
        let doc = self.load_document(doc_id).await?;
        let left = self.resolve(&doc, Some(from)).await?;
        let right = self.resolve(&doc, Some(to)).await?;
        Ok(DocVersionDiff::between(&left, &right))
    }

    /// Persist a snapshot of the state at `doc_ver` (default: head)
    pub async fn create_snapshot(
        &self,
        doc_id: &DocId,
        doc_ver: Option<DocVer>,
    ) -> Result<DocSnapshot> {
        let _guard = self.locks.acquire(doc_id).await;
        let doc = self.load_document(doc_id).await?;
        let target = clamp_version(&doc, doc_ver);
        self.snapshot_at(&doc, target).await
    }

    /// Snapshots of a document, newest first
    pub async fn list_snapshots(&self, doc_id: &DocId) -> Result<Vec<DocSnapshot>> {
        self.load_document(doc_id).await?;
        Ok(self.store.list_snapshots(doc_id).await?)
    }

    pub(super) async fn snapshot_at(&self, doc: &Document, doc_ver: DocVer) -> Result<DocSnapshot> {
        let state = self.resolve(doc, Some(doc_ver)).await?;
        let snapshot = DocSnapshot {
            doc_id: doc.id.clone(),
            doc_ver: state.doc_ver,
            block_version_map: state.block_version_map,
            created_at: Utc::now(),
        };
        self.store.upsert_snapshot(&snapshot).await?;

        metrics::record(|m| m.history.snapshots_created.inc());
        info!(
            doc_id = %doc.id,
            doc_ver = snapshot.doc_ver,
            blocks = snapshot.block_version_map.len(),
            "Snapshot created"
        );
        Ok(snapshot)
    }

    /// Replay revisions over the nearest snapshot at or before the target
    pub(super) async fn resolve(
        &self,
        doc: &Document,
        target: Option<DocVer>,
    ) -> Result<DocStateResolved> {
        let target = clamp_version(doc, target);
        let (base, mut map) = match self.store.nearest_snapshot(&doc.id, target).await? {
            Some(snapshot) => (snapshot.doc_ver, snapshot.block_version_map),
            None => (0, BlockVersionMap::new()),
        };

        let revisions = self
            .store
            .list_revisions_range(&doc.id, base, target)
            .await?;
        for revision in &revisions {
            for patch in &revision.patches {
                map.insert(patch.block_id.clone(), patch.to);
            }
        }
        map.entry(doc.root_block_id.clone()).or_insert(1);

        metrics::record(|m| m.history.replay_length.observe(revisions.len() as f64));
        debug!(
            doc_id = %doc.id,
            target,
            snapshot = base,
            replayed = revisions.len(),
            "State resolved"
        );

        Ok(DocStateResolved {
            doc_id: doc.id.clone(),
            doc_ver: target,
            block_version_map: map,
        })
    }
}

fn clamp_version(doc: &Document, target: Option<DocVer>) -> DocVer {
    target.unwrap_or(doc.head).min(doc.head).max(1)
}
