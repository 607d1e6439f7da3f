//! File-backed persistence: one JSON file per entity.
//!
//! Layout under the data directory (see [`file_key`] for how ids become file
//! names, versions are zero-padded so names sort numerically):
//!
//! ```text
//! documents/<doc>.json
//! blocks/<block>.json
//! doc_blocks/<doc>/<block>            (marker holding the raw block id)
//! versions/<block>/<ver>.json
//! revisions/<doc>/<ver>.json
//! snapshots/<doc>/<ver>.json
//! ```
//!
//! Every write goes to a temporary file first and is renamed into place, so a
//! reader never sees a half-written entity.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;

use crate::core::error::{StorageError, StorageResult};
use crate::storage::Persistence;
use crate::types::{
    BlockId, BlockIdentity, BlockVer, BlockVersion, DocId, DocRevision, DocSnapshot, DocVer,
    Document,
};

/// JSON file store rooted at a data directory
#[derive(Debug, Clone)]
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    /// Open (or lazily create) a store under `root`
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Data directory of this store
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn entity_path(&self, kind: &str, id: &str) -> PathBuf {
        self.root.join(kind).join(format!("{}.json", file_key(id)))
    }

    fn history_dir(&self, kind: &str, id: &str) -> PathBuf {
        self.root.join(kind).join(file_key(id))
    }

    fn history_path(&self, kind: &str, id: &str, ver: u64) -> PathBuf {
        self.history_dir(kind, id).join(format!("{:020}.json", ver))
    }

    /// Versions present in a history directory, ascending
    async fn history_versions(&self, dir: &Path) -> StorageResult<Vec<u64>> {
        let mut entries = match fs::read_dir(dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        let mut versions = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name();
            let name = name.to_string_lossy();
            let Some(stem) = name.strip_suffix(".json") else {
                continue;
            };
            let ver = stem
                .parse::<u64>()
                .map_err(|_| StorageError::Corruption(format!("unexpected file {}", name)))?;
            versions.push(ver);
        }
        versions.sort_unstable();
        Ok(versions)
    }

    async fn read_history<T: DeserializeOwned>(
        &self,
        kind: &str,
        id: &str,
        versions: impl Iterator<Item = u64>,
    ) -> StorageResult<Vec<T>> {
        let mut items = Vec::new();
        for ver in versions {
            if let Some(item) = read_json(&self.history_path(kind, id, ver)).await? {
                items.push(item);
            }
        }
        Ok(items)
    }
}

/// Longest hex name used as is; with `.json.tmp` it stays under the usual
/// 255-byte file name limit
const MAX_HEX_NAME: usize = 200;

/// File name for an id: hex of the id, or `h` + BLAKE3 hex when the hex form
/// would be too long. The `h` prefix cannot clash with a hex name.
fn file_key(id: &str) -> String {
    let encoded = hex::encode(id);
    if encoded.len() <= MAX_HEX_NAME {
        encoded
    } else {
        format!("h{}", blake3::hash(id.as_bytes()).to_hex())
    }
}

async fn read_json<T: DeserializeOwned>(path: &Path) -> StorageResult<Option<T>> {
    match fs::read(path).await {
        Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

async fn write_json<T: Serialize>(path: &Path, value: &T) -> StorageResult<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).await?;
    }
    let bytes = serde_json::to_vec_pretty(value)?;
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, bytes).await?;
    fs::rename(&tmp, path).await?;
    Ok(())
}

const DOCUMENTS: &str = "documents";
const BLOCKS: &str = "blocks";
const DOC_BLOCKS: &str = "doc_blocks";
const VERSIONS: &str = "versions";
const REVISIONS: &str = "revisions";
const SNAPSHOTS: &str = "snapshots";

#[async_trait]
impl Persistence for FileStore {
    async fn get_document(&self, id: &DocId) -> StorageResult<Option<Document>> {
        read_json(&self.entity_path(DOCUMENTS, id.as_str())).await
    }

    async fn upsert_document(&self, doc: &Document) -> StorageResult<()> {
        write_json(&self.entity_path(DOCUMENTS, doc.id.as_str()), doc).await
    }

    async fn get_block(&self, id: &BlockId) -> StorageResult<Option<BlockIdentity>> {
        read_json(&self.entity_path(BLOCKS, id.as_str())).await
    }

    async fn upsert_block(&self, block: &BlockIdentity) -> StorageResult<()> {
        write_json(&self.entity_path(BLOCKS, block.id.as_str()), block).await?;
        let marker_dir = self.history_dir(DOC_BLOCKS, block.doc_id.as_str());
        fs::create_dir_all(&marker_dir).await?;
        fs::write(marker_dir.join(file_key(block.id.as_str())), block.id.as_str()).await?;
        Ok(())
    }

    async fn list_blocks(&self, doc_id: &DocId) -> StorageResult<Vec<BlockIdentity>> {
        let dir = self.history_dir(DOC_BLOCKS, doc_id.as_str());
        let mut entries = match fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        let mut ids = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name().to_string_lossy().into_owned();
            let raw = fs::read(entry.path()).await?;
            let id = String::from_utf8(raw)
                .map_err(|_| StorageError::Corruption(format!("bad block marker {}", name)))?;
            ids.push(BlockId::new(id));
        }
        ids.sort();

        let mut blocks = Vec::with_capacity(ids.len());
        for id in &ids {
            match self.get_block(id).await? {
                Some(block) => blocks.push(block),
                None => {
                    return Err(StorageError::Corruption(format!(
                        "block {} indexed for document {} but not stored",
                        id, doc_id
                    )))
                }
            }
        }
        Ok(blocks)
    }

    async fn get_block_version(
        &self,
        block_id: &BlockId,
        ver: BlockVer,
    ) -> StorageResult<Option<BlockVersion>> {
        read_json(&self.history_path(VERSIONS, block_id.as_str(), ver)).await
    }

    async fn upsert_block_version(&self, version: &BlockVersion) -> StorageResult<()> {
        write_json(
            &self.history_path(VERSIONS, version.block_id.as_str(), version.ver),
            version,
        )
        .await
    }

    async fn list_block_versions(&self, block_id: &BlockId) -> StorageResult<Vec<BlockVersion>> {
        let versions = self
            .history_versions(&self.history_dir(VERSIONS, block_id.as_str()))
            .await?;
        self.read_history(VERSIONS, block_id.as_str(), versions.into_iter())
            .await
    }

    async fn get_revision(
        &self,
        doc_id: &DocId,
        doc_ver: DocVer,
    ) -> StorageResult<Option<DocRevision>> {
        read_json(&self.history_path(REVISIONS, doc_id.as_str(), doc_ver)).await
    }

    async fn upsert_revision(&self, revision: &DocRevision) -> StorageResult<()> {
        write_json(
            &self.history_path(REVISIONS, revision.doc_id.as_str(), revision.doc_ver),
            revision,
        )
        .await
    }

    async fn list_revisions(
        &self,
        doc_id: &DocId,
        limit: Option<usize>,
    ) -> StorageResult<Vec<DocRevision>> {
        let versions = self
            .history_versions(&self.history_dir(REVISIONS, doc_id.as_str()))
            .await?;
        let limit = limit.unwrap_or(usize::MAX);
        self.read_history(
            REVISIONS,
            doc_id.as_str(),
            versions.into_iter().rev().take(limit),
        )
        .await
    }

    async fn list_revisions_range(
        &self,
        doc_id: &DocId,
        after: DocVer,
        through: DocVer,
    ) -> StorageResult<Vec<DocRevision>> {
        let versions = self
            .history_versions(&self.history_dir(REVISIONS, doc_id.as_str()))
            .await?;
        self.read_history(
            REVISIONS,
            doc_id.as_str(),
            versions.into_iter().filter(|v| *v > after && *v <= through),
        )
        .await
    }

    async fn upsert_snapshot(&self, snapshot: &DocSnapshot) -> StorageResult<()> {
        write_json(
            &self.history_path(SNAPSHOTS, snapshot.doc_id.as_str(), snapshot.doc_ver),
            snapshot,
        )
        .await
    }

    async fn list_snapshots(&self, doc_id: &DocId) -> StorageResult<Vec<DocSnapshot>> {
        let versions = self
            .history_versions(&self.history_dir(SNAPSHOTS, doc_id.as_str()))
            .await?;
        self.read_history(SNAPSHOTS, doc_id.as_str(), versions.into_iter().rev())
            .await
    }

    async fn nearest_snapshot(
        &self,
        doc_id: &DocId,
        at: DocVer,
    ) -> StorageResult<Option<DocSnapshot>> {
        let versions = self
            .history_versions(&self.history_dir(SNAPSHOTS, doc_id.as_str()))
            .await?;
        match versions.into_iter().rev().find(|v| *v <= at) {
            Some(ver) => read_json(&self.history_path(SNAPSHOTS, doc_id.as_str(), ver)).await,
            None => Ok(None),
        }
    }
}
