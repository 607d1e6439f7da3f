//! Per-document write serialization.
//!
//! Every mutating engine operation reads the current head or latest block
//! version and then writes the next one. Holding the document's lock across
//! that sequence keeps version numbers contiguous when callers race.

use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::types::DocId;

/// Async mutex per document id
///
/// Entries live only while a guard or a waiter holds them.
#[derive(Debug, Default)]
pub struct DocLocks {
    locks: DashMap<DocId, Arc<Mutex<()>>>,
}

/// Exclusive write access to one document, released on drop
#[derive(Debug)]
pub struct DocLockGuard<'a> {
    locks: &'a DocLocks,
    doc_id: DocId,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for DocLockGuard<'_> {
    fn drop(&mut self) {
        drop(self.guard.take());
        self.locks
            .locks
            .remove_if(&self.doc_id, |_, lock| Arc::strong_count(lock) == 1);
    }
}

impl DocLocks {
    /// Create an empty lock table
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive write access to `doc_id`
    pub async fn acquire(&self, doc_id: &DocId) -> DocLockGuard<'_> {
        let lock = self
            .locks
            .entry(doc_id.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        DocLockGuard {
            locks: self,
            doc_id: doc_id.clone(),
            guard: Some(lock.lock_owned().await),
        }
    }

    /// Number of documents currently locked or waited on
    pub fn len(&self) -> usize {
        self.locks.len()
    }

    /// True when no document is locked or waited on
    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}
