use crate::error::StoreError;
use crate::models::{ChunkMetadata, ChunkPoint, ScoredChunk, SourcePreview};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedRwLockReadGuard, OwnedRwLockWriteGuard, RwLock};

/// Per-document read/write critical section shared by the ingest and
/// retrieval paths.
///
/// A replace is delete-then-upsert, two separate index calls. The writer
/// holds the exclusive guard across both, and document-scoped reads take a
/// shared guard, so a search can never land in the window where a document
/// that has a stored generation shows zero chunks.
#[derive(Debug, Clone, Default)]
pub struct DocLocks {
    inner: Arc<Mutex<HashMap<String, Arc<RwLock<()>>>>>,
}

impl DocLocks {
    async fn entry(&self, doc_id: &str) -> Arc<RwLock<()>> {
        let mut locks = self.inner.lock().await;
        locks
            .entry(doc_id.to_string())
            .or_insert_with(|| Arc::new(RwLock::new(())))
            .clone()
    }

    /// Exclusive guard for one document's replace critical section.
    pub async fn write(&self, doc_id: &str) -> OwnedRwLockWriteGuard<()> {
        self.entry(doc_id).await.write_owned().await
    }

    /// Shared guard for document-scoped reads.
    pub async fn read(&self, doc_id: &str) -> OwnedRwLockReadGuard<()> {
        self.entry(doc_id).await.read_owned().await
    }
}

/// Durable embedding store keyed by chunk id.
///
/// The ingestor is the only writer. A delete-then-upsert replace for one
/// `doc_id` is guarded by a per-document critical section upstream, so
/// implementations only need per-call consistency.
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Creates the backing collection when missing. Idempotent.
    async fn ensure_ready(&self) -> Result<(), StoreError>;

    /// Inserts chunks, replacing any entries sharing the same chunk id.
    async fn upsert(&self, points: &[ChunkPoint]) -> Result<(), StoreError>;

    /// Removes every chunk belonging to `doc_id`.
    async fn delete_by_doc(&self, doc_id: &str) -> Result<(), StoreError>;

    /// Removes all stored chunks.
    async fn delete_all(&self) -> Result<(), StoreError>;

    /// Cosine-similarity search, optionally restricted to one document.
    /// Results come back highest score first.
    async fn similarity_search(
        &self,
        query_embedding: &[f32],
        k: usize,
        doc_id: Option<&str>,
    ) -> Result<Vec<ScoredChunk>, StoreError>;

    /// Metadata of every stored chunk, for status reporting and the
    /// unchanged-reupload check.
    async fn fetch_all_metadata(&self) -> Result<Vec<ChunkMetadata>, StoreError>;
}

/// Optional chat-history collaborator. Failures here must never abort an
/// answer that has already been computed; callers log and move on.
#[async_trait]
pub trait SessionSink: Send + Sync {
    async fn save_message(
        &self,
        session_id: &str,
        role: &str,
        content: &str,
        provider: &str,
        sources: &[SourcePreview],
    ) -> Result<(), StoreError>;
}

/// Default sink when no history store is wired in.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSessionSink;

#[async_trait]
impl SessionSink for NullSessionSink {
    async fn save_message(
        &self,
        _session_id: &str,
        _role: &str,
        _content: &str,
        _provider: &str,
        _sources: &[SourcePreview],
    ) -> Result<(), StoreError> {
        Ok(())
    }
}
