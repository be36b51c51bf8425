use crate::chunking::chunk_text;
use crate::embeddings::Embedder;
use crate::error::IngestError;
use crate::models::{ChunkMetadata, ChunkPoint, ChunkingOptions, KEYWORD_TAGS};
use crate::traits::{DocLocks, VectorIndex};
use sha2::{Digest, Sha256};
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Process-lifetime cap on remembered `(doc_id, fingerprint)` pairs. Document
/// counts are small in practice; oldest entries are evicted first.
const CACHE_CAPACITY: usize = 256;

/// Outcome of one ingestion call.
#[derive(Debug, Clone)]
pub struct IngestOutcome {
    pub doc_id: String,
    pub num_chunks: usize,
    /// True when the content fingerprint matched an earlier upload and no
    /// re-embedding happened.
    pub unchanged: bool,
}

/// Remembers successfully ingested content so retried uploads of identical
/// bytes skip the embedding and storage work entirely.
#[derive(Debug, Default)]
struct IngestionCache {
    entries: HashMap<(String, String), usize>,
    order: VecDeque<(String, String)>,
}

impl IngestionCache {
    fn get(&self, doc_id: &str, fingerprint: &str) -> Option<usize> {
        self.entries
            .get(&(doc_id.to_string(), fingerprint.to_string()))
            .copied()
    }

    fn record(&mut self, doc_id: &str, fingerprint: &str, num_chunks: usize) {
        let key = (doc_id.to_string(), fingerprint.to_string());
        if self.entries.insert(key.clone(), num_chunks).is_none() {
            self.order.push_back(key);
        }
        while self.entries.len() > CACHE_CAPACITY {
            match self.order.pop_front() {
                Some(oldest) => {
                    self.entries.remove(&oldest);
                }
                None => break,
            }
        }
    }
}

/// Orchestrates chunking, embedding, and indexing for one uploaded document.
///
/// The only writer to the vector index. Re-uploads of unchanged content are
/// detected by fingerprint and skipped; changed content under the same
/// `doc_id` atomically replaces the previous generation.
pub struct DocumentIngestor {
    index: Arc<dyn VectorIndex>,
    embedder: Arc<dyn Embedder>,
    options: ChunkingOptions,
    cache: Mutex<IngestionCache>,
    locks: DocLocks,
}

impl DocumentIngestor {
    pub fn new(
        index: Arc<dyn VectorIndex>,
        embedder: Arc<dyn Embedder>,
        options: ChunkingOptions,
        locks: DocLocks,
    ) -> Self {
        Self {
            index,
            embedder,
            options,
            cache: Mutex::new(IngestionCache::default()),
            locks,
        }
    }

    /// Stable hash over the concatenation of all text blocks.
    pub fn fingerprint(texts: &[String]) -> String {
        let mut hasher = Sha256::new();
        for text in texts {
            hasher.update(text.as_bytes());
        }
        format!("{:x}", hasher.finalize())
    }

    /// Chunks, embeds, and indexes `texts` under `doc_id`.
    ///
    /// Errors from embedding or storage leave no guarantee of a clean partial
    /// state; callers should treat a failure as "retry the whole document".
    pub async fn ingest(
        &self,
        doc_id: &str,
        texts: &[String],
        source_name: Option<&str>,
    ) -> Result<IngestOutcome, IngestError> {
        if texts.iter().all(|text| text.trim().is_empty()) {
            return Err(IngestError::InvalidArgument(format!(
                "no text to ingest for doc_id {doc_id}"
            )));
        }

        let fingerprint = Self::fingerprint(texts);

        if let Some(num_chunks) = self.cache.lock().await.get(doc_id, &fingerprint) {
            debug!(doc_id, "ingestion cache hit, skipping re-embedding");
            return Ok(IngestOutcome {
                doc_id: doc_id.to_string(),
                num_chunks,
                unchanged: true,
            });
        }

        // Exclusive for the whole delete-then-upsert replace: no second
        // writer for this doc_id, and no doc-scoped reader in the window
        // where the old generation is gone and the new one is not yet there.
        let _guard = self.locks.write(doc_id).await;

        let existing: Vec<ChunkMetadata> = self
            .index
            .fetch_all_metadata()
            .await?
            .into_iter()
            .filter(|metadata| metadata.doc_id == doc_id)
            .collect();

        if !existing.is_empty() {
            let stored_fingerprint = &existing[0].content_fingerprint;
            if *stored_fingerprint == fingerprint {
                info!(doc_id, "document unchanged, skipping re-index");
                let num_chunks = existing.len();
                self.cache
                    .lock()
                    .await
                    .record(doc_id, &fingerprint, num_chunks);
                return Ok(IngestOutcome {
                    doc_id: doc_id.to_string(),
                    num_chunks,
                    unchanged: true,
                });
            }

            warn!(
                doc_id,
                stale_chunks = existing.len(),
                "content changed under existing doc_id, removing previous generation"
            );
            self.index.delete_by_doc(doc_id).await?;
        }

        let mut points = Vec::new();
        for (text_index, text) in texts.iter().enumerate() {
            for (chunk_index, chunk) in chunk_text(text, self.options).into_iter().enumerate() {
                let metadata = ChunkMetadata {
                    doc_id: doc_id.to_string(),
                    chunk_id: format!("{doc_id}_{text_index}_{chunk_index}"),
                    source: source_name
                        .map(str::to_string)
                        .unwrap_or_else(|| format!("document_{text_index}")),
                    chunk_index,
                    text_index,
                    content_fingerprint: fingerprint.clone(),
                    tags: keyword_tags(&chunk),
                };
                let embedding = self.embedder.embed(&chunk);
                points.push(ChunkPoint {
                    text: chunk,
                    embedding,
                    metadata,
                });
            }
        }

        let num_chunks = points.len();
        self.index.upsert(&points).await?;
        info!(doc_id, num_chunks, "stored document chunks");

        self.cache
            .lock()
            .await
            .record(doc_id, &fingerprint, num_chunks);

        Ok(IngestOutcome {
            doc_id: doc_id.to_string(),
            num_chunks,
            unchanged: false,
        })
    }
}

/// Case-insensitive scan over a fixed, domain-agnostic vocabulary. The tags
/// are auxiliary filterable metadata, never a ranking signal.
fn keyword_tags(chunk: &str) -> Vec<String> {
    let lowered = chunk.to_lowercase();
    KEYWORD_TAGS
        .iter()
        .filter(|keyword| lowered.contains(*keyword))
        .map(|keyword| format!("contains_{keyword}"))
        .collect()
}
