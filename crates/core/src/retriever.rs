use crate::embeddings::Embedder;
use crate::error::StoreError;
use crate::models::RetrievedChunk;
use crate::traits::{DocLocks, VectorIndex};
use std::sync::Arc;
use tracing::debug;

pub const DEFAULT_TOP_K: usize = 4;

/// Wraps the vector index with query embedding, an optional document scope,
/// and a result-count bound.
pub struct Retriever {
    index: Arc<dyn VectorIndex>,
    embedder: Arc<dyn Embedder>,
    locks: DocLocks,
}

impl Retriever {
    pub fn new(index: Arc<dyn VectorIndex>, embedder: Arc<dyn Embedder>, locks: DocLocks) -> Self {
        Self {
            index,
            embedder,
            locks,
        }
    }

    /// Top-`k` chunks most similar to `query`, scoped to `doc_id` when given.
    /// An empty index or a filter that matches nothing yields an empty Vec;
    /// that is a normal result, not an error.
    pub async fn search(
        &self,
        query: &str,
        doc_id: Option<&str>,
        k: usize,
    ) -> Result<Vec<RetrievedChunk>, StoreError> {
        let query_embedding = self.embedder.embed(query);

        // Doc-scoped reads wait out an in-flight replace of that document,
        // so a stored generation is never observed half-deleted.
        let _guard = match doc_id {
            Some(doc_id) => Some(self.locks.read(doc_id).await),
            None => None,
        };
        let hits = self
            .index
            .similarity_search(&query_embedding, k, doc_id)
            .await?;

        debug!(
            query,
            doc_id = doc_id.unwrap_or("<all>"),
            hits = hits.len(),
            "similarity search"
        );

        Ok(hits
            .into_iter()
            .enumerate()
            .map(|(position, hit)| RetrievedChunk {
                content: hit.text,
                metadata: hit.metadata,
                score: hit.score,
                rank: position + 1,
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embeddings::HashedNgramEmbedder;
    use crate::models::{ChunkMetadata, ChunkPoint, ScoredChunk};
    use async_trait::async_trait;
    use tokio::sync::Mutex;

    struct FakeIndex {
        hits: Vec<ScoredChunk>,
        seen_filter: Mutex<Option<Option<String>>>,
    }

    #[async_trait]
    impl VectorIndex for FakeIndex {
        async fn ensure_ready(&self) -> Result<(), StoreError> {
            Ok(())
        }

        async fn upsert(&self, _points: &[ChunkPoint]) -> Result<(), StoreError> {
            Ok(())
        }

        async fn delete_by_doc(&self, _doc_id: &str) -> Result<(), StoreError> {
            Ok(())
        }

        async fn delete_all(&self) -> Result<(), StoreError> {
            Ok(())
        }

        async fn similarity_search(
            &self,
            _query_embedding: &[f32],
            k: usize,
            doc_id: Option<&str>,
        ) -> Result<Vec<ScoredChunk>, StoreError> {
            *self.seen_filter.lock().await = Some(doc_id.map(str::to_string));
            Ok(self.hits.iter().take(k).cloned().collect())
        }

        async fn fetch_all_metadata(&self) -> Result<Vec<ChunkMetadata>, StoreError> {
            Ok(Vec::new())
        }
    }

    fn hit(chunk_id: &str, score: f64) -> ScoredChunk {
        ScoredChunk {
            text: format!("text for {chunk_id}"),
            metadata: ChunkMetadata {
                doc_id: "doc-1".to_string(),
                chunk_id: chunk_id.to_string(),
                source: "a.txt".to_string(),
                chunk_index: 0,
                text_index: 0,
                content_fingerprint: "fp".to_string(),
                tags: Vec::new(),
            },
            score,
        }
    }

    #[tokio::test]
    async fn ranks_are_one_based_in_index_order() {
        let index = Arc::new(FakeIndex {
            hits: vec![hit("c1", 0.9), hit("c2", 0.7), hit("c3", 0.5)],
            seen_filter: Mutex::new(None),
        });
        let retriever = Retriever::new(
            index,
            Arc::new(HashedNgramEmbedder::default()),
            DocLocks::default(),
        );

        let results = retriever
            .search("anything", None, 3)
            .await
            .expect("search should succeed");

        assert_eq!(results.len(), 3);
        assert_eq!(results[0].rank, 1);
        assert_eq!(results[2].rank, 3);
        assert!(results[0].score >= results[2].score);
    }

    #[tokio::test]
    async fn doc_scope_is_forwarded_to_the_index() {
        let index = Arc::new(FakeIndex {
            hits: Vec::new(),
            seen_filter: Mutex::new(None),
        });
        let retriever = Retriever::new(
            index.clone(),
            Arc::new(HashedNgramEmbedder::default()),
            DocLocks::default(),
        );

        let results = retriever
            .search("anything", Some("doc-42"), 4)
            .await
            .expect("search should succeed");

        assert!(results.is_empty());
        assert_eq!(
            *index.seen_filter.lock().await,
            Some(Some("doc-42".to_string()))
        );
    }
}
