use crate::embeddings::Embedder;
use crate::error::{IngestError, StoreError};
use crate::extractor::TextExtractor;
use crate::ingest::DocumentIngestor;
use crate::models::{Answer, ChunkingOptions, IndexStatus, RetrievedChunk, UploadOutcome};
use crate::providers::{
    build_model, resolve_provider, GenerativeModel, ProviderChoice, ProviderConfig, ProviderKind,
};
use crate::retriever::Retriever;
use crate::synthesis::AnswerSynthesizer;
use crate::traits::{DocLocks, NullSessionSink, SessionSink, VectorIndex};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{error, info, warn};
use uuid::Uuid;

/// Availability snapshot for the provider chain.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderInfo {
    pub current_provider: String,
    pub current_model: String,
    pub gemini_available: bool,
    pub mistral_available: bool,
    pub ollama_available: bool,
}

/// Single entry point for the upload / ask / search pipeline.
///
/// Built once at process start with explicit dependencies and shared by
/// reference into request-handling contexts; there are no global service
/// instances anywhere in the crate.
pub struct QaCoordinator {
    index: Arc<dyn VectorIndex>,
    extractor: Arc<dyn TextExtractor>,
    ingestor: DocumentIngestor,
    retriever: Arc<Retriever>,
    synthesizer: RwLock<AnswerSynthesizer>,
    session_sink: Arc<dyn SessionSink>,
    provider_config: ProviderConfig,
}

impl QaCoordinator {
    pub fn new(
        index: Arc<dyn VectorIndex>,
        embedder: Arc<dyn Embedder>,
        extractor: Arc<dyn TextExtractor>,
        model: Box<dyn GenerativeModel>,
        provider_config: ProviderConfig,
        options: ChunkingOptions,
    ) -> Self {
        let locks = DocLocks::default();
        let retriever = Arc::new(Retriever::new(index.clone(), embedder.clone(), locks.clone()));
        let ingestor = DocumentIngestor::new(index.clone(), embedder, options, locks);
        let synthesizer = RwLock::new(AnswerSynthesizer::new(retriever.clone(), model));

        Self {
            index,
            extractor,
            ingestor,
            retriever,
            synthesizer,
            session_sink: Arc::new(NullSessionSink),
            provider_config,
        }
    }

    pub fn with_session_sink(mut self, sink: Arc<dyn SessionSink>) -> Self {
        self.session_sink = sink;
        self
    }

    /// Bootstraps the backing collection. Call once before serving.
    pub async fn ensure_ready(&self) -> Result<(), StoreError> {
        self.index.ensure_ready().await
    }

    /// Extracts, chunks, embeds, and indexes one uploaded file under a fresh
    /// document id.
    pub async fn upload(&self, bytes: &[u8], filename: &str) -> Result<UploadOutcome, IngestError> {
        if !self.extractor.is_supported(filename) {
            return Err(IngestError::UnsupportedFormat(filename.to_string()));
        }

        let extraction = self.extractor.extract(bytes, filename)?;
        let doc_id = Uuid::new_v4().to_string();

        let outcome = self
            .ingestor
            .ingest(&doc_id, &[extraction.text], Some(filename))
            .await?;

        info!(
            doc_id = %outcome.doc_id,
            filename,
            num_chunks = outcome.num_chunks,
            "document uploaded"
        );

        Ok(UploadOutcome {
            doc_id: outcome.doc_id,
            filename: filename.to_string(),
            num_chunks: outcome.num_chunks,
        })
    }

    /// Answers a question over the indexed documents, optionally scoped to
    /// one `doc_id`. Never fails; see [`AnswerSynthesizer::ask`].
    pub async fn ask(&self, question: &str, doc_id: Option<&str>) -> Answer {
        self.ask_in_session(question, doc_id, None).await
    }

    /// Like [`Self::ask`], additionally recording the exchange in the session
    /// sink. Sink failures are logged and never affect the returned answer.
    pub async fn ask_in_session(
        &self,
        question: &str,
        doc_id: Option<&str>,
        session_id: Option<&str>,
    ) -> Answer {
        let answer = self.synthesizer.read().await.ask(question, doc_id).await;

        if let Some(session_id) = session_id {
            let sink = &self.session_sink;
            if let Err(sink_error) = sink
                .save_message(session_id, "user", question, &answer.provider, &[])
                .await
            {
                warn!(%sink_error, session_id, "failed to record user message");
            }
            if let Err(sink_error) = sink
                .save_message(
                    session_id,
                    "assistant",
                    &answer.answer,
                    &answer.provider,
                    &answer.sources,
                )
                .await
            {
                warn!(%sink_error, session_id, "failed to record assistant message");
            }
        }

        answer
    }

    /// Raw similarity search, for callers that want chunks without an answer.
    pub async fn search(
        &self,
        query: &str,
        doc_id: Option<&str>,
        k: usize,
    ) -> Result<Vec<RetrievedChunk>, StoreError> {
        self.retriever.search(query, doc_id, k).await
    }

    /// Removes every indexed chunk.
    pub async fn clear_all(&self) -> bool {
        match self.index.delete_all().await {
            Ok(()) => {
                info!("cleared all documents from the index");
                true
            }
            Err(store_error) => {
                error!(%store_error, "failed to clear index");
                false
            }
        }
    }

    /// Switches the active language-model backend at runtime. An unavailable
    /// explicit choice degrades down the priority chain.
    pub async fn switch_provider(&self, choice: ProviderChoice, model_name: Option<&str>) -> bool {
        let resolved = resolve_provider(choice, &self.provider_config);

        match build_model(resolved, model_name, &self.provider_config) {
            Ok(model) => {
                let mut synthesizer = self.synthesizer.write().await;
                let previous = synthesizer.provider();
                synthesizer.set_model(model);
                info!(from = %previous, to = %resolved, "switched provider");
                true
            }
            Err(provider_error) => {
                error!(%provider_error, "failed to switch provider");
                false
            }
        }
    }

    pub async fn provider_info(&self) -> ProviderInfo {
        let synthesizer = self.synthesizer.read().await;
        ProviderInfo {
            current_provider: synthesizer.provider().to_string(),
            current_model: synthesizer.model_name().to_string(),
            gemini_available: self.provider_config.is_configured(ProviderKind::Gemini),
            mistral_available: self.provider_config.is_configured(ProviderKind::Mistral),
            ollama_available: true,
        }
    }

    /// Chunk counts overall and per document. A failing index reports
    /// `healthy = false` rather than an error.
    pub async fn index_status(&self) -> IndexStatus {
        match self.index.fetch_all_metadata().await {
            Ok(metadata) => {
                let mut documents: Vec<(String, usize)> = Vec::new();
                for entry in &metadata {
                    match documents
                        .iter_mut()
                        .find(|(doc_id, _)| *doc_id == entry.doc_id)
                    {
                        Some((_, count)) => *count += 1,
                        None => documents.push((entry.doc_id.clone(), 1)),
                    }
                }
                IndexStatus {
                    total_chunks: metadata.len(),
                    documents,
                    healthy: true,
                }
            }
            Err(store_error) => {
                error!(%store_error, "failed to read index status");
                IndexStatus {
                    total_chunks: 0,
                    documents: Vec::new(),
                    healthy: false,
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embeddings::HashedNgramEmbedder;
    use crate::error::ProviderError;
    use crate::extractor::DocumentExtractor;
    use crate::models::{ChunkMetadata, ChunkPoint, ScoredChunk};
    use async_trait::async_trait;
    use std::collections::HashMap;
    use tokio::sync::Mutex;

    /// In-memory stand-in for the Qdrant adapter with real cosine ranking,
    /// so retrieval order is meaningful in tests.
    #[derive(Default)]
    struct MemoryIndex {
        points: Mutex<HashMap<String, ChunkPoint>>,
    }

    #[async_trait]
    impl VectorIndex for MemoryIndex {
        async fn ensure_ready(&self) -> Result<(), StoreError> {
            Ok(())
        }

        async fn upsert(&self, points: &[ChunkPoint]) -> Result<(), StoreError> {
            let mut stored = self.points.lock().await;
            for point in points {
                stored.insert(point.metadata.chunk_id.clone(), point.clone());
            }
            Ok(())
        }

        async fn delete_by_doc(&self, doc_id: &str) -> Result<(), StoreError> {
            self.points
                .lock()
                .await
                .retain(|_, point| point.metadata.doc_id != doc_id);
            Ok(())
        }

        async fn delete_all(&self) -> Result<(), StoreError> {
            self.points.lock().await.clear();
            Ok(())
        }

        async fn similarity_search(
            &self,
            query_embedding: &[f32],
            k: usize,
            doc_id: Option<&str>,
        ) -> Result<Vec<ScoredChunk>, StoreError> {
            let stored = self.points.lock().await;
            let mut hits: Vec<ScoredChunk> = stored
                .values()
                .filter(|point| doc_id.map_or(true, |id| point.metadata.doc_id == id))
                .map(|point| ScoredChunk {
                    text: point.text.clone(),
                    metadata: point.metadata.clone(),
                    score: point
                        .embedding
                        .iter()
                        .zip(query_embedding)
                        .map(|(a, b)| (a * b) as f64)
                        .sum(),
                })
                .collect();
            hits.sort_by(|left, right| right.score.total_cmp(&left.score));
            hits.truncate(k);
            Ok(hits)
        }

        async fn fetch_all_metadata(&self) -> Result<Vec<ChunkMetadata>, StoreError> {
            Ok(self
                .points
                .lock()
                .await
                .values()
                .map(|point| point.metadata.clone())
                .collect())
        }
    }

    struct EchoModel {
        kind: ProviderKind,
    }

    #[async_trait]
    impl GenerativeModel for EchoModel {
        fn kind(&self) -> ProviderKind {
            self.kind
        }

        fn model_name(&self) -> &str {
            "echo"
        }

        async fn generate(&self, _prompt: &str) -> Result<String, ProviderError> {
            Ok("echoed answer".to_string())
        }
    }

    struct RecordingSink {
        messages: Mutex<Vec<(String, String)>>,
    }

    #[async_trait]
    impl SessionSink for RecordingSink {
        async fn save_message(
            &self,
            _session_id: &str,
            role: &str,
            content: &str,
            _provider: &str,
            _sources: &[crate::models::SourcePreview],
        ) -> Result<(), StoreError> {
            self.messages
                .lock()
                .await
                .push((role.to_string(), content.to_string()));
            Ok(())
        }
    }

    fn test_config() -> ProviderConfig {
        ProviderConfig {
            gemini_api_key: None,
            mistral_api_key: None,
            ollama_url: "http://localhost:11434".to_string(),
            ollama_model: "llama3.2:1b".to_string(),
        }
    }

    fn coordinator() -> QaCoordinator {
        QaCoordinator::new(
            Arc::new(MemoryIndex::default()),
            Arc::new(HashedNgramEmbedder::default()),
            Arc::new(DocumentExtractor),
            Box::new(EchoModel {
                kind: ProviderKind::Ollama,
            }),
            test_config(),
            ChunkingOptions {
                target_size: 100,
                overlap: 20,
            },
        )
    }

    fn sample_document() -> Vec<u8> {
        format!("{}{}", "Alpha risk. ".repeat(50), "Beta security. ".repeat(50)).into_bytes()
    }

    #[tokio::test]
    async fn upload_then_ask_returns_attributed_answer() {
        let coordinator = coordinator();

        let outcome = coordinator
            .upload(&sample_document(), "report.txt")
            .await
            .expect("upload should succeed");
        assert!(outcome.num_chunks >= 2);

        let answer = coordinator
            .ask(
                "What does the document say about risk?",
                Some(&outcome.doc_id),
            )
            .await;

        assert!(answer.success);
        assert_eq!(answer.answer, "echoed answer");
        assert!(!answer.sources.is_empty());
        assert!(
            answer
                .sources
                .iter()
                .any(|source| source.content_preview.contains("risk")),
            "at least one preview should mention risk"
        );
    }

    #[tokio::test]
    async fn unsupported_upload_is_rejected_up_front() {
        let coordinator = coordinator();
        let result = coordinator.upload(b"bytes", "deck.pptx").await;
        assert!(matches!(result, Err(IngestError::UnsupportedFormat(_))));
    }

    #[tokio::test]
    async fn ask_with_unindexed_doc_id_soft_fails() {
        let coordinator = coordinator();
        coordinator
            .upload(&sample_document(), "report.txt")
            .await
            .expect("upload should succeed");

        let answer = coordinator.ask("anything?", Some("no-such-doc")).await;
        assert!(!answer.success);
        assert!(answer.sources.is_empty());
    }

    #[tokio::test]
    async fn clear_all_empties_status_and_asks_behave_as_empty() {
        let coordinator = coordinator();
        coordinator
            .upload(&sample_document(), "report.txt")
            .await
            .expect("upload should succeed");
        assert!(coordinator.index_status().await.total_chunks > 0);

        assert!(coordinator.clear_all().await);

        let status = coordinator.index_status().await;
        assert_eq!(status.total_chunks, 0);
        assert!(status.documents.is_empty());
        assert!(status.healthy);

        let answer = coordinator.ask("anything?", None).await;
        assert!(!answer.success);
    }

    #[tokio::test]
    async fn status_counts_chunks_per_document() {
        let coordinator = coordinator();
        let first = coordinator
            .upload(&sample_document(), "first.txt")
            .await
            .expect("upload should succeed");
        let second = coordinator
            .upload(
                "Monitoring paragraph. ".repeat(60).as_bytes(),
                "second.txt",
            )
            .await
            .expect("upload should succeed");

        let status = coordinator.index_status().await;
        assert_eq!(
            status.total_chunks,
            first.num_chunks + second.num_chunks
        );
        assert_eq!(status.documents.len(), 2);
    }

    #[tokio::test]
    async fn switch_provider_is_reflected_in_answers() {
        let coordinator = coordinator();
        coordinator
            .upload(&sample_document(), "report.txt")
            .await
            .expect("upload should succeed");

        let before = coordinator.ask("risk?", None).await;
        assert_eq!(before.provider, "ollama");

        // Without API keys, any explicit hosted choice degrades to Ollama but
        // the switch itself still succeeds.
        assert!(
            coordinator
                .switch_provider(ProviderChoice::Explicit(ProviderKind::Ollama), None)
                .await
        );
        let info = coordinator.provider_info().await;
        assert_eq!(info.current_provider, "ollama");
        assert!(!info.gemini_available);
        assert!(info.ollama_available);
    }

    #[tokio::test]
    async fn session_sink_records_both_sides_of_the_exchange() {
        let sink = Arc::new(RecordingSink {
            messages: Mutex::new(Vec::new()),
        });
        let coordinator = coordinator().with_session_sink(sink.clone());
        coordinator
            .upload(&sample_document(), "report.txt")
            .await
            .expect("upload should succeed");

        coordinator
            .ask_in_session("risk?", None, Some("session-1"))
            .await;

        let messages = sink.messages.lock().await;
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].0, "user");
        assert_eq!(messages[1].0, "assistant");
    }
}
