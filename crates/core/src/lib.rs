pub mod chunking;
pub mod embeddings;
pub mod error;
pub mod extractor;
pub mod ingest;
pub mod models;
pub mod orchestrator;
pub mod providers;
pub mod retriever;
pub mod stores;
pub mod synthesis;
pub mod traits;

pub use chunking::chunk_text;
pub use embeddings::{Embedder, HashedNgramEmbedder, DEFAULT_EMBEDDING_DIMENSIONS};
pub use error::{IngestError, ProviderError, StoreError};
pub use extractor::{DocumentExtractor, Extraction, ExtractionMethod, TextExtractor};
pub use ingest::{DocumentIngestor, IngestOutcome};
pub use models::{
    Answer, ChunkMetadata, ChunkPoint, ChunkingOptions, IndexStatus, RetrievedChunk, ScoredChunk,
    SourcePreview, UploadOutcome, KEYWORD_TAGS,
};
pub use orchestrator::{ProviderInfo, QaCoordinator};
pub use providers::{
    build_model, resolve_provider, GenerativeModel, ProviderChoice, ProviderConfig, ProviderKind,
};
pub use retriever::{Retriever, DEFAULT_TOP_K};
pub use stores::QdrantStore;
pub use synthesis::AnswerSynthesizer;
pub use traits::{DocLocks, NullSessionSink, SessionSink, VectorIndex};
