use serde::{Deserialize, Serialize};

/// Keyword vocabulary scanned at ingestion time. Presence of a word turns on
/// a tag in chunk metadata, usable as an auxiliary filter hint.
pub const KEYWORD_TAGS: [&str; 4] = ["risk", "security", "monitoring", "performance"];

/// Metadata stored alongside every embedded chunk. The vector index owns
/// these once upserted; the ingestor is the only writer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChunkMetadata {
    pub doc_id: String,
    pub chunk_id: String,
    pub source: String,
    /// Order of the chunk within its text block.
    pub chunk_index: usize,
    /// Index of the text block the chunk was cut from.
    pub text_index: usize,
    pub content_fingerprint: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
}

impl ChunkMetadata {
    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|existing| existing == tag)
    }
}

/// A chunk ready for upsert: text plus its embedding and metadata.
#[derive(Debug, Clone)]
pub struct ChunkPoint {
    pub text: String,
    pub embedding: Vec<f32>,
    pub metadata: ChunkMetadata,
}

/// Raw similarity hit as returned by the vector index, before ranking.
#[derive(Debug, Clone)]
pub struct ScoredChunk {
    pub text: String,
    pub metadata: ChunkMetadata,
    pub score: f64,
}

/// One retrieval hit, ranked 1-based in similarity order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievedChunk {
    pub content: String,
    pub metadata: ChunkMetadata,
    pub score: f64,
    pub rank: usize,
}

/// Short excerpt attached to an answer for attribution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourcePreview {
    pub chunk_index: usize,
    pub content_preview: String,
    pub metadata: ChunkMetadata,
}

/// Result of one question. Always well-formed: provider failures and empty
/// retrievals are reported through `success`, never as errors.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Answer {
    pub answer: String,
    pub sources: Vec<SourcePreview>,
    pub source_count: usize,
    pub provider: String,
    pub success: bool,
}

/// Outcome of a successful upload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadOutcome {
    pub doc_id: String,
    pub filename: String,
    pub num_chunks: usize,
}

/// Snapshot of the vector index contents.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexStatus {
    pub total_chunks: usize,
    /// Chunk counts keyed by `doc_id`, in first-seen order.
    pub documents: Vec<(String, usize)>,
    pub healthy: bool,
}

/// Chunking tunables. Defaults match the splitter settings the answer
/// pipeline was tuned against.
#[derive(Debug, Clone, Copy)]
pub struct ChunkingOptions {
    /// Upper bound for a chunk, in characters for paragraph chunking and in
    /// words for the window fallback.
    pub target_size: usize,
    pub overlap: usize,
}

impl Default for ChunkingOptions {
    fn default() -> Self {
        Self {
            target_size: 512,
            overlap: 50,
        }
    }
}
