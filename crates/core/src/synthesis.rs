use crate::models::{Answer, RetrievedChunk, SourcePreview};
use crate::providers::{GenerativeModel, ProviderKind};
use crate::retriever::{Retriever, DEFAULT_TOP_K};
use std::sync::Arc;
use tracing::{error, info};

const PREVIEW_CHARS: usize = 200;
const MAX_SOURCES: usize = 3;

pub const NO_RELEVANT_CONTENT: &str = "I couldn't find any relevant content in the indexed \
documents for this question. Upload a document first, or try rephrasing.";

/// Prompt wording differs per backend: Gemini gets markdown-formatting
/// guidance, Mistral a fuller instruction block, local Ollama models a terse
/// template they can actually follow.
fn prompt_template(kind: ProviderKind) -> &'static str {
    match kind {
        ProviderKind::Gemini => {
            "You are a helpful assistant that answers questions based on the provided context.\n\n\
             Use the following context to answer the question. Follow these guidelines:\n\
             - Answer only based on the information in the context\n\
             - Be accurate and cite specific parts of the context when relevant\n\
             - Use markdown formatting for better readability (**bold**, *italic*, lists, etc.)\n\
             - If the context doesn't contain relevant information, say so clearly\n\
             - Provide comprehensive but concise answers\n\n\
             Context: {context}\n\n\
             Question: {question}\n\n\
             Answer: "
        }
        ProviderKind::Mistral => {
            "You are a helpful assistant that answers questions based on the provided context.\n\n\
             Use the following context to answer the question. Be accurate and cite specific \
             parts of the context when relevant.\n\n\
             Context: {context}\n\n\
             Question: {question}\n\n\
             Answer: "
        }
        ProviderKind::Ollama => {
            "Answer the question based on the context. Be concise and cite specific parts.\n\n\
             Context: {context}\n\
             Question: {question}\n\
             Answer: "
        }
    }
}

/// Composes a prompt from retrieved chunks and a question, dispatches to the
/// active provider, and normalizes the result into an [`Answer`].
///
/// This is a hard error boundary: `ask` never fails. Empty retrievals and
/// provider failures both come back as well-formed answers with
/// `success = false`.
pub struct AnswerSynthesizer {
    retriever: Arc<Retriever>,
    model: Box<dyn GenerativeModel>,
    template: &'static str,
    top_k: usize,
}

impl AnswerSynthesizer {
    pub fn new(retriever: Arc<Retriever>, model: Box<dyn GenerativeModel>) -> Self {
        let template = prompt_template(model.kind());
        Self {
            retriever,
            model,
            template,
            top_k: DEFAULT_TOP_K,
        }
    }

    pub fn provider(&self) -> ProviderKind {
        self.model.kind()
    }

    pub fn model_name(&self) -> &str {
        self.model.model_name()
    }

    /// Swaps the backend and re-initializes the prompt template to match.
    pub fn set_model(&mut self, model: Box<dyn GenerativeModel>) {
        self.template = prompt_template(model.kind());
        self.model = model;
    }

    pub async fn ask(&self, question: &str, doc_id: Option<&str>) -> Answer {
        let provider = self.model.kind().to_string();

        let chunks = match self.retriever.search(question, doc_id, self.top_k).await {
            Ok(chunks) => chunks,
            Err(store_error) => {
                error!(%store_error, "retrieval failed during ask");
                return failed_answer(
                    format!("Sorry, there was an error searching the documents: {store_error}"),
                    provider,
                );
            }
        };

        if chunks.is_empty() {
            return failed_answer(NO_RELEVANT_CONTENT.to_string(), provider);
        }

        let prompt = self.build_prompt(question, &chunks);

        match self.model.generate(&prompt).await {
            Ok(answer_text) => {
                info!(
                    provider = %provider,
                    sources = chunks.len(),
                    "generated answer"
                );
                Answer {
                    answer: answer_text,
                    sources: source_previews(&chunks),
                    source_count: chunks.len(),
                    provider,
                    success: true,
                }
            }
            Err(provider_error) => {
                error!(%provider_error, provider = %provider, "answer generation failed");
                // A request that never completed reads differently to the
                // user than the provider answering with an error.
                let text = if provider_error.is_transport() {
                    format!(
                        "Sorry, the {provider} service could not be reached: {provider_error}"
                    )
                } else {
                    format!(
                        "Sorry, there was an error processing your question: {provider_error}"
                    )
                };
                failed_answer(text, provider)
            }
        }
    }

    fn build_prompt(&self, question: &str, chunks: &[RetrievedChunk]) -> String {
        // Chunk texts in rank order; overlap between chunks is left as-is.
        let context = chunks
            .iter()
            .map(|chunk| chunk.content.as_str())
            .collect::<Vec<_>>()
            .join("\n\n");

        self.template
            .replace("{context}", &context)
            .replace("{question}", question)
    }
}

fn failed_answer(text: String, provider: String) -> Answer {
    Answer {
        answer: text,
        sources: Vec::new(),
        source_count: 0,
        provider,
        success: false,
    }
}

fn source_previews(chunks: &[RetrievedChunk]) -> Vec<SourcePreview> {
    chunks
        .iter()
        .take(MAX_SOURCES)
        .enumerate()
        .map(|(index, chunk)| SourcePreview {
            chunk_index: index,
            content_preview: preview_text(&chunk.content),
            metadata: chunk.metadata.clone(),
        })
        .collect()
}

fn preview_text(content: &str) -> String {
    let collapsed = content.replace('\n', " ");
    let truncated: String = collapsed.chars().take(PREVIEW_CHARS).collect();
    if collapsed.chars().count() > PREVIEW_CHARS {
        format!("{truncated}...")
    } else {
        truncated
    }
}
