use chrono::Utc;
use clap::{Parser, Subcommand};
use doc_chat_core::{
    build_model, resolve_provider, ChunkingOptions, DocumentExtractor, Embedder,
    HashedNgramEmbedder, ProviderChoice, ProviderConfig, QaCoordinator, QdrantStore,
};
use std::path::Path;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "doc-chat", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Qdrant base URL
    #[arg(long, env = "QDRANT_URL", default_value = "http://localhost:6333")]
    qdrant_url: String,

    /// Qdrant collection
    #[arg(long, default_value = "documents")]
    collection: String,
}

#[derive(Subcommand)]
enum Command {
    /// Extract, chunk, embed, and index one document.
    Upload {
        /// Path of the file to upload (.pdf, .txt, .md, .csv).
        #[arg(long)]
        file: String,
    },
    /// Ask a question over the indexed documents.
    Ask {
        /// The question text.
        #[arg(long)]
        question: String,
        /// Restrict retrieval to one document id.
        #[arg(long)]
        doc_id: Option<String>,
        /// Provider to answer with (gemini, mistral, ollama). Defaults to the
        /// best configured one.
        #[arg(long)]
        provider: Option<String>,
        /// Override the provider's default model name.
        #[arg(long)]
        model: Option<String>,
    },
    /// Similarity search without answer synthesis.
    Search {
        /// Search query
        #[arg(long)]
        query: String,
        /// Restrict retrieval to one document id.
        #[arg(long)]
        doc_id: Option<String>,
        /// Number of chunks to return.
        #[arg(long, default_value = "4")]
        top_k: usize,
    },
    /// Report chunk counts per document and provider availability.
    Status,
    /// Remove every indexed document.
    Clear,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(fmt::layer())
        .init();

    let cli = Cli::parse();

    let embedder = Arc::new(HashedNgramEmbedder::default());
    let store = QdrantStore::new(&cli.qdrant_url, &cli.collection, embedder.dimensions())
        .map_err(|error| anyhow::anyhow!(error.to_string()))?;

    let provider_config = ProviderConfig::from_env();
    let choice = match &cli.command {
        Command::Ask {
            provider: Some(name),
            ..
        } => ProviderChoice::parse(name)
            .ok_or_else(|| anyhow::anyhow!("unknown provider: {name}"))?,
        _ => ProviderChoice::Auto,
    };
    let model_name = match &cli.command {
        Command::Ask { model, .. } => model.as_deref(),
        _ => None,
    };

    let resolved = resolve_provider(choice, &provider_config);
    let model = build_model(resolved, model_name, &provider_config)
        .map_err(|error| anyhow::anyhow!(error.to_string()))?;

    let coordinator = QaCoordinator::new(
        Arc::new(store),
        embedder,
        Arc::new(DocumentExtractor),
        model,
        provider_config,
        ChunkingOptions::default(),
    );

    info!(
        version = env!("CARGO_PKG_VERSION"),
        provider = %resolved,
        started_at = %Utc::now().to_rfc3339(),
        "doc-chat boot"
    );

    coordinator
        .ensure_ready()
        .await
        .map_err(|error| anyhow::anyhow!(error.to_string()))?;

    match cli.command {
        Command::Upload { file } => {
            let bytes = tokio::fs::read(&file).await?;
            let filename = Path::new(&file)
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_else(|| file.clone());

            let outcome = coordinator.upload(&bytes, &filename).await?;
            println!(
                "uploaded {} as document {} ({} chunks)",
                outcome.filename, outcome.doc_id, outcome.num_chunks
            );
        }
        Command::Ask {
            question, doc_id, ..
        } => {
            let answer = coordinator.ask(&question, doc_id.as_deref()).await;

            println!("{}", answer.answer);
            if answer.success && !answer.sources.is_empty() {
                println!();
                for source in &answer.sources {
                    println!(
                        "source: {} (chunk {})",
                        source.metadata.source, source.metadata.chunk_id
                    );
                    println!("  {}", source.content_preview);
                }
            }
            println!("provider: {}", answer.provider);
        }
        Command::Search {
            query,
            doc_id,
            top_k,
        } => {
            let hits = coordinator
                .search(&query, doc_id.as_deref(), top_k)
                .await
                .map_err(|error| anyhow::anyhow!(error.to_string()))?;

            if hits.is_empty() {
                println!("no matching chunks");
            }
            for hit in hits {
                println!(
                    "[{}] score={:.4} chunk={} document_id={}",
                    hit.rank, hit.score, hit.metadata.chunk_id, hit.metadata.doc_id
                );
                if !hit.metadata.tags.is_empty() {
                    println!("  tags={}", hit.metadata.tags.join(","));
                }
                println!("  {}", hit.content);
            }
        }
        Command::Status => {
            let status = coordinator.index_status().await;
            let info = coordinator.provider_info().await;

            println!(
                "index: {} chunks across {} documents (healthy: {})",
                status.total_chunks,
                status.documents.len(),
                status.healthy
            );
            for (doc_id, count) in status.documents {
                println!("  {doc_id}: {count} chunks");
            }
            println!(
                "provider: {} ({}) | gemini={} mistral={} ollama={}",
                info.current_provider,
                info.current_model,
                info.gemini_available,
                info.mistral_available,
                info.ollama_available
            );
        }
        Command::Clear => {
            if coordinator.clear_all().await {
                println!("index cleared at {}", Utc::now().to_rfc3339());
            } else {
                anyhow::bail!("failed to clear the index");
            }
        }
    }

    Ok(())
}
