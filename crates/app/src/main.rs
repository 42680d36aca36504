use anyhow::{bail, Context};
use chrono::Utc;
use clap::{Parser, Subcommand, ValueEnum};
use futures::StreamExt;
use rag_chat_core::sources::{files, github::GithubSource, pdf, website};
use rag_chat_core::{
    build_embedder, ChatMessage, ChatPipeline, ChunkingConfig, Embedder, EmbeddingBackend,
    FetchReport, GeminiModel, IndexWriter, PineconeIndex, PineconeSettings, Retriever,
    SkippedSource, DEFAULT_EMBEDDING_MODEL,
};
use serde_json::json;
use std::io::Write;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "rag-chat", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Pinecone API key
    #[arg(long, env = "PINECONE_API_KEY", hide_env_values = true)]
    pinecone_api_key: String,

    /// Vector index name
    #[arg(long, env = "PINECONE_INDEX_NAME", default_value = "document-index")]
    index_name: String,

    /// Serverless region for index creation
    #[arg(long, env = "PINECONE_REGION", default_value = "us-east-1")]
    region: String,

    /// Namespace holding the corpus
    #[arg(long, default_value = "docs")]
    namespace: String,

    /// Embedding dimension; must match the model and the index
    #[arg(long, default_value_t = 384)]
    embedding_dimension: usize,

    /// Embedding backend
    #[arg(long, value_enum, default_value = "local")]
    embedding_backend: Backend,

    /// Inference API token, required by the remote embedding backend
    #[arg(long, env = "HF_API_TOKEN", hide_env_values = true)]
    hf_api_token: Option<String>,

    /// Embedding model served by the remote backend
    #[arg(long, default_value = DEFAULT_EMBEDDING_MODEL)]
    embedding_model: String,

    /// Google API key, required by chat and suggest
    #[arg(long, env = "GOOGLE_API_KEY", hide_env_values = true)]
    google_api_key: Option<String>,

    /// Gemini model name
    #[arg(long, default_value = "gemini-2.0-flash")]
    gemini_model: String,

    /// Sampling temperature
    #[arg(long, default_value_t = 0.7)]
    temperature: f64,

    /// Number of matches retrieved per query
    #[arg(long, default_value_t = 5)]
    top_k: usize,

    /// Chunk size in characters
    #[arg(long, default_value_t = 600)]
    chunk_size: usize,

    /// Chunk overlap in characters
    #[arg(long, default_value_t = 50)]
    overlap: usize,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Backend {
    Local,
    Remote,
}

#[derive(Subcommand)]
enum Command {
    /// Fetch the configured sources and upsert their chunks into the index.
    Ingest {
        /// Sitemap URL to crawl for website pages
        #[arg(long)]
        sitemap: Option<String>,

        /// GitHub user whose repository markdown should be ingested
        #[arg(long)]
        github_user: Option<String>,

        /// Optional GitHub token for private repos and rate limits
        #[arg(long, env = "GITHUB_API_KEY", hide_env_values = true)]
        github_token: Option<String>,

        /// PDF URLs to download and ingest (repeatable)
        #[arg(long)]
        pdf_url: Vec<String>,

        /// Local folder of markdown/text files
        #[arg(long)]
        folder: Option<String>,

        /// Delete and recreate the index before ingesting
        #[arg(long, default_value_t = false)]
        rebuild: bool,
    },
    /// Ask one question and stream the answer to stdout.
    Chat {
        #[arg(long)]
        question: String,
    },
    /// Print follow-up suggestions for a question as JSON.
    Suggest {
        #[arg(long)]
        question: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(fmt::layer())
        .init();

    let Cli {
        command,
        pinecone_api_key,
        index_name,
        region,
        namespace,
        embedding_dimension,
        embedding_backend,
        hf_api_token,
        embedding_model,
        google_api_key,
        gemini_model,
        temperature,
        top_k,
        chunk_size,
        overlap,
    } = Cli::parse();

    let backend = match embedding_backend {
        Backend::Local => EmbeddingBackend::Local,
        Backend::Remote => EmbeddingBackend::Remote,
    };
    let embedder: Arc<dyn Embedder> = Arc::from(build_embedder(
        backend,
        embedding_dimension,
        &embedding_model,
        hf_api_token.as_deref(),
    )?);

    let settings = PineconeSettings::new(&pinecone_api_key, &index_name, embedding_dimension)
        .with_region(&region);
    let index = Arc::new(PineconeIndex::new(settings));

    info!(
        version = env!("CARGO_PKG_VERSION"),
        started_at = %Utc::now().to_rfc3339(),
        index = %index_name,
        "rag-chat boot"
    );

    match command {
        Command::Ingest {
            sitemap,
            github_user,
            github_token,
            pdf_url,
            folder,
            rebuild,
        } => {
            if sitemap.is_none() && github_user.is_none() && pdf_url.is_empty() && folder.is_none()
            {
                bail!("no sources given; pass --sitemap, --github-user, --pdf-url, or --folder");
            }

            let chunking = ChunkingConfig::new(chunk_size, overlap)?;
            let writer =
                IndexWriter::new(embedder.as_ref(), index.as_ref(), &namespace, chunking);

            if rebuild {
                writer.rebuild().await.context("index rebuild failed")?;
            } else {
                writer.prepare().await.context("index setup failed")?;
            }

            let client = reqwest::Client::new();
            let mut report = FetchReport::default();

            if let Some(sitemap_url) = sitemap {
                merge(
                    &mut report,
                    website::load_website(&client, &sitemap_url).await?,
                );
            }
            if let Some(username) = github_user {
                let source = GithubSource::new(client.clone(), username, github_token);
                merge(&mut report, source.load_all().await?);
            }
            for url in pdf_url {
                match pdf::fetch_pdf(&client, &url).await {
                    Ok(document) => report.documents.push(document),
                    Err(error) => {
                        warn!(url = %url, %error, "skipping pdf");
                        report.skipped.push(SkippedSource {
                            source: url,
                            reason: error.to_string(),
                        });
                    }
                }
            }
            if let Some(folder) = folder {
                merge(
                    &mut report,
                    files::load_folder(std::path::Path::new(&folder))?,
                );
            }

            for skipped in &report.skipped {
                warn!(source = %skipped.source, reason = %skipped.reason, "skipped source");
            }

            let outcome = writer.ingest(&report.documents).await?;
            println!(
                "{} documents, {} chunks ingested ({} zero-filled) at {}",
                outcome.document_count,
                outcome.chunk_count,
                outcome.zero_filled,
                outcome.finished_at.to_rfc3339()
            );
        }
        Command::Chat { question } => {
            let Some(api_key) = google_api_key else {
                bail!("GOOGLE_API_KEY is required for chat");
            };
            let model = GeminiModel::new(api_key, &gemini_model, temperature);
            let retriever = Retriever::new(embedder, index)
                .with_namespace(&namespace)
                .with_top_k(top_k);
            let pipeline = ChatPipeline::new(retriever, Arc::new(model));

            let history = vec![ChatMessage::user(question)];
            let mut fragments = pipeline.answer_stream(&history).await?;
            let mut stdout = std::io::stdout();
            while let Some(fragment) = fragments.next().await {
                let fragment = fragment?;
                stdout.write_all(fragment.as_bytes())?;
                stdout.flush()?;
            }
            stdout.write_all(b"\n")?;
        }
        Command::Suggest { question } => {
            let Some(api_key) = google_api_key else {
                bail!("GOOGLE_API_KEY is required for suggestions");
            };
            let model = GeminiModel::new(api_key, &gemini_model, temperature);
            let retriever = Retriever::new(embedder, index)
                .with_namespace(&namespace)
                .with_top_k(top_k);
            let pipeline = ChatPipeline::new(retriever, Arc::new(model));

            let history = vec![ChatMessage::user(question)];
            let suggestions = pipeline.suggest_followups(&history).await?;
            println!("{}", json!({ "suggestions": suggestions }));
        }
    }

    Ok(())
}

fn merge(into: &mut FetchReport, from: FetchReport) {
    into.documents.extend(from.documents);
    into.skipped.extend(from.skipped);
}
