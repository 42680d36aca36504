pub mod chat;
pub mod chunking;
pub mod embeddings;
pub mod error;
pub mod followups;
pub mod gemini;
pub mod ingest;
pub mod models;
pub mod retriever;
pub mod sources;
pub mod stores;
pub mod traits;

pub use chat::{ChatPipeline, DEFAULT_SYSTEM_PROMPT};
pub use chunking::{split_document, split_text, ChunkingConfig};
pub use embeddings::{
    build_embedder, embed_batch_or_zero, Embedder, EmbeddingBackend, HashingEmbedder,
    HfInferenceEmbedder, DEFAULT_EMBEDDING_DIMENSION, DEFAULT_EMBEDDING_MODEL,
};
pub use error::{ChatError, IngestError};
pub use followups::{filter_candidates, parse_suggestions, NO_SUGGESTIONS};
pub use gemini::GeminiModel;
pub use ingest::{make_record_id, records_from_chunks, IndexWriter, IngestionReport};
pub use models::{
    ChatMessage, Chunk, Document, IndexMatch, PipelineState, RecordMetadata, Role, SourceKind,
    VectorRecord,
};
pub use retriever::{context_from_matches, Retriever, DEFAULT_NAMESPACE, DEFAULT_TOP_K};
pub use sources::{FetchReport, SkippedSource};
pub use stores::{PineconeIndex, PineconeSettings};
pub use traits::{LanguageModel, TokenStream, VectorIndex};
