use crate::error::{ChatError, IngestError};
use crate::models::{ChatMessage, IndexMatch, VectorRecord};
use async_trait::async_trait;
use futures::stream::BoxStream;

/// A namespaced vector index. The index name, similarity metric, and region
/// are fixed at construction; `ensure` binds the embedding dimension.
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Idempotent: creates the index if absent and blocks until it reports
    /// ready. A dimension mismatch with an existing index is a fatal
    /// configuration error.
    async fn ensure(&self, dimension: usize) -> Result<(), IngestError>;

    /// Upserts all records in one batched call. Records with an existing id
    /// are overwritten.
    async fn upsert(&self, records: &[VectorRecord], namespace: &str) -> Result<(), IngestError>;

    /// Top-k similarity search, matches ordered by descending score.
    async fn query(
        &self,
        vector: &[f32],
        top_k: usize,
        namespace: &str,
    ) -> Result<Vec<IndexMatch>, ChatError>;

    /// Drops the index entirely. Used by full-reindex runs.
    async fn delete(&self) -> Result<(), IngestError>;
}

pub type TokenStream = BoxStream<'static, Result<String, ChatError>>;

/// A conversational language model.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Synchronous completion: the full answer in one string.
    async fn invoke(&self, messages: &[ChatMessage]) -> Result<String, ChatError>;

    /// Incremental completion: a lazy, single-pass sequence of text
    /// fragments. Dropping the stream early abandons the underlying request
    /// without error.
    async fn stream(&self, messages: &[ChatMessage]) -> Result<TokenStream, ChatError>;
}
