use crate::embeddings::Embedder;
use crate::error::ChatError;
use crate::models::IndexMatch;
use crate::traits::VectorIndex;
use std::sync::Arc;
use tracing::debug;

pub const DEFAULT_TOP_K: usize = 5;
pub const DEFAULT_NAMESPACE: &str = "docs";

/// Reduces top-k matches to one grounding-context string: metadata texts in
/// match order (descending score), blank-line separated, empty texts
/// skipped. Zero matches reduce to an empty string.
pub fn context_from_matches(matches: &[IndexMatch]) -> String {
    let mut context = String::new();
    for hit in matches {
        let text = hit
            .metadata
            .as_ref()
            .map(|metadata| metadata.text.as_str())
            .unwrap_or_default();
        if text.is_empty() {
            continue;
        }
        context.push_str(text);
        context.push_str("\n\n");
    }
    context.trim().to_string()
}

/// Query-time half of the pipeline: embed the question, search the index,
/// reduce to a context string.
pub struct Retriever {
    embedder: Arc<dyn Embedder>,
    index: Arc<dyn VectorIndex>,
    namespace: String,
    top_k: usize,
}

impl Retriever {
    pub fn new(embedder: Arc<dyn Embedder>, index: Arc<dyn VectorIndex>) -> Self {
        Self {
            embedder,
            index,
            namespace: DEFAULT_NAMESPACE.to_string(),
            top_k: DEFAULT_TOP_K,
        }
    }

    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    pub async fn retrieve(&self, query: &str) -> Result<String, ChatError> {
        let vector = self.embedder.embed(query).await?;
        let matches = self
            .index
            .query(&vector, self.top_k, &self.namespace)
            .await?;
        debug!(matches = matches.len(), "retrieved context");
        Ok(context_from_matches(&matches))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embeddings::HashingEmbedder;
    use crate::error::IngestError;
    use crate::models::{RecordMetadata, VectorRecord};
    use async_trait::async_trait;

    struct FixedIndex {
        matches: Vec<IndexMatch>,
    }

    #[async_trait]
    impl VectorIndex for FixedIndex {
        async fn ensure(&self, _dimension: usize) -> Result<(), IngestError> {
            Ok(())
        }

        async fn upsert(
            &self,
            _records: &[VectorRecord],
            _namespace: &str,
        ) -> Result<(), IngestError> {
            Ok(())
        }

        async fn query(
            &self,
            _vector: &[f32],
            _top_k: usize,
            _namespace: &str,
        ) -> Result<Vec<IndexMatch>, ChatError> {
            Ok(self.matches.clone())
        }

        async fn delete(&self) -> Result<(), IngestError> {
            Ok(())
        }
    }

    fn hit(id: &str, score: f32, text: &str) -> IndexMatch {
        IndexMatch {
            id: id.to_string(),
            score,
            metadata: Some(RecordMetadata {
                text: text.to_string(),
                source: "src".to_string(),
            }),
        }
    }

    #[test]
    fn context_preserves_order_and_skips_empty_text() {
        let matches = vec![
            hit("a", 0.9, "first passage"),
            hit("b", 0.8, ""),
            hit("c", 0.7, "second passage"),
            IndexMatch {
                id: "d".to_string(),
                score: 0.6,
                metadata: None,
            },
        ];
        assert_eq!(
            context_from_matches(&matches),
            "first passage\n\nsecond passage"
        );
    }

    #[test]
    fn no_matches_reduce_to_empty_context() {
        assert_eq!(context_from_matches(&[]), "");
    }

    #[tokio::test]
    async fn retrieval_on_empty_index_is_not_an_error() {
        let retriever = Retriever::new(
            Arc::new(HashingEmbedder { dimension: 8 }),
            Arc::new(FixedIndex {
                matches: Vec::new(),
            }),
        );
        let context = retriever.retrieve("what does he work on?").await.unwrap();
        assert_eq!(context, "");
    }
}
