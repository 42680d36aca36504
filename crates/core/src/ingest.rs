use crate::chunking::{split_document, ChunkingConfig};
use crate::embeddings::{embed_batch_or_zero, Embedder};
use crate::error::IngestError;
use crate::models::{Chunk, Document, RecordMetadata, SourceKind, VectorRecord};
use crate::traits::VectorIndex;
use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use tracing::{info, warn};

/// Content-derived record id: a source-kind prefix plus the hash of the
/// chunk text. Re-ingesting unchanged content upserts over the same id;
/// changed content gets a new id and the old record goes stale until the
/// next rebuild.
pub fn make_record_id(kind: SourceKind, text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    format!("{}-{:x}", kind.prefix(), hasher.finalize())
}

pub fn records_from_chunks(
    chunks: &[Chunk],
    embeddings: &[Vec<f32>],
) -> Result<Vec<VectorRecord>, IngestError> {
    if chunks.len() != embeddings.len() {
        return Err(IngestError::InvalidArgument(format!(
            "embedding count {} does not match chunk count {}",
            embeddings.len(),
            chunks.len()
        )));
    }

    Ok(chunks
        .iter()
        .zip(embeddings.iter())
        .map(|(chunk, embedding)| VectorRecord {
            id: make_record_id(chunk.kind, &chunk.text),
            values: embedding.clone(),
            metadata: RecordMetadata {
                text: chunk.text.clone(),
                source: chunk.source.clone(),
            },
        })
        .collect())
}

#[derive(Debug, Clone)]
pub struct IngestionReport {
    pub document_count: usize,
    pub chunk_count: usize,
    pub zero_filled: usize,
    pub finished_at: DateTime<Utc>,
}

/// Offline batch writer: chunks documents, embeds them (best-effort), and
/// upserts the records in one call. Assumes exclusive ownership of the
/// namespace for the duration of a run.
pub struct IndexWriter<'a> {
    embedder: &'a dyn Embedder,
    index: &'a dyn VectorIndex,
    namespace: String,
    chunking: ChunkingConfig,
}

impl<'a> IndexWriter<'a> {
    pub fn new(
        embedder: &'a dyn Embedder,
        index: &'a dyn VectorIndex,
        namespace: impl Into<String>,
        chunking: ChunkingConfig,
    ) -> Self {
        Self {
            embedder,
            index,
            namespace: namespace.into(),
            chunking,
        }
    }

    /// Binds the index to the embedder's dimension, creating it if absent.
    /// A failure here is fatal for the run.
    pub async fn prepare(&self) -> Result<(), IngestError> {
        self.index.ensure(self.embedder.dimension()).await
    }

    /// Deletes and recreates the index. The supported remediation for stale
    /// records left behind by changed or removed sources.
    pub async fn rebuild(&self) -> Result<(), IngestError> {
        warn!("rebuilding index from scratch");
        self.index.delete().await?;
        self.prepare().await
    }

    pub async fn ingest(&self, documents: &[Document]) -> Result<IngestionReport, IngestError> {
        let chunks: Vec<Chunk> = documents
            .iter()
            .flat_map(|document| split_document(document, self.chunking))
            .collect();

        if chunks.is_empty() {
            info!("nothing to ingest");
            return Ok(IngestionReport {
                document_count: documents.len(),
                chunk_count: 0,
                zero_filled: 0,
                finished_at: Utc::now(),
            });
        }

        let texts: Vec<String> = chunks.iter().map(|chunk| chunk.text.clone()).collect();
        let embeddings = embed_batch_or_zero(self.embedder, &texts).await;
        let zero_filled = embeddings
            .iter()
            .filter(|embedding| embedding.iter().all(|value| *value == 0.0))
            .count();

        let records = records_from_chunks(&chunks, &embeddings)?;
        self.index.upsert(&records, &self.namespace).await?;

        info!(
            documents = documents.len(),
            chunks = chunks.len(),
            zero_filled,
            namespace = %self.namespace,
            "ingestion batch upserted"
        );

        Ok(IngestionReport {
            document_count: documents.len(),
            chunk_count: chunks.len(),
            zero_filled,
            finished_at: Utc::now(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embeddings::HashingEmbedder;
    use crate::error::ChatError;
    use crate::models::IndexMatch;
    use async_trait::async_trait;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingIndex {
        upserts: Mutex<Vec<(Vec<VectorRecord>, String)>>,
    }

    #[async_trait]
    impl VectorIndex for RecordingIndex {
        async fn ensure(&self, _dimension: usize) -> Result<(), IngestError> {
            Ok(())
        }

        async fn upsert(
            &self,
            records: &[VectorRecord],
            namespace: &str,
        ) -> Result<(), IngestError> {
            self.upserts
                .lock()
                .unwrap()
                .push((records.to_vec(), namespace.to_string()));
            Ok(())
        }

        async fn query(
            &self,
            _vector: &[f32],
            _top_k: usize,
            _namespace: &str,
        ) -> Result<Vec<IndexMatch>, ChatError> {
            Ok(Vec::new())
        }

        async fn delete(&self) -> Result<(), IngestError> {
            Ok(())
        }
    }

    #[test]
    fn record_ids_are_deterministic_and_sensitive() {
        let first = make_record_id(SourceKind::Web, "hello world");
        let second = make_record_id(SourceKind::Web, "hello world");
        let changed = make_record_id(SourceKind::Web, "hello world!");
        assert_eq!(first, second);
        assert_ne!(first, changed);
        assert!(first.starts_with("web-"));
    }

    #[test]
    fn record_ids_differ_across_source_kinds() {
        let web = make_record_id(SourceKind::Web, "same text");
        let github = make_record_id(SourceKind::Github, "same text");
        assert_ne!(web, github);
    }

    #[test]
    fn mismatched_embedding_count_is_rejected() {
        let chunks = vec![Chunk {
            text: "abc".to_string(),
            source: "s".to_string(),
            sequence_no: 0,
            kind: SourceKind::File,
        }];
        assert!(records_from_chunks(&chunks, &[]).is_err());
    }

    #[tokio::test]
    async fn ingest_upserts_one_batch_with_metadata() {
        let embedder = HashingEmbedder { dimension: 8 };
        let index = RecordingIndex::default();
        let writer = IndexWriter::new(&embedder, &index, "docs", ChunkingConfig::default());

        let documents = vec![Document {
            text: "About the site owner. Projects and publications.".to_string(),
            source: "https://example.com/about".to_string(),
            kind: SourceKind::Web,
        }];
        let report = writer.ingest(&documents).await.unwrap();

        assert_eq!(report.document_count, 1);
        assert_eq!(report.chunk_count, 1);
        assert_eq!(report.zero_filled, 0);

        let upserts = index.upserts.lock().unwrap();
        assert_eq!(upserts.len(), 1);
        let (records, namespace) = &upserts[0];
        assert_eq!(namespace, "docs");
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].metadata.source, "https://example.com/about");
        assert_eq!(records[0].values.len(), 8);
    }

    #[tokio::test]
    async fn empty_documents_upsert_nothing() {
        let embedder = HashingEmbedder { dimension: 8 };
        let index = RecordingIndex::default();
        let writer = IndexWriter::new(&embedder, &index, "docs", ChunkingConfig::default());

        let report = writer.ingest(&[]).await.unwrap();
        assert_eq!(report.chunk_count, 0);
        assert!(index.upserts.lock().unwrap().is_empty());
    }
}
