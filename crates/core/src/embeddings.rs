use crate::error::{ChatError, IngestError};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;
use tracing::warn;

pub const DEFAULT_EMBEDDING_DIMENSION: usize = 384;
pub const DEFAULT_EMBEDDING_MODEL: &str = "sentence-transformers/all-MiniLM-L6-v2";

/// Text-to-vector capability. Batch embedding is used during ingestion for
/// throughput; single embedding at query time.
#[async_trait]
pub trait Embedder: Send + Sync {
    fn dimension(&self) -> usize;

    async fn embed(&self, text: &str) -> Result<Vec<f32>, ChatError>;

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ChatError>;
}

/// Which embedding backend a deployment runs with. Selected once at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmbeddingBackend {
    Local,
    Remote,
}

pub fn build_embedder(
    backend: EmbeddingBackend,
    dimension: usize,
    model: &str,
    api_token: Option<&str>,
) -> Result<Box<dyn Embedder>, IngestError> {
    match backend {
        EmbeddingBackend::Local => Ok(Box::new(HashingEmbedder { dimension })),
        EmbeddingBackend::Remote => {
            let token = api_token.ok_or_else(|| {
                IngestError::InvalidArgument(
                    "remote embedding backend requires an inference API token".to_string(),
                )
            })?;
            Ok(Box::new(HfInferenceEmbedder::new(model, token, dimension)))
        }
    }
}

/// Local backend: hashed character trigrams folded into a normalized
/// fixed-size vector. Deterministic and offline; a stand-in for a locally
/// hosted sentence-embedding model.
#[derive(Debug, Clone, Copy)]
pub struct HashingEmbedder {
    pub dimension: usize,
}

impl Default for HashingEmbedder {
    fn default() -> Self {
        Self {
            dimension: DEFAULT_EMBEDDING_DIMENSION,
        }
    }
}

impl HashingEmbedder {
    fn embed_sync(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0f32; self.dimension.max(1)];
        let lowered = text.to_lowercase();
        let chars: Vec<char> = lowered.chars().collect();

        if chars.is_empty() {
            return vector;
        }

        for window in chars.windows(3) {
            let token = window.iter().collect::<String>();
            let mut hash = 1469598103934665603u64;
            for byte in token.bytes() {
                hash ^= byte as u64;
                hash = hash.wrapping_mul(1099511628211);
            }
            let bucket = (hash % vector.len() as u64) as usize;
            vector[bucket] += 1.0;
        }

        let magnitude = vector.iter().map(|value| value * value).sum::<f32>().sqrt();
        if magnitude > 0.0 {
            for value in &mut vector {
                *value /= magnitude;
            }
        }

        vector
    }
}

#[async_trait]
impl Embedder for HashingEmbedder {
    fn dimension(&self) -> usize {
        self.dimension
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, ChatError> {
        Ok(self.embed_sync(text))
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ChatError> {
        Ok(texts.iter().map(|text| self.embed_sync(text)).collect())
    }
}

/// Remote backend: the HuggingFace Inference API feature-extraction pipeline.
pub struct HfInferenceEmbedder {
    client: Client,
    endpoint: String,
    api_token: String,
    dimension: usize,
}

impl HfInferenceEmbedder {
    pub fn new(model: &str, api_token: impl Into<String>, dimension: usize) -> Self {
        Self {
            client: Client::new(),
            endpoint: format!("https://api-inference.huggingface.co/pipeline/feature-extraction/{model}"),
            api_token: api_token.into(),
            dimension,
        }
    }

    /// Point at a different inference endpoint (self-hosted TEI, proxies).
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    async fn request(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>, ChatError> {
        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_token)
            .json(&json!({ "inputs": inputs }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(ChatError::BackendResponse {
                backend: "huggingface".to_string(),
                details: response.status().to_string(),
            });
        }

        let vectors: Vec<Vec<f32>> = response.json().await?;

        for vector in &vectors {
            if vector.len() != self.dimension {
                return Err(ChatError::BackendResponse {
                    backend: "huggingface".to_string(),
                    details: format!(
                        "embedding dimension {} does not match configured {}",
                        vector.len(),
                        self.dimension
                    ),
                });
            }
        }

        Ok(vectors)
    }
}

#[async_trait]
impl Embedder for HfInferenceEmbedder {
    fn dimension(&self) -> usize {
        self.dimension
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, ChatError> {
        let mut vectors = self.request(&[text.to_string()]).await?;
        vectors.pop().ok_or_else(|| ChatError::BackendResponse {
            backend: "huggingface".to_string(),
            details: "empty embedding response".to_string(),
        })
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ChatError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        self.request(texts).await
    }
}

/// Best-effort batch embedding for ingestion: a failed batch becomes one
/// zero-vector per input instead of aborting the run. The records still land
/// in the index with their text metadata intact, so a later re-ingestion with
/// a healthy backend overwrites them under the same ids.
pub async fn embed_batch_or_zero(embedder: &dyn Embedder, texts: &[String]) -> Vec<Vec<f32>> {
    match embedder.embed_batch(texts).await {
        Ok(vectors) if vectors.len() == texts.len() => vectors,
        Ok(vectors) => {
            warn!(
                expected = texts.len(),
                received = vectors.len(),
                "embedding batch returned wrong count, substituting zero vectors"
            );
            vec![vec![0.0; embedder.dimension()]; texts.len()]
        }
        Err(error) => {
            warn!(%error, "embedding batch failed, substituting zero vectors");
            vec![vec![0.0; embedder.dimension()]; texts.len()]
        }
    }
}
