use crate::error::{ChatError, IngestError};
use crate::models::{IndexMatch, VectorRecord};
use crate::traits::VectorIndex;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info};

const CONTROL_PLANE: &str = "https://api.pinecone.io";

/// How long `ensure` waits for a freshly created index to report ready
/// before giving up. Polled once per second, not busy-spun.
const READINESS_ATTEMPTS: u32 = 120;

#[derive(Debug, Clone)]
pub struct PineconeSettings {
    pub api_key: String,
    pub index_name: String,
    pub metric: String,
    pub cloud: String,
    pub region: String,
    pub dimension: usize,
}

impl PineconeSettings {
    pub fn new(api_key: impl Into<String>, index_name: impl Into<String>, dimension: usize) -> Self {
        Self {
            api_key: api_key.into(),
            index_name: index_name.into(),
            metric: "cosine".to_string(),
            cloud: "aws".to_string(),
            region: "us-east-1".to_string(),
            dimension,
        }
    }

    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = region.into();
        self
    }
}

#[derive(Debug, Deserialize)]
struct IndexDescription {
    host: String,
    dimension: usize,
    #[serde(default)]
    status: IndexStatus,
}

#[derive(Debug, Deserialize, Default)]
struct IndexStatus {
    #[serde(default)]
    ready: bool,
}

#[derive(Debug, Deserialize)]
struct QueryResponse {
    #[serde(default)]
    matches: Vec<IndexMatch>,
}

/// Serverless Pinecone index over its REST API: control plane for lifecycle,
/// the per-index data-plane host for upserts and queries.
pub struct PineconeIndex {
    client: Client,
    control_url: String,
    settings: PineconeSettings,
    host: Mutex<Option<String>>,
}

impl PineconeIndex {
    pub fn new(settings: PineconeSettings) -> Self {
        Self {
            client: Client::new(),
            control_url: CONTROL_PLANE.to_string(),
            settings,
            host: Mutex::new(None),
        }
    }

    /// Point at a different control plane (local emulators in tests).
    pub fn with_control_url(mut self, url: impl Into<String>) -> Self {
        self.control_url = url.into();
        self
    }

    async fn describe(&self) -> Result<Option<IndexDescription>, IngestError> {
        let response = self
            .client
            .get(format!(
                "{}/indexes/{}",
                self.control_url, self.settings.index_name
            ))
            .header("Api-Key", &self.settings.api_key)
            .send()
            .await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(IngestError::IndexSetup(format!(
                "describe returned {}",
                response.status()
            )));
        }

        Ok(Some(response.json().await.map_err(|error| {
            IngestError::IndexSetup(format!("describe response unreadable: {error}"))
        })?))
    }

    async fn create(&self, dimension: usize) -> Result<(), IngestError> {
        let response = self
            .client
            .post(format!("{}/indexes", self.control_url))
            .header("Api-Key", &self.settings.api_key)
            .json(&json!({
                "name": self.settings.index_name,
                "dimension": dimension,
                "metric": self.settings.metric,
                "spec": {
                    "serverless": {
                        "cloud": self.settings.cloud,
                        "region": self.settings.region,
                    }
                }
            }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(IngestError::IndexSetup(format!(
                "create returned {}",
                response.status()
            )));
        }

        Ok(())
    }

    /// Resolves and caches the data-plane host; `delete` invalidates the
    /// cache. Queries must not run before the index is ready, so an absent
    /// index is an error here.
    async fn data_host(&self) -> Result<String, ChatError> {
        let mut cached = self.host.lock().await;
        if let Some(host) = cached.as_ref() {
            return Ok(host.clone());
        }

        match self.describe().await {
            Ok(Some(description)) => {
                *cached = Some(description.host.clone());
                Ok(description.host)
            }
            Ok(None) => Err(ChatError::Request(format!(
                "index {} does not exist",
                self.settings.index_name
            ))),
            Err(error) => Err(ChatError::Request(error.to_string())),
        }
    }
}

#[async_trait]
impl VectorIndex for PineconeIndex {
    async fn ensure(&self, dimension: usize) -> Result<(), IngestError> {
        if dimension != self.settings.dimension {
            return Err(IngestError::DimensionMismatch {
                embedder: dimension,
                index: self.settings.dimension,
            });
        }

        if let Some(description) = self.describe().await? {
            if description.dimension != dimension {
                return Err(IngestError::DimensionMismatch {
                    embedder: dimension,
                    index: description.dimension,
                });
            }
            if description.status.ready {
                debug!(index = %self.settings.index_name, "index already exists");
                return Ok(());
            }
        } else {
            info!(index = %self.settings.index_name, dimension, "creating index");
            self.create(dimension).await?;
        }

        for _ in 0..READINESS_ATTEMPTS {
            if let Some(description) = self.describe().await? {
                if description.status.ready {
                    info!(index = %self.settings.index_name, "index is ready");
                    return Ok(());
                }
            }
            tokio::time::sleep(Duration::from_secs(1)).await;
        }

        Err(IngestError::IndexSetup(format!(
            "index {} never became ready",
            self.settings.index_name
        )))
    }

    async fn upsert(&self, records: &[VectorRecord], namespace: &str) -> Result<(), IngestError> {
        if records.is_empty() {
            return Ok(());
        }

        for record in records {
            if record.values.len() != self.settings.dimension {
                return Err(IngestError::DimensionMismatch {
                    embedder: record.values.len(),
                    index: self.settings.dimension,
                });
            }
        }

        let host = self
            .data_host()
            .await
            .map_err(|error| IngestError::IndexSetup(error.to_string()))?;

        let response = self
            .client
            .post(format!("https://{host}/vectors/upsert"))
            .header("Api-Key", &self.settings.api_key)
            .json(&json!({
                "vectors": records,
                "namespace": namespace,
            }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(IngestError::IndexSetup(format!(
                "upsert returned {}",
                response.status()
            )));
        }

        debug!(count = records.len(), namespace, "upserted records");
        Ok(())
    }

    async fn query(
        &self,
        vector: &[f32],
        top_k: usize,
        namespace: &str,
    ) -> Result<Vec<IndexMatch>, ChatError> {
        if vector.len() != self.settings.dimension {
            return Err(ChatError::Request(format!(
                "query vector dimension {} is not {}",
                vector.len(),
                self.settings.dimension
            )));
        }

        let host = self.data_host().await?;
        let response = self
            .client
            .post(format!("https://{host}/query"))
            .header("Api-Key", &self.settings.api_key)
            .json(&json!({
                "vector": vector,
                "topK": top_k,
                "namespace": namespace,
                "includeMetadata": true,
            }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(ChatError::BackendResponse {
                backend: "pinecone".to_string(),
                details: response.status().to_string(),
            });
        }

        let parsed: QueryResponse = response.json().await?;
        Ok(parsed.matches)
    }

    async fn delete(&self) -> Result<(), IngestError> {
        let response = self
            .client
            .delete(format!(
                "{}/indexes/{}",
                self.control_url, self.settings.index_name
            ))
            .header("Api-Key", &self.settings.api_key)
            .send()
            .await?;

        if !response.status().is_success() && response.status() != StatusCode::NOT_FOUND {
            return Err(IngestError::IndexSetup(format!(
                "delete returned {}",
                response.status()
            )));
        }

        // The cached data-plane host belongs to the deleted index. Deleting
        // an index that never existed is a no-op.
        self.host.lock().await.take();
        info!(index = %self.settings.index_name, "index deleted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_response_parses_matches_in_order() {
        let body = r#"{
            "matches": [
                {"id": "web-1", "score": 0.92, "metadata": {"text": "first", "source": "a"}},
                {"id": "web-2", "score": 0.80, "metadata": {"text": "second", "source": "b"}}
            ],
            "namespace": "docs"
        }"#;
        let parsed: QueryResponse = serde_json::from_str(body).unwrap();
        assert_eq!(parsed.matches.len(), 2);
        assert_eq!(parsed.matches[0].id, "web-1");
        assert!(parsed.matches[0].score > parsed.matches[1].score);
    }

    #[tokio::test]
    async fn ensure_rejects_mismatched_dimension() {
        let index = PineconeIndex::new(PineconeSettings::new("key", "document-index", 384));
        let result = index.ensure(512).await;
        assert!(matches!(
            result,
            Err(IngestError::DimensionMismatch {
                embedder: 512,
                index: 384
            })
        ));
    }

    #[tokio::test]
    async fn delete_clears_cached_data_plane_host() {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = [0u8; 1024];
            let _ = socket.read(&mut request).await;
            let _ = socket
                .write_all(b"HTTP/1.1 200 OK\r\ncontent-length: 0\r\n\r\n")
                .await;
        });

        let index = PineconeIndex::new(PineconeSettings::new("key", "document-index", 384))
            .with_control_url(format!("http://{addr}"));
        *index.host.lock().await = Some("stale-host.svc.pinecone.io".to_string());

        index.delete().await.unwrap();
        assert!(index.host.lock().await.is_none());
    }

    #[test]
    fn describe_parses_readiness() {
        let body = r#"{
            "name": "document-index",
            "host": "document-index-abc.svc.pinecone.io",
            "dimension": 384,
            "status": {"ready": true, "state": "Ready"}
        }"#;
        let parsed: IndexDescription = serde_json::from_str(body).unwrap();
        assert!(parsed.status.ready);
        assert_eq!(parsed.dimension, 384);
    }
}
