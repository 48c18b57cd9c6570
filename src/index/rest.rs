//! REST client for the external similarity index service.

use std::time::Instant;

use async_trait::async_trait;
use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderValue};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tokio::sync::OnceCell;

use super::{IndexMatch, VectorIndex, VectorRecord};
use crate::config::IndexConfig;
use crate::types::SiftError;

#[derive(Serialize)]
struct CreateCollectionRequest<'a> {
    name: &'a str,
    dimension: usize,
    metric: &'a str,
}

#[derive(Deserialize)]
struct CollectionStatus {
    #[serde(default)]
    ready: bool,
}

#[derive(Serialize)]
struct UpsertRequest<'a> {
    vectors: &'a [VectorRecord],
}

#[derive(Serialize)]
struct QueryRequest<'a> {
    vector: &'a [f32],
    top_k: usize,
    include_metadata: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    filter: Option<serde_json::Value>,
}

#[derive(Deserialize)]
struct QueryResponse {
    #[serde(default)]
    matches: Vec<IndexMatch>,
}

#[derive(Serialize)]
struct DeleteRequest {
    filter: serde_json::Value,
}

fn source_url_filter(url: &str) -> serde_json::Value {
    serde_json::json!({ "source_url": { "$eq": url } })
}

/// Client for one logical collection on a remote similarity index.
///
/// Collection creation is lazy: the first call into [`VectorIndex::ensure_ready`]
/// creates the collection (cosine metric, configured dimension) if absent and
/// polls readiness. Concurrent callers share a single initialization via a
/// one-time guard.
pub struct RestVectorIndex {
    client: Client,
    base_url: String,
    collection: String,
    dimension: usize,
    upsert_batch_size: usize,
    ready_poll_interval: std::time::Duration,
    ready_timeout: std::time::Duration,
    ready: OnceCell<()>,
}

impl RestVectorIndex {
    pub fn new(config: &IndexConfig) -> Result<Self, SiftError> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        if let Some(api_key) = &config.api_key {
            let value = HeaderValue::from_str(api_key.trim())
                .map_err(|_| SiftError::Index("invalid index API key".to_string()))?;
            headers.insert("api-key", value);
        }
        let client = Client::builder()
            .default_headers(headers)
            .use_rustls_tls()
            .build()
            .map_err(|err| SiftError::Index(err.to_string()))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            collection: config.collection.clone(),
            dimension: config.dimension,
            upsert_batch_size: config.upsert_batch_size.max(1),
            ready_poll_interval: config.ready_poll_interval,
            ready_timeout: config.ready_timeout,
            ready: OnceCell::new(),
        })
    }

    fn collection_url(&self) -> String {
        format!("{}/collections/{}", self.base_url, self.collection)
    }

    async fn collection_status(&self) -> Result<Option<CollectionStatus>, SiftError> {
        let response = self
            .client
            .get(self.collection_url())
            .send()
            .await
            .map_err(|err| SiftError::Index(err.to_string()))?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let response = response
            .error_for_status()
            .map_err(|err| SiftError::Index(err.to_string()))?;
        let status = response
            .json::<CollectionStatus>()
            .await
            .map_err(|err| SiftError::Index(err.to_string()))?;
        Ok(Some(status))
    }

    async fn create_and_wait(&self) -> Result<(), SiftError> {
        if self.collection_status().await?.is_none() {
            tracing::info!(collection = %self.collection, dimension = self.dimension, "creating index collection");
            let request = CreateCollectionRequest {
                name: &self.collection,
                dimension: self.dimension,
                metric: "cosine",
            };
            self.client
                .post(format!("{}/collections", self.base_url))
                .json(&request)
                .send()
                .await
                .map_err(|err| SiftError::Index(err.to_string()))?
                .error_for_status()
                .map_err(|err| SiftError::Index(err.to_string()))?;
        }

        let deadline = Instant::now() + self.ready_timeout;
        loop {
            match self.collection_status().await? {
                Some(status) if status.ready => return Ok(()),
                _ => {}
            }
            if Instant::now() >= deadline {
                return Err(SiftError::Index(format!(
                    "collection '{}' not ready after {:?}",
                    self.collection, self.ready_timeout
                )));
            }
            tokio::time::sleep(self.ready_poll_interval).await;
        }
    }
}

#[async_trait]
impl VectorIndex for RestVectorIndex {
    async fn ensure_ready(&self) -> Result<(), SiftError> {
        self.ready
            .get_or_try_init(|| self.create_and_wait())
            .await?;
        Ok(())
    }

    async fn upsert(&self, records: Vec<VectorRecord>) -> Result<(), SiftError> {
        if records.is_empty() {
            return Ok(());
        }
        let total_batches = records.len().div_ceil(self.upsert_batch_size);
        tracing::info!(
            vectors = records.len(),
            batches = total_batches,
            "upserting vectors"
        );

        for batch in records.chunks(self.upsert_batch_size) {
            let request = UpsertRequest { vectors: batch };
            self.client
                .post(format!("{}/vectors/upsert", self.collection_url()))
                .json(&request)
                .send()
                .await
                .map_err(|err| SiftError::Index(err.to_string()))?
                .error_for_status()
                .map_err(|err| SiftError::Index(err.to_string()))?;
        }
        Ok(())
    }

    async fn query(
        &self,
        vector: &[f32],
        top_k: usize,
        source_filter: Option<&str>,
    ) -> Result<Vec<IndexMatch>, SiftError> {
        let request = QueryRequest {
            vector,
            top_k,
            include_metadata: true,
            filter: source_filter.map(source_url_filter),
        };

        let response = self
            .client
            .post(format!("{}/query", self.collection_url()))
            .json(&request)
            .send()
            .await
            .map_err(|err| SiftError::Index(err.to_string()))?
            .error_for_status()
            .map_err(|err| SiftError::Index(err.to_string()))?;

        let payload = response
            .json::<QueryResponse>()
            .await
            .map_err(|err| SiftError::Index(err.to_string()))?;
        Ok(payload.matches)
    }

    async fn delete_by_url(&self, url: &str) -> Result<(), SiftError> {
        let request = DeleteRequest {
            filter: source_url_filter(url),
        };
        self.client
            .post(format!("{}/vectors/delete", self.collection_url()))
            .json(&request)
            .send()
            .await
            .map_err(|err| SiftError::Index(err.to_string()))?
            .error_for_status()
            .map_err(|err| SiftError::Index(err.to_string()))?;
        Ok(())
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}
