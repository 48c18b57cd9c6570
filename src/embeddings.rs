//! Embedding gateway: maps batches of text to fixed-dimension vectors.

use std::hash::{DefaultHasher, Hash, Hasher};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderValue};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};

use crate::config::EmbeddingConfig;
use crate::types::SiftError;

/// Boundary trait for the embedding model collaborator.
///
/// Implementations must be deterministic: identical input batches produce
/// identical vectors, all of width [`dimension`](Self::dimension).
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Embeds a batch of strings, one vector per input, in input order.
    async fn embed_batch(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>, SiftError>;

    /// Output vector width.
    fn dimension(&self) -> usize;

    /// Human-readable provider identifier for logs.
    fn name(&self) -> &str;
}

#[derive(Serialize)]
struct InferenceRequest<'a> {
    model: &'a str,
    inputs: &'a [String],
}

#[derive(Deserialize)]
struct InferenceResponse {
    embeddings: Vec<Vec<f32>>,
}

/// Embedding client for a REST inference endpoint.
///
/// Sends the whole batch in a single request and retries retryable statuses
/// and transport errors with a linear backoff.
pub struct RestEmbeddingProvider {
    client: Client,
    endpoint: String,
    model: String,
    dimension: usize,
    max_retries: usize,
}

impl RestEmbeddingProvider {
    pub fn new(config: &EmbeddingConfig) -> Result<Self, SiftError> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        if let Some(api_key) = &config.api_key {
            let value = HeaderValue::from_str(api_key.trim())
                .map_err(|_| SiftError::Embedding("invalid embedding API key".to_string()))?;
            headers.insert("api-key", value);
        }
        let client = Client::builder()
            .default_headers(headers)
            .use_rustls_tls()
            .build()
            .map_err(|err| SiftError::Embedding(err.to_string()))?;

        Ok(Self {
            client,
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            dimension: config.dimension,
            max_retries: config.max_retries.max(1),
        })
    }

    fn retry_backoff(attempt: usize) -> Duration {
        Duration::from_millis(200 * attempt as u64)
    }

    fn should_retry(status: StatusCode) -> bool {
        status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
    }
}

#[async_trait]
impl EmbeddingProvider for RestEmbeddingProvider {
    async fn embed_batch(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>, SiftError> {
        if inputs.is_empty() {
            return Ok(Vec::new());
        }

        let request = InferenceRequest {
            model: &self.model,
            inputs,
        };

        let mut attempt = 0usize;
        loop {
            let response = self.client.post(&self.endpoint).json(&request).send().await;
            match response {
                Ok(resp) => {
                    let status = resp.status();
                    if status.is_success() {
                        let payload: InferenceResponse = resp
                            .json()
                            .await
                            .map_err(|err| SiftError::Embedding(err.to_string()))?;
                        if payload.embeddings.len() != inputs.len() {
                            return Err(SiftError::Embedding(format!(
                                "expected {} embeddings, got {}",
                                inputs.len(),
                                payload.embeddings.len()
                            )));
                        }
                        return Ok(payload.embeddings);
                    }
                    if Self::should_retry(status) && attempt + 1 < self.max_retries {
                        attempt += 1;
                        tokio::time::sleep(Self::retry_backoff(attempt)).await;
                        continue;
                    }
                    let body = resp.text().await.unwrap_or_default();
                    return Err(SiftError::Embedding(format!(
                        "inference request failed ({status}): {body}"
                    )));
                }
                Err(err) => {
                    if (err.is_connect() || err.is_timeout() || err.is_request())
                        && attempt + 1 < self.max_retries
                    {
                        attempt += 1;
                        tokio::time::sleep(Self::retry_backoff(attempt)).await;
                        continue;
                    }
                    return Err(SiftError::Embedding(err.to_string()));
                }
            }
        }
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn name(&self) -> &str {
        &self.model
    }
}

/// Deterministic hash-based embeddings for tests and offline runs.
///
/// Identical texts map to identical unit vectors; different texts map to
/// different vectors with overwhelming probability. No semantic meaning.
pub struct MockEmbeddingProvider {
    dimension: usize,
}

impl MockEmbeddingProvider {
    pub fn new() -> Self {
        Self { dimension: 384 }
    }

    #[must_use]
    pub fn with_dimension(mut self, dimension: usize) -> Self {
        self.dimension = dimension;
        self
    }

    fn embed_one(&self, text: &str) -> Vec<f32> {
        let mut hasher = DefaultHasher::new();
        text.hash(&mut hasher);
        let mut state = hasher.finish() | 1;

        let mut vector = Vec::with_capacity(self.dimension);
        for _ in 0..self.dimension {
            // xorshift64
            state ^= state << 13;
            state ^= state >> 7;
            state ^= state << 17;
            let unit = (state >> 11) as f32 / (1u64 << 53) as f32;
            vector.push(unit * 2.0 - 1.0);
        }

        let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            for value in &mut vector {
                *value /= norm;
            }
        }
        vector
    }
}

impl Default for MockEmbeddingProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EmbeddingProvider for MockEmbeddingProvider {
    async fn embed_batch(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>, SiftError> {
        Ok(inputs.iter().map(|text| self.embed_one(text)).collect())
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn name(&self) -> &str {
        "mock"
    }
}
