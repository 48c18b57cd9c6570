//! Process-scoped configuration for the retrieval pipeline.
//!
//! Everything is constructed explicitly at startup and injected into
//! [`crate::search::SearchPipeline`]; there are no ambient globals. Values
//! resolve from the environment (via `dotenvy`) with the same defaults the
//! pipeline was tuned with.

use std::time::Duration;

/// Connection settings for the external similarity index service.
#[derive(Clone, Debug)]
pub struct IndexConfig {
    /// Base URL of the index service REST API.
    pub base_url: String,
    /// Optional `api-key` header value.
    pub api_key: Option<String>,
    /// Single logical collection per deployment.
    pub collection: String,
    /// Vector dimension; must match the embedding model's output width.
    pub dimension: usize,
    /// Upsert partition size. Failure of one batch aborts the rest.
    pub upsert_batch_size: usize,
    /// Poll interval while waiting for a freshly created collection.
    pub ready_poll_interval: Duration,
    /// Upper bound on readiness polling; past it the error is fatal.
    pub ready_timeout: Duration,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:6333".to_string(),
            api_key: None,
            collection: "page-fragments".to_string(),
            dimension: 384,
            upsert_batch_size: 100,
            ready_poll_interval: Duration::from_secs(1),
            ready_timeout: Duration::from_secs(60),
        }
    }
}

/// Connection settings for the embedding inference endpoint.
#[derive(Clone, Debug)]
pub struct EmbeddingConfig {
    /// Full inference endpoint URL.
    pub endpoint: String,
    /// Optional `api-key` header value.
    pub api_key: Option<String>,
    /// Model identifier sent with each batch.
    pub model: String,
    /// Output vector width.
    pub dimension: usize,
    /// Retry budget for retryable statuses and transport errors.
    pub max_retries: usize,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:8080/inference/text".to_string(),
            api_key: None,
            model: "all-MiniLM-L6-v2".to_string(),
            dimension: 384,
            max_retries: 3,
        }
    }
}

/// Tunables for the orchestrated search itself.
#[derive(Clone, Debug)]
pub struct RetrievalConfig {
    /// Maximum tokens per segment window.
    pub max_tokens: usize,
    /// Token overlap between consecutive windows of one block.
    pub overlap_tokens: usize,
    /// Caller-visible result cap.
    pub result_limit: usize,
    /// Over-fetch for the primary filtered query, anticipating dedup losses.
    pub overfetch_limit: usize,
    /// Top-k for the unfiltered fallback query.
    pub fallback_limit: usize,
    /// Consistency window between upsert and first query. A tunable, not a
    /// correctness primitive; set to zero in tests.
    pub post_upsert_delay: Duration,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            max_tokens: 500,
            overlap_tokens: 50,
            result_limit: 10,
            overfetch_limit: 20,
            fallback_limit: 10,
            post_upsert_delay: Duration::from_secs(2),
        }
    }
}

const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36";

/// Transport settings for page fetches.
#[derive(Clone, Debug)]
pub struct FetchConfig {
    pub timeout: Duration,
    pub user_agent: String,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

/// Bounds for the in-process response cache.
#[derive(Clone, Debug)]
pub struct CacheConfig {
    pub capacity: usize,
    pub ttl: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            capacity: 100,
            ttl: Duration::from_secs(3600),
        }
    }
}

/// Top-level configuration bundle.
#[derive(Clone, Debug, Default)]
pub struct SiftConfig {
    pub index: IndexConfig,
    pub embedding: EmbeddingConfig,
    pub retrieval: RetrievalConfig,
    pub cache: CacheConfig,
    pub fetch: FetchConfig,
}

impl SiftConfig {
    /// Resolves configuration from the environment, falling back to defaults.
    ///
    /// Reads a `.env` file when present. Recognized variables:
    /// `SITESIFT_INDEX_URL`, `SITESIFT_INDEX_API_KEY`, `SITESIFT_COLLECTION`,
    /// `SITESIFT_DIMENSION`, `SITESIFT_EMBED_URL`, `SITESIFT_EMBED_API_KEY`,
    /// `SITESIFT_EMBED_MODEL`.
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();
        let mut config = Self::default();

        if let Ok(value) = std::env::var("SITESIFT_INDEX_URL") {
            config.index.base_url = value;
        }
        if let Ok(value) = std::env::var("SITESIFT_INDEX_API_KEY") {
            config.index.api_key = Some(value);
        }
        if let Ok(value) = std::env::var("SITESIFT_COLLECTION") {
            config.index.collection = value;
        }
        if let Ok(value) = std::env::var("SITESIFT_DIMENSION") {
            if let Ok(dimension) = value.parse::<usize>() {
                config.index.dimension = dimension;
                config.embedding.dimension = dimension;
            }
        }
        if let Ok(value) = std::env::var("SITESIFT_EMBED_URL") {
            config.embedding.endpoint = value;
        }
        if let Ok(value) = std::env::var("SITESIFT_EMBED_API_KEY") {
            config.embedding.api_key = Some(value);
        }
        if let Ok(value) = std::env::var("SITESIFT_EMBED_MODEL") {
            config.embedding.model = value;
        }

        config
    }

    #[must_use]
    pub fn with_retrieval(mut self, retrieval: RetrievalConfig) -> Self {
        self.retrieval = retrieval;
        self
    }

    #[must_use]
    pub fn with_cache(mut self, cache: CacheConfig) -> Self {
        self.cache = cache;
        self
    }
}
