//! Retrieval orchestrator: ties fetch, extraction, segmentation, embedding,
//! and the similarity index into one search operation.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::cache::ResponseCache;
use crate::config::{RetrievalConfig, SiftConfig};
use crate::embeddings::{EmbeddingProvider, RestEmbeddingProvider};
use crate::extract::ContentExtractor;
use crate::fetch::PageFetcher;
use crate::index::{IndexMatch, RestVectorIndex, VectorIndex, VectorRecord, VectorMetadata};
use crate::segment::{Segment, Segmenter};
use crate::types::SiftError;

/// One retrieval request: which page, and what to look for on it.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SearchRequest {
    pub url: String,
    pub query: String,
}

/// A ranked page fragment.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct SearchResult {
    /// Cosine similarity clamped into `[0, 1]`.
    pub score: f32,
    /// `floor(score * 100)`.
    pub percentage: u8,
    pub structural_path: String,
    pub content: String,
    pub html_snippet: String,
    pub source_url: String,
}

impl From<IndexMatch> for SearchResult {
    fn from(m: IndexMatch) -> Self {
        // Cosine similarity can overshoot 1.0 through floating-point error.
        let score = m.score.clamp(0.0, 1.0);
        Self {
            score,
            percentage: (score * 100.0).floor() as u8,
            structural_path: m.metadata.structural_path,
            content: m.metadata.content,
            html_snippet: m.metadata.html_snippet,
            source_url: m.metadata.source_url,
        }
    }
}

/// Response for one retrieval request.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SearchResponse {
    pub results: Vec<SearchResult>,
    /// Number of segments produced from the page on this run.
    pub total_chunks: usize,
    pub query: String,
}

/// Request-scoped retrieval pipeline over injected collaborators.
///
/// Stateless across requests except for the shared index and the response
/// cache; concurrent requests for different URLs are independent. Two
/// concurrent requests for the same not-yet-indexed URL may both index it;
/// deterministic vector ids make that converge to overwrites.
pub struct SearchPipeline {
    embeddings: Arc<dyn EmbeddingProvider>,
    index: Arc<dyn VectorIndex>,
    fetcher: PageFetcher,
    extractor: ContentExtractor,
    segmenter: Segmenter,
    cache: ResponseCache,
    retrieval: RetrievalConfig,
}

impl SearchPipeline {
    pub fn builder() -> SearchPipelineBuilder {
        SearchPipelineBuilder::default()
    }

    /// Runs one retrieval request end to end.
    ///
    /// Order of operations: validate, consult the response cache, fetch and
    /// extract the page, segment, index-if-absent, query with a source
    /// filter, broad fallback when the filtered query comes back empty,
    /// dedup, truncate.
    pub async fn search(&self, request: SearchRequest) -> Result<SearchResponse, SiftError> {
        let page_url = validate_request(&request)?;

        let cache_key = ResponseCache::key(&request.url, &request.query);
        if let Some(hit) = self.cache.get(&cache_key) {
            tracing::info!(url = %request.url, "returning cached response");
            return Ok(hit);
        }

        tracing::info!(url = %request.url, query = %request.query, "processing search");
        let html = self.fetcher.fetch(&page_url).await?;

        let blocks = self.extractor.extract(&html);
        if blocks.is_empty() {
            return Err(SiftError::NoContent {
                url: request.url.clone(),
            });
        }

        let segments = self.segmenter.segment(&blocks)?;
        let normalized_url = normalize_url(&request.url);

        self.index.ensure_ready().await?;

        if self.index.exists(&normalized_url).await {
            tracing::info!(url = %normalized_url, "URL already indexed, skipping re-indexing");
        } else {
            self.index_segments(&normalized_url, &segments).await?;
            if !self.retrieval.post_upsert_delay.is_zero() {
                // Consistency window for eventually consistent backends.
                tokio::time::sleep(self.retrieval.post_upsert_delay).await;
            }
        }

        let query_vector = self.embed_query(&request.query).await?;
        let mut matches = self
            .index
            .query(
                &query_vector,
                self.retrieval.overfetch_limit,
                Some(&normalized_url),
            )
            .await?;

        if matches.is_empty() {
            tracing::warn!(url = %normalized_url, "filtered query found nothing, trying broad search");
            let broad = self
                .index
                .query(&query_vector, self.retrieval.fallback_limit, None)
                .await?;
            matches = broad
                .into_iter()
                .filter(|m| normalize_url(&m.metadata.source_url) == normalized_url)
                .collect();
            if !matches.is_empty() {
                tracing::info!(recovered = matches.len(), "recovered results via broad search");
            }
        }

        let kept = dedup_by_content(matches, self.retrieval.result_limit);
        tracing::info!(results = kept.len(), "search complete");

        let response = SearchResponse {
            results: kept.into_iter().map(SearchResult::from).collect(),
            total_chunks: segments.len(),
            query: request.query,
        };
        self.cache.insert(cache_key, response.clone());
        Ok(response)
    }

    /// Best-effort removal of a URL's vectors. Failures are logged, not
    /// raised: this is maintenance, not the critical path.
    pub async fn forget_url(&self, url: &str) {
        let normalized = normalize_url(url);
        if let Err(err) = self.index.delete_by_url(&normalized).await {
            tracing::warn!(url = %normalized, error = %err, "failed to clear URL data");
        }
    }

    async fn index_segments(
        &self,
        normalized_url: &str,
        segments: &[Segment],
    ) -> Result<(), SiftError> {
        tracing::info!(segments = segments.len(), url = %normalized_url, "indexing segments");
        let texts: Vec<String> = segments.iter().map(|s| s.content.clone()).collect();
        let vectors = self.embeddings.embed_batch(&texts).await?;
        if vectors.len() != segments.len() {
            return Err(SiftError::Embedding(format!(
                "embedding count mismatch: {} segments, {} vectors",
                segments.len(),
                vectors.len()
            )));
        }

        let records = build_records(normalized_url, segments, vectors);
        self.index.upsert(records).await
    }

    async fn embed_query(&self, query: &str) -> Result<Vec<f32>, SiftError> {
        let mut vectors = self.embeddings.embed_batch(&[query.to_string()]).await?;
        vectors
            .pop()
            .ok_or_else(|| SiftError::Embedding("empty embedding response for query".to_string()))
    }
}

/// Builder wiring collaborators into a pipeline.
///
/// Defaults construct the REST embedding provider and REST index from the
/// supplied configuration; tests inject mocks through the same seams.
#[derive(Default)]
pub struct SearchPipelineBuilder {
    config: SiftConfig,
    embeddings: Option<Arc<dyn EmbeddingProvider>>,
    index: Option<Arc<dyn VectorIndex>>,
}

impl SearchPipelineBuilder {
    #[must_use]
    pub fn with_config(mut self, config: SiftConfig) -> Self {
        self.config = config;
        self
    }

    #[must_use]
    pub fn with_embedding_provider(mut self, provider: Arc<dyn EmbeddingProvider>) -> Self {
        self.embeddings = Some(provider);
        self
    }

    #[must_use]
    pub fn with_index(mut self, index: Arc<dyn VectorIndex>) -> Self {
        self.index = Some(index);
        self
    }

    pub fn build(self) -> Result<SearchPipeline, SiftError> {
        let embeddings: Arc<dyn EmbeddingProvider> = match self.embeddings {
            Some(provider) => provider,
            None => Arc::new(RestEmbeddingProvider::new(&self.config.embedding)?),
        };
        let index: Arc<dyn VectorIndex> = match self.index {
            Some(index) => index,
            None => Arc::new(RestVectorIndex::new(&self.config.index)?),
        };

        if embeddings.dimension() != index.dimension() {
            return Err(SiftError::Index(format!(
                "embedding dimension {} does not match index dimension {}",
                embeddings.dimension(),
                index.dimension()
            )));
        }

        let segmenter = Segmenter::new(
            self.config.retrieval.max_tokens,
            self.config.retrieval.overlap_tokens,
        )?;

        Ok(SearchPipeline {
            embeddings,
            index,
            fetcher: PageFetcher::new(&self.config.fetch)?,
            extractor: ContentExtractor::default(),
            segmenter,
            cache: ResponseCache::new(&self.config.cache),
            retrieval: self.config.retrieval,
        })
    }
}

/// Canonical indexing/query key: URL with trailing slashes stripped.
pub fn normalize_url(url: &str) -> String {
    url.trim_end_matches('/').to_string()
}

/// Rejects bad requests before any network or index work; returns the
/// parsed page URL on success.
fn validate_request(request: &SearchRequest) -> Result<Url, SiftError> {
    let url = Url::parse(&request.url)
        .map_err(|err| SiftError::Validation(format!("invalid URL format: {err}")))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(SiftError::Validation(format!(
            "unsupported URL scheme '{}'",
            url.scheme()
        )));
    }

    let query_chars = request.query.chars().count();
    if query_chars < 2 {
        return Err(SiftError::Validation(
            "query too short (min 2 chars)".to_string(),
        ));
    }
    if query_chars > 200 {
        return Err(SiftError::Validation(
            "query too long (max 200 chars)".to_string(),
        ));
    }
    Ok(url)
}

fn build_records(
    normalized_url: &str,
    segments: &[Segment],
    vectors: Vec<Vec<f32>>,
) -> Vec<VectorRecord> {
    segments
        .iter()
        .zip(vectors)
        .enumerate()
        .map(|(ordinal, (segment, values))| VectorRecord {
            id: VectorRecord::derive_id(normalized_url, ordinal),
            values,
            metadata: VectorMetadata {
                content: segment.content.clone(),
                html_snippet: segment.html_snippet.clone(),
                structural_path: segment.structural_path.clone(),
                source_url: normalized_url.to_string(),
                position: segment.position,
            },
        })
        .collect()
}

/// Keeps the first occurrence of each whitespace-collapsed content signature,
/// preserving incoming rank order, up to `limit` entries.
///
/// Signature collisions across different structural paths are treated as
/// duplicates on purpose: the same rendered text wins once.
fn dedup_by_content(matches: Vec<IndexMatch>, limit: usize) -> Vec<IndexMatch> {
    let mut seen = std::collections::HashSet::new();
    let mut kept = Vec::new();

    for m in matches {
        let signature = m
            .metadata
            .content
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ");
        if seen.insert(signature) {
            kept.push(m);
            if kept.len() >= limit {
                break;
            }
        }
    }
    kept
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(url: &str, query: &str) -> SearchRequest {
        SearchRequest {
            url: url.to_string(),
            query: query.to_string(),
        }
    }

    fn index_match(content: &str, path: &str, score: f32) -> IndexMatch {
        IndexMatch {
            id: format!("https://a.com#{path}"),
            score,
            metadata: VectorMetadata {
                content: content.to_string(),
                html_snippet: format!("<p>{content}</p>"),
                structural_path: path.to_string(),
                source_url: "https://a.com".to_string(),
                position: 0,
            },
        }
    }

    #[test]
    fn query_length_bounds_are_inclusive() {
        assert!(validate_request(&request("https://a.com", "ab")).is_ok());
        assert!(validate_request(&request("https://a.com", &"q".repeat(200))).is_ok());

        assert!(matches!(
            validate_request(&request("https://a.com", "a")),
            Err(SiftError::Validation(_))
        ));
        assert!(matches!(
            validate_request(&request("https://a.com", &"q".repeat(201))),
            Err(SiftError::Validation(_))
        ));
    }

    #[test]
    fn rejects_malformed_and_non_http_urls() {
        assert!(matches!(
            validate_request(&request("not a url", "rust")),
            Err(SiftError::Validation(_))
        ));
        assert!(matches!(
            validate_request(&request("ftp://a.com/file", "rust")),
            Err(SiftError::Validation(_))
        ));
        let url = validate_request(&request("http://a.com/page", "rust")).unwrap();
        assert_eq!(url.as_str(), "http://a.com/page");
    }

    #[test]
    fn normalize_strips_trailing_slashes() {
        assert_eq!(normalize_url("https://a.com/"), "https://a.com");
        assert_eq!(normalize_url("https://a.com//"), "https://a.com");
        assert_eq!(normalize_url("https://a.com/page"), "https://a.com/page");
    }

    #[test]
    fn dedup_keeps_first_by_rank_order() {
        let matches = vec![
            index_match("repeated   content here", "div.a > p", 0.9),
            index_match("unique content", "div.b > p", 0.8),
            index_match("repeated content here", "div.c > p", 0.7),
        ];

        let kept = dedup_by_content(matches, 10);
        assert_eq!(kept.len(), 2);
        assert_eq!(kept[0].metadata.structural_path, "div.a > p");
        assert_eq!(kept[1].metadata.content, "unique content");
    }

    #[test]
    fn dedup_stops_at_limit() {
        let matches: Vec<IndexMatch> = (0..30)
            .map(|i| index_match(&format!("distinct content number {i}"), "p", 0.5))
            .collect();

        let kept = dedup_by_content(matches, 10);
        assert_eq!(kept.len(), 10);
        assert_eq!(kept[0].metadata.content, "distinct content number 0");
    }

    #[test]
    fn result_conversion_clamps_score_and_floors_percentage() {
        let overshoot = SearchResult::from(index_match("x", "p", 1.000001));
        assert_eq!(overshoot.score, 1.0);
        assert_eq!(overshoot.percentage, 100);

        let partial = SearchResult::from(index_match("x", "p", 0.4567));
        assert!((partial.score - 0.4567).abs() < 1e-6);
        assert_eq!(partial.percentage, 45);

        let negative = SearchResult::from(index_match("x", "p", -0.2));
        assert_eq!(negative.score, 0.0);
        assert_eq!(negative.percentage, 0);
    }

    #[test]
    fn records_use_deterministic_ordinal_ids() {
        let segments = vec![
            Segment {
                content: "first".to_string(),
                html_snippet: "<p>first</p>".to_string(),
                structural_path: "body > p".to_string(),
                position: 0,
                token_count: 1,
                segment_index: 0,
            },
            Segment {
                content: "second".to_string(),
                html_snippet: "<p>second</p>".to_string(),
                structural_path: "body > p".to_string(),
                position: 1,
                token_count: 1,
                segment_index: 0,
            },
        ];
        let vectors = vec![vec![0.1], vec![0.2]];

        let records = build_records("https://a.com", &segments, vectors);
        assert_eq!(records[0].id, "https://a.com#0");
        assert_eq!(records[1].id, "https://a.com#1");
        assert_eq!(records[0].metadata.source_url, "https://a.com");
        assert_eq!(records[1].metadata.position, 1);
    }
}
