//! Similarity index boundary: vector storage with source-scoped queries.
//!
//! The [`VectorIndex`] trait abstracts over index services so the retrieval
//! orchestrator can run against the remote REST service in production and an
//! in-memory index in tests.

pub mod memory;
pub mod rest;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::types::SiftError;

pub use memory::InMemoryIndex;
pub use rest::RestVectorIndex;

/// Metadata stored alongside each vector and returned with every match.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct VectorMetadata {
    pub content: String,
    pub html_snippet: String,
    pub structural_path: String,
    pub source_url: String,
    pub position: usize,
}

/// A vector plus metadata, ready for upsert.
///
/// `id` is derived deterministically from the source URL and an ordinal so
/// re-indexing the same URL overwrites rather than duplicates.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct VectorRecord {
    pub id: String,
    pub values: Vec<f32>,
    pub metadata: VectorMetadata,
}

impl VectorRecord {
    /// Deterministic vector id for the `ordinal`-th segment of `source_url`.
    pub fn derive_id(source_url: &str, ordinal: usize) -> String {
        format!("{source_url}#{ordinal}")
    }
}

/// A single nearest-neighbor match, rank-ordered by the index.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct IndexMatch {
    pub id: String,
    pub score: f32,
    pub metadata: VectorMetadata,
}

/// Client boundary for the external similarity index service.
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Idempotent readiness gate: creates the backing collection on first
    /// use (configured dimension, cosine metric) and waits until the service
    /// reports it ready. Safe to call concurrently.
    async fn ensure_ready(&self) -> Result<(), SiftError>;

    /// Upserts records in fixed-size batches, sequentially.
    ///
    /// A failing batch aborts the remainder and propagates the error, so a
    /// partial upsert is observable: delivery is at-least-once, not atomic.
    async fn upsert(&self, records: Vec<VectorRecord>) -> Result<(), SiftError>;

    /// Nearest-neighbor search. When `source_filter` is set, only vectors
    /// whose metadata `source_url` equals the filter are eligible.
    async fn query(
        &self,
        vector: &[f32],
        top_k: usize,
        source_filter: Option<&str>,
    ) -> Result<Vec<IndexMatch>, SiftError>;

    /// Deletes all vectors whose metadata `source_url` equals `url`.
    ///
    /// Maintenance operation off the critical path; callers are expected to
    /// map failures to a logged no-op rather than propagate them.
    async fn delete_by_url(&self, url: &str) -> Result<(), SiftError>;

    /// Configured vector dimension.
    fn dimension(&self) -> usize;

    /// Best-effort probe for whether `url` has any indexed vectors.
    ///
    /// Implemented as a zero-vector query with `top_k = 1` and the source
    /// filter. Errors are deliberately mapped to `false` ("not indexed"):
    /// this gates a re-indexing optimization, not correctness, and a
    /// duplicate re-index beats failing the request.
    async fn exists(&self, url: &str) -> bool {
        let probe = vec![0.0f32; self.dimension()];
        match self.query(&probe, 1, Some(url)).await {
            Ok(matches) => !matches.is_empty(),
            Err(err) => {
                tracing::warn!(url, error = %err, "exists probe failed; treating as not indexed");
                false
            }
        }
    }
}
