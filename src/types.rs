//! Error taxonomy shared across the retrieval pipeline.

use thiserror::Error;

/// Errors surfaced by the sitesift pipeline.
///
/// Variants map to the outcomes a caller can act on: `Validation` and
/// `NoContent` are rejected before (or instead of) any index work,
/// `Fetch` carries upstream transport/status failures unmodified, and
/// `Index`/`Embedding` wrap collaborator failures. Best-effort operations
/// (`exists`, `delete_by_url`) never produce these at the pipeline boundary;
/// their callers map failures to safe defaults and log instead.
#[derive(Debug, Error)]
pub enum SiftError {
    /// Request rejected before any network or index work occurred.
    #[error("invalid request: {0}")]
    Validation(String),

    /// Extraction yielded zero usable text blocks for the page.
    #[error("no indexable content found at {url}")]
    NoContent { url: String },

    /// Page fetch failed (unreachable host, timeout, or non-success status).
    #[error("page fetch failed: {0}")]
    Fetch(#[from] reqwest::Error),

    /// Embedding gateway failure.
    #[error("embedding provider error: {0}")]
    Embedding(String),

    /// Similarity index service failure (creation, upsert, or query).
    #[error("similarity index error: {0}")]
    Index(String),

    /// Tokenizer construction or window decoding failure.
    #[error("segmentation failed: {0}")]
    Segmentation(String),
}
