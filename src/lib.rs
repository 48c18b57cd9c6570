//! ```text
//! Caller ──► SearchRequest { url, query }
//!                   │
//!                   ▼
//! fetch::PageFetcher ──► raw HTML ──► extract::ContentExtractor ──► TextBlock[]
//!                                                     │
//!                                                     ▼
//!                               segment::Segmenter ──► Segment[] (token windows)
//!                                                     │
//!                                                     ▼
//!            embeddings::EmbeddingProvider ──► vectors ──► index::VectorIndex (upsert)
//!
//! query text ──► embeddings ──► vector ──► index (filtered top-k)
//!                                              │
//!                                              ▼
//!         search::SearchPipeline (broad fallback + dedup) ──► SearchResult[]
//! ```
//!
pub mod cache;
pub mod config;
pub mod embeddings;
pub mod extract;
pub mod fetch;
pub mod index;
pub mod search;
pub mod segment;
pub mod types;

pub use config::SiftConfig;
pub use embeddings::{EmbeddingProvider, MockEmbeddingProvider, RestEmbeddingProvider};
pub use extract::{ContentExtractor, TextBlock};
pub use index::memory::InMemoryIndex;
pub use index::rest::RestVectorIndex;
pub use index::{IndexMatch, VectorIndex, VectorMetadata, VectorRecord};
pub use search::{SearchPipeline, SearchRequest, SearchResponse, SearchResult};
pub use segment::{Segment, Segmenter};
pub use types::SiftError;
