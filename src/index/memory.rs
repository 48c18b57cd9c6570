//! Exact in-memory similarity index for tests and local runs.

use async_trait::async_trait;
use parking_lot::RwLock;

use super::{IndexMatch, VectorIndex, VectorRecord};
use crate::types::SiftError;

/// Brute-force cosine index behind a read-write lock.
///
/// Upserts replace rows with matching ids, mirroring the overwrite semantics
/// of the remote service. Queries scan every row, so this is only suitable
/// for tests and small local datasets.
pub struct InMemoryIndex {
    dimension: usize,
    rows: RwLock<Vec<VectorRecord>>,
}

impl InMemoryIndex {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            rows: RwLock::new(Vec::new()),
        }
    }

    /// Number of stored vectors.
    pub fn len(&self) -> usize {
        self.rows.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.read().is_empty()
    }
}

#[async_trait]
impl VectorIndex for InMemoryIndex {
    async fn ensure_ready(&self) -> Result<(), SiftError> {
        Ok(())
    }

    async fn upsert(&self, records: Vec<VectorRecord>) -> Result<(), SiftError> {
        for record in &records {
            if record.values.len() != self.dimension {
                return Err(SiftError::Index(format!(
                    "vector {} has dimension {}, index expects {}",
                    record.id,
                    record.values.len(),
                    self.dimension
                )));
            }
        }

        let mut rows = self.rows.write();
        for record in records {
            if let Some(existing) = rows.iter_mut().find(|row| row.id == record.id) {
                *existing = record;
            } else {
                rows.push(record);
            }
        }
        Ok(())
    }

    async fn query(
        &self,
        vector: &[f32],
        top_k: usize,
        source_filter: Option<&str>,
    ) -> Result<Vec<IndexMatch>, SiftError> {
        let rows = self.rows.read();
        let mut matches: Vec<IndexMatch> = rows
            .iter()
            .filter(|row| source_filter.is_none_or(|url| row.metadata.source_url == url))
            .map(|row| IndexMatch {
                id: row.id.clone(),
                score: cosine_similarity(vector, &row.values),
                metadata: row.metadata.clone(),
            })
            .collect();

        matches.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        matches.truncate(top_k);
        Ok(matches)
    }

    async fn delete_by_url(&self, url: &str) -> Result<(), SiftError> {
        self.rows.write().retain(|row| row.metadata.source_url != url);
        Ok(())
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

/// Cosine similarity; zero for degenerate (zero-norm) inputs.
fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}
