//! Token-window segmentation of extracted text blocks.
//!
//! Each [`TextBlock`] becomes one or more [`Segment`]s bounded by a maximum
//! token count, with consecutive windows of the same block overlapping by a
//! fixed token count. Segments are the unit that gets embedded and indexed.

use tiktoken_rs::{CoreBPE, cl100k_base};

use crate::extract::TextBlock;
use crate::types::SiftError;

/// A bounded token window derived from exactly one [`TextBlock`].
///
/// `segment_index` is 0 for a block that fit in a single window, else
/// increases per window within that block. Non-content fields are copied
/// unchanged from the parent block, so multiple segments may share
/// `position`/`structural_path`/`html_snippet` but never
/// `(position, segment_index)`.
#[derive(Clone, Debug, PartialEq)]
pub struct Segment {
    pub content: String,
    pub html_snippet: String,
    pub structural_path: String,
    pub position: usize,
    pub token_count: usize,
    pub segment_index: usize,
}

/// Splits text blocks into overlapping token windows.
///
/// Requires `overlap_tokens < max_tokens` so every window makes forward
/// progress; construction fails otherwise. Segmentation is deterministic:
/// the same input always yields the same windows.
pub struct Segmenter {
    bpe: CoreBPE,
    max_tokens: usize,
    overlap_tokens: usize,
}

impl Segmenter {
    /// Builds a segmenter over the cl100k BPE vocabulary.
    pub fn new(max_tokens: usize, overlap_tokens: usize) -> Result<Self, SiftError> {
        if max_tokens == 0 {
            return Err(SiftError::Segmentation(
                "max_tokens must be greater than zero".to_string(),
            ));
        }
        if overlap_tokens >= max_tokens {
            return Err(SiftError::Segmentation(format!(
                "overlap_tokens ({overlap_tokens}) must be smaller than max_tokens ({max_tokens})"
            )));
        }
        let bpe = cl100k_base().map_err(|err| SiftError::Segmentation(err.to_string()))?;
        Ok(Self {
            bpe,
            max_tokens,
            overlap_tokens,
        })
    }

    pub fn max_tokens(&self) -> usize {
        self.max_tokens
    }

    pub fn overlap_tokens(&self) -> usize {
        self.overlap_tokens
    }

    /// Token length of `text` under the segmenter's vocabulary.
    pub fn token_count(&self, text: &str) -> usize {
        self.bpe.encode_ordinary(text).len()
    }

    /// Segments every block into bounded token windows.
    ///
    /// Blocks whose token length fits within `max_tokens` produce a single
    /// segment carrying the original text verbatim. Longer blocks produce
    /// sliding windows of `max_tokens` tokens advancing by
    /// `max_tokens - overlap_tokens`, the final window absorbing the
    /// remainder. Window text is decoded from the token slice, which may
    /// normalize whitespace relative to the source; that is expected.
    ///
    /// Precondition: upstream extraction has already dropped blocks below the
    /// minimum character threshold, so no block tokenizes to zero tokens.
    pub fn segment(&self, blocks: &[TextBlock]) -> Result<Vec<Segment>, SiftError> {
        let mut segments = Vec::new();

        for block in blocks {
            let tokens = self.bpe.encode_ordinary(&block.text);

            if tokens.len() <= self.max_tokens {
                segments.push(Segment {
                    content: block.text.clone(),
                    html_snippet: block.html_snippet.clone(),
                    structural_path: block.structural_path.clone(),
                    position: block.position,
                    token_count: tokens.len(),
                    segment_index: 0,
                });
                continue;
            }

            let mut start = 0usize;
            let mut segment_index = 0usize;
            while start < tokens.len() {
                let end = (start + self.max_tokens).min(tokens.len());
                let window = tokens[start..end].to_vec();
                let token_count = window.len();
                let content = self
                    .bpe
                    .decode(window)
                    .map_err(|err| SiftError::Segmentation(err.to_string()))?;

                segments.push(Segment {
                    content,
                    html_snippet: block.html_snippet.clone(),
                    structural_path: block.structural_path.clone(),
                    position: block.position,
                    token_count,
                    segment_index,
                });

                start = if end < tokens.len() {
                    end - self.overlap_tokens
                } else {
                    end
                };
                segment_index += 1;
            }
        }

        tracing::debug!(
            blocks = blocks.len(),
            segments = segments.len(),
            "segmented content"
        );
        Ok(segments)
    }
}
