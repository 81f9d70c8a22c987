//! Exact cosine-similarity search over a [`VectorIndex`].
//!
//! Every query is compared with every stored vector; there is no approximate structure. For
//! the corpus sizes this crate targets (thousands of chunks) a linear scan answers in well
//! under a millisecond.

use super::vector_index::VectorIndex;
use crate::error::{Result, RetrieverError};
use minirag_context::Chunk;
use serde::Serialize;

/// A chunk together with its similarity to the query.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchResult {
    pub chunk: Chunk,
    pub score: f32,
}

/// Cosine similarity of `a` and `b`.
///
/// Returns 0.0 when the lengths differ or either vector has zero norm, never NaN for finite
/// input.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }

    let (mut dot, mut norm_a, mut norm_b) = (0.0f32, 0.0f32, 0.0f32);
    for (x, y) in a.iter().zip(b) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a.sqrt() * norm_b.sqrt())
}

/// Rank the index against `query`.
///
/// Chunks scoring below `threshold` are dropped, the rest are sorted by descending score
/// (ties keep index order) and truncated to `top_k` unless it is 0. A query of the wrong
/// dimension yields no results; use [`try_search`] to tell that apart from "nothing matched".
pub fn search(index: &VectorIndex, query: &[f32], top_k: usize, threshold: f32) -> Vec<SearchResult> {
    try_search(index, query, top_k, threshold).unwrap_or_default()
}

/// Like [`search`] but reports a query of the wrong dimension as
/// [`RetrieverError::DimensionMismatch`].
pub fn try_search(
    index: &VectorIndex,
    query: &[f32],
    top_k: usize,
    threshold: f32,
) -> Result<Vec<SearchResult>> {
    if query.len() != index.dimension() {
        return Err(RetrieverError::DimensionMismatch {
            expected: index.dimension(),
            actual: query.len(),
        });
    }

    let mut scored: Vec<(usize, f32)> = index
        .vectors()
        .iter()
        .enumerate()
        .map(|(i, vector)| (i, cosine_similarity(query, vector)))
        .filter(|(_, score)| *score >= threshold)
        .collect();

    // sort_by is stable, equal scores stay in index order
    scored.sort_by(|a, b| b.1.total_cmp(&a.1));
    if top_k > 0 {
        scored.truncate(top_k);
    }

    Ok(scored
        .into_iter()
        .map(|(i, score)| SearchResult {
            chunk: index.chunks()[i].clone(),
            score,
        })
        .collect())
}
