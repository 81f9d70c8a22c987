//! In-memory vector index
//!
//! [`VectorIndex`] holds the chunk corpus and one embedding per chunk, position for position.
//! It is built once (after generation, or when loading the persisted index) and only read
//! afterwards, so it can be shared freely between concurrent searches.

use crate::error::{Result, RetrieverError};
use minirag_context::Chunk;

#[derive(Debug, Clone, PartialEq)]
pub struct VectorIndex {
    chunks: Vec<Chunk>,
    vectors: Vec<Vec<f32>>,
    dimension: usize,
}

impl VectorIndex {
    /// Pair `chunks` with `vectors`.
    ///
    /// Fails with [`RetrieverError::InvariantViolation`] when the counts differ or a vector
    /// does not have `dimension` elements.
    pub fn build(chunks: Vec<Chunk>, vectors: Vec<Vec<f32>>, dimension: usize) -> Result<Self> {
        if chunks.len() != vectors.len() {
            return Err(RetrieverError::invariant(format!(
                "{} chunks but {} vectors",
                chunks.len(),
                vectors.len()
            )));
        }
        if let Some(i) = vectors.iter().position(|v| v.len() != dimension) {
            return Err(RetrieverError::invariant(format!(
                "vector {i} has dimension {}, expected {dimension}",
                vectors[i].len()
            )));
        }

        Ok(Self {
            chunks,
            vectors,
            dimension,
        })
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn chunks(&self) -> &[Chunk] {
        &self.chunks
    }

    pub fn vectors(&self) -> &[Vec<f32>] {
        &self.vectors
    }

    /// Position of the chunk starting at the same path and offset as `target`.
    pub fn position_of(&self, target: &Chunk) -> Option<usize> {
        self.chunks.iter().position(|c| c.same_position(target))
    }

    /// The target chunk plus up to `context` neighbours on each side from the same document,
    /// in index order. Returns only `target` when it is not part of the index.
    pub fn surrounding_chunks<'a>(&'a self, target: &'a Chunk, context: usize) -> Vec<&'a Chunk> {
        let Some(position) = self.position_of(target) else {
            return vec![target];
        };

        let start = position.saturating_sub(context);
        let end = position.saturating_add(context).min(self.len() - 1);
        self.chunks[start..=end]
            .iter()
            .filter(|c| c.path == target.path)
            .collect()
    }
}
