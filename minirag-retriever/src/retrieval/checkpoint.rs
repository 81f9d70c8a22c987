//! Resumable progress of an embedding run
//!
//! A [`Checkpoint`] records, for a fixed chunk sequence and model, which chunks already have a
//! vector. It is written periodically during a run and on shutdown; a later run over the same
//! chunks with the same model only embeds what is missing. Any change to the chunk sequence,
//! the model identifier or the dimension makes the checkpoint unusable and the run starts over.

use crate::error::{Result, RetrieverError};
use crate::storage::IndexFile;
use crate::storage::framing::{decode_framed, encode_framed, read_if_exists, write_atomic};
use bincode::{Decode, Encode};
use minirag_context::Chunk;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

/// Magic bytes at the start of a checkpoint file.
pub const CHECKPOINT_MAGIC: [u8; 4] = *b"MRCP";

#[derive(Debug, Clone, PartialEq, Encode, Decode)]
pub struct Checkpoint {
    chunks: Vec<Chunk>,
    vectors: Vec<Option<Vec<f32>>>,
    completed: BTreeSet<usize>,
    model_info: String,
    dimension: usize,
}

impl Checkpoint {
    /// A checkpoint with no completed chunks.
    pub fn fresh(chunks: Vec<Chunk>, model_info: impl Into<String>, dimension: usize) -> Self {
        let vectors = vec![None; chunks.len()];
        Self {
            chunks,
            vectors,
            completed: BTreeSet::new(),
            model_info: model_info.into(),
            dimension,
        }
    }

    /// Whether this checkpoint was made for exactly these chunks with this model.
    pub fn matches(&self, chunks: &[Chunk], model_info: &str, dimension: usize) -> bool {
        self.model_info == model_info && self.dimension == dimension && self.chunks == chunks
    }

    pub fn validate(&self) -> Result<()> {
        if self.vectors.len() != self.chunks.len() {
            return Err(RetrieverError::invariant(format!(
                "checkpoint has {} chunks but {} vector slots",
                self.chunks.len(),
                self.vectors.len()
            )));
        }
        for &index in &self.completed {
            match self.vectors.get(index) {
                None => {
                    return Err(RetrieverError::invariant(format!(
                        "completed index {index} out of range (total {})",
                        self.chunks.len()
                    )));
                }
                Some(None) => {
                    return Err(RetrieverError::invariant(format!(
                        "completed index {index} has no vector"
                    )));
                }
                Some(Some(vector)) if vector.len() != self.dimension => {
                    return Err(RetrieverError::invariant(format!(
                        "vector {index} has dimension {}, expected {}",
                        vector.len(),
                        self.dimension
                    )));
                }
                Some(Some(_)) => {}
            }
        }
        Ok(())
    }

    /// Store the vector for chunk `index` and mark it completed.
    pub fn record(&mut self, index: usize, vector: Vec<f32>) -> Result<()> {
        if vector.len() != self.dimension {
            return Err(RetrieverError::invariant(format!(
                "vector for chunk {index} has dimension {}, expected {}",
                vector.len(),
                self.dimension
            )));
        }
        let total = self.chunks.len();
        let slot = self.vectors.get_mut(index).ok_or_else(|| {
            RetrieverError::invariant(format!("chunk index {index} out of range (total {total})"))
        })?;
        *slot = Some(vector);
        self.completed.insert(index);
        Ok(())
    }

    /// Indices still waiting for a vector, ascending.
    pub fn pending(&self) -> Vec<usize> {
        (0..self.chunks.len())
            .filter(|i| !self.completed.contains(i))
            .collect()
    }

    pub fn is_completed(&self, index: usize) -> bool {
        self.completed.contains(&index)
    }

    pub fn completed_count(&self) -> usize {
        self.completed.len()
    }

    pub fn total(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_complete(&self) -> bool {
        self.completed.len() == self.chunks.len()
    }

    pub fn chunks(&self) -> &[Chunk] {
        &self.chunks
    }

    pub fn model_info(&self) -> &str {
        &self.model_info
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Turn a complete checkpoint into the final index.
    pub fn into_index_file(self) -> Result<IndexFile> {
        if !self.is_complete() {
            return Err(RetrieverError::invariant(format!(
                "checkpoint is incomplete ({}/{})",
                self.completed.len(),
                self.chunks.len()
            )));
        }

        let vectors = self
            .vectors
            .into_iter()
            .enumerate()
            .map(|(i, v)| v.ok_or_else(|| RetrieverError::invariant(format!("missing vector {i}"))))
            .collect::<Result<Vec<_>>>()?;

        let file = IndexFile {
            chunks: self.chunks,
            vectors,
            model_info: self.model_info,
            dimension: self.dimension,
        };
        file.validate()?;
        Ok(file)
    }
}

/// Location of the checkpoint file on disk.
#[derive(Debug, Clone)]
pub struct CheckpointStore {
    path: PathBuf,
}

impl CheckpointStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load and validate the checkpoint; `Ok(None)` when there is none.
    pub async fn load(&self) -> Result<Option<Checkpoint>> {
        let Some(bytes) = read_if_exists(&self.path).await? else {
            return Ok(None);
        };
        let checkpoint: Checkpoint = decode_framed(CHECKPOINT_MAGIC, &bytes, &self.path)?;
        checkpoint.validate()?;
        Ok(Some(checkpoint))
    }

    pub async fn save(&self, checkpoint: &Checkpoint) -> Result<()> {
        let bytes = encode_framed(CHECKPOINT_MAGIC, checkpoint, "checkpoint")?;
        write_atomic(&self.path, &bytes).await?;
        tracing::debug!(
            "Checkpoint saved: {}/{} embeddings",
            checkpoint.completed_count(),
            checkpoint.total()
        );
        Ok(())
    }

    /// Delete the checkpoint file. Returns `false` if there was none.
    pub async fn clear(&self) -> Result<bool> {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(source) => Err(RetrieverError::Io {
                path: self.path.clone(),
                source,
            }),
        }
    }
}
