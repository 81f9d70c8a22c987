//! Loading a documentation tree and splitting it into chunks.
//!
//! Documents are discovered with [`ignore::WalkBuilder`], so hidden files and anything
//! excluded by `.gitignore` are skipped. Paths are recorded relative to the docs directory
//! with `/` separators, and documents are chunked in sorted path order: the same tree always
//! yields the same chunk sequence, which is what makes checkpoints reusable across runs.

use crate::error::{Result, RetrieverError};
use ignore::WalkBuilder;
use minirag_context::{Chunk, chunk_document};
use std::collections::BTreeMap;
use std::path::{Component, Path, PathBuf};

/// Configuration for loading and chunking documents
#[derive(Debug, Clone)]
pub struct ChunkingConfig {
    /// Root of the documentation tree
    pub docs_dir: PathBuf,
    /// File extensions treated as markdown, without the dot
    pub extensions: Vec<String>,
}

impl ChunkingConfig {
    pub fn new(docs_dir: impl Into<PathBuf>) -> Self {
        Self {
            docs_dir: docs_dir.into(),
            extensions: vec!["md".to_string(), "markdown".to_string()],
        }
    }
}

/// Strategy for turning a docs directory into an ordered chunk sequence
#[derive(Debug, Clone)]
pub struct ChunkingStrategy {
    config: ChunkingConfig,
}

impl ChunkingStrategy {
    pub fn new(config: ChunkingConfig) -> Self {
        Self { config }
    }

    /// Check if a file should be indexed based on its path
    pub fn should_index_file(&self, file_path: &Path) -> bool {
        if let Some(filename) = file_path.file_name().and_then(|n| n.to_str()) {
            if filename.starts_with('.') {
                return false;
            }
        }

        file_path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| {
                self.config
                    .extensions
                    .iter()
                    .any(|allowed| allowed.eq_ignore_ascii_case(ext))
            })
    }

    /// Read every markdown document under the docs directory, keyed by relative path.
    pub fn load_documents(&self) -> Result<BTreeMap<String, String>> {
        let root = &self.config.docs_dir;
        if !root.is_dir() {
            return Err(RetrieverError::input(format!(
                "docs directory {} does not exist",
                root.display()
            )));
        }

        let mut documents = BTreeMap::new();
        for result in WalkBuilder::new(root).hidden(true).git_ignore(true).build() {
            let entry = match result {
                Ok(entry) => entry,
                Err(e) => {
                    tracing::warn!("Skipping unreadable entry: {e}");
                    continue;
                }
            };
            if !entry.file_type().is_some_and(|t| t.is_file()) {
                continue;
            }

            let path = entry.path();
            if !self.should_index_file(path) {
                continue;
            }

            let content = std::fs::read_to_string(path).map_err(RetrieverError::io(path))?;
            let relative = relative_path(root, path);
            tracing::debug!("Loaded {} ({} bytes)", relative, content.len());
            documents.insert(relative, content);
        }

        tracing::info!(
            "Loaded {} documents from {}",
            documents.len(),
            root.display()
        );
        Ok(documents)
    }

    /// Chunk documents in path order.
    ///
    /// Documents with no text at all are skipped with a warning; their single empty chunk
    /// could never be embedded.
    pub fn chunk_documents(&self, documents: &BTreeMap<String, String>) -> Vec<Chunk> {
        let chunks: Vec<Chunk> = documents
            .iter()
            .flat_map(|(path, content)| chunk_document(path, content))
            .filter(|chunk| {
                if chunk.content.is_empty() {
                    tracing::warn!("Skipping {}: document is empty", chunk.path);
                    return false;
                }
                true
            })
            .collect();

        tracing::info!(
            "Split {} documents into {} chunks",
            documents.len(),
            chunks.len()
        );
        chunks
    }

    pub fn load_chunks(&self) -> Result<Vec<Chunk>> {
        let documents = self.load_documents()?;
        Ok(self.chunk_documents(&documents))
    }
}

/// `path` relative to `root`, joined with `/` on every platform.
fn relative_path(root: &Path, path: &Path) -> String {
    let relative = path.strip_prefix(root).unwrap_or(path);
    relative
        .components()
        .filter_map(|component| match component {
            Component::Normal(part) => Some(part.to_string_lossy()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}
