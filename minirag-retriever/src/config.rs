//! Configuration file for the `minirag` binary
//!
//! Settings come from an optional TOML file (`minirag.toml` in the working directory unless
//! `--config` names another one). Every key has a default, so the file only needs to list
//! what differs:
//!
//! ```toml
//! docs_dir = "docs"
//! output_dir = "embeddings"
//!
//! [embedding]
//! provider = "openai"
//! model = "text-embedding-3-small"
//!
//! [pipeline]
//! concurrency = 10
//! save_every = 50
//! ```

use crate::error::{Result, RetrieverError};
use crate::retrieval::embedding_pipeline::PipelineConfig;
use minirag_embed::EmbedConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Config file looked up in the working directory when none is given.
pub const DEFAULT_CONFIG_FILE: &str = "minirag.toml";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineSettings {
    pub concurrency: usize,
    pub save_every: usize,
    pub call_timeout_secs: u64,
    pub progress_every: usize,
    /// How long `generate` waits for the checkpoint save after a shutdown signal
    pub shutdown_grace_secs: u64,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        let defaults = PipelineConfig::default();
        Self {
            concurrency: defaults.concurrency,
            save_every: defaults.save_every,
            call_timeout_secs: defaults.call_timeout.as_secs(),
            progress_every: defaults.progress_every,
            shutdown_grace_secs: 10,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrieverConfig {
    /// Root of the markdown tree to index
    pub docs_dir: PathBuf,
    /// Directory holding the index and checkpoint files
    pub output_dir: PathBuf,
    pub index_file: String,
    pub checkpoint_file: String,
    pub embedding: EmbedConfig,
    pub pipeline: PipelineSettings,
}

impl Default for RetrieverConfig {
    fn default() -> Self {
        Self {
            docs_dir: PathBuf::from("docs"),
            output_dir: PathBuf::from("embeddings"),
            index_file: "index.bin".to_string(),
            checkpoint_file: "checkpoint.bin".to_string(),
            embedding: EmbedConfig::default(),
            pipeline: PipelineSettings::default(),
        }
    }
}

impl RetrieverConfig {
    /// Load `path`, or `minirag.toml` if present, or the defaults.
    ///
    /// An explicitly named file must exist; the implicit one is optional.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let (path, required) = match path {
            Some(path) => (path.to_path_buf(), true),
            None => (PathBuf::from(DEFAULT_CONFIG_FILE), false),
        };

        let content = match std::fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound && !required => {
                tracing::debug!("No {} found, using defaults", path.display());
                return Ok(Self::default());
            }
            Err(source) => return Err(RetrieverError::Io { path, source }),
        };

        let config = Self::from_toml(&content).map_err(|e| match e {
            RetrieverError::Input { message } => {
                RetrieverError::input(format!("{}: {message}", path.display()))
            }
            other => other,
        })?;
        tracing::debug!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)
            .map_err(|e| RetrieverError::input(format!("invalid configuration: {e}")))?;
        config.pipeline_config().validate()?;
        Ok(config)
    }

    pub fn index_path(&self) -> PathBuf {
        self.output_dir.join(&self.index_file)
    }

    pub fn checkpoint_path(&self) -> PathBuf {
        self.output_dir.join(&self.checkpoint_file)
    }

    pub fn pipeline_config(&self) -> PipelineConfig {
        PipelineConfig {
            concurrency: self.pipeline.concurrency,
            save_every: self.pipeline.save_every,
            call_timeout: Duration::from_secs(self.pipeline.call_timeout_secs),
            progress_every: self.pipeline.progress_every,
        }
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_secs(self.pipeline.shutdown_grace_secs)
    }
}
