//! Error types for the retrieval layer

use minirag_embed::EmbedError;
use std::path::{Path, PathBuf};

/// Result type used throughout the crate.
pub type Result<T> = std::result::Result<T, RetrieverError>;

/// Broad class of a [`RetrieverError`], deciding how callers react to it.
///
/// - `Input` and `InvariantViolation` point at a caller or data bug and are never retried.
/// - `Provider` failures are retried by re-running the work.
/// - `Persistence` failures concern the index or checkpoint files.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Input,
    Provider,
    Persistence,
    InvariantViolation,
}

#[derive(Debug, thiserror::Error)]
pub enum RetrieverError {
    /// Malformed request or configuration
    #[error("Invalid input: {message}")]
    Input { message: String },

    /// Query vector does not have the index dimension
    #[error("Query dimension mismatch: index has {expected}, query has {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// The embedding provider failed
    #[error("Embedding failed: {source}")]
    Provider {
        #[from]
        source: EmbedError,
    },

    /// Reading or writing a file failed
    #[error("IO error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Serializing a record failed
    #[error("Failed to encode {what}: {source}")]
    Encode {
        what: &'static str,
        #[source]
        source: bincode::error::EncodeError,
    },

    /// A file could not be decoded
    #[error("Failed to decode {}: {source}", path.display())]
    Decode {
        path: PathBuf,
        #[source]
        source: bincode::error::DecodeError,
    },

    /// A file decoded structurally wrong (bad magic, version or trailing data)
    #[error("Corrupt file {}: {message}", path.display())]
    CorruptFile { path: PathBuf, message: String },

    /// Chunk/vector correspondence or dimension broken
    #[error("Invariant violation: {message}")]
    InvariantViolation { message: String },
}

impl RetrieverError {
    pub fn input<S: Into<String>>(message: S) -> Self {
        Self::Input {
            message: message.into(),
        }
    }

    pub fn invariant<S: Into<String>>(message: S) -> Self {
        Self::InvariantViolation {
            message: message.into(),
        }
    }

    pub fn corrupt<S: Into<String>>(path: &Path, message: S) -> Self {
        Self::CorruptFile {
            path: path.to_path_buf(),
            message: message.into(),
        }
    }

    /// Wraps an IO error with the path it happened on, for use with `map_err`.
    pub fn io(path: &Path) -> impl FnOnce(std::io::Error) -> Self + '_ {
        move |source| Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Input { .. } | Self::DimensionMismatch { .. } => ErrorKind::Input,
            Self::Provider { source } => match source {
                EmbedError::EmptyInput => ErrorKind::Input,
                _ => ErrorKind::Provider,
            },
            Self::Io { .. } | Self::Encode { .. } | Self::Decode { .. } | Self::CorruptFile { .. } => {
                ErrorKind::Persistence
            }
            Self::InvariantViolation { .. } => ErrorKind::InvariantViolation,
        }
    }

    /// Whether running the same operation again may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Provider { source } => source.is_transient(),
            Self::Io { .. } => true,
            _ => false,
        }
    }
}
