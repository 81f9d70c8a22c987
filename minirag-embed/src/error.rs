//! Error types for the embedding system

use std::time::Duration;

/// Result type for embedding operations.
///
/// This is a convenience type alias that uses [`EmbedError`] as the error type.
pub type Result<T> = std::result::Result<T, EmbedError>;

/// Error type for all embedding operations.
///
/// The variants follow the provider contract: a call either yields a vector or fails
/// because the input was empty, the provider could not be reached, or the provider
/// answered with something unusable. Configuration problems are reported separately so
/// that callers can tell a broken setup from a flaky remote.
///
/// # Error Categories
///
/// - **Input Errors**: [`EmbedError::EmptyInput`]
/// - **Availability Errors**: missing credentials, refused connections, timeouts
/// - **Provider Errors**: non-success responses, malformed payloads, wrong dimensions
/// - **Configuration Errors**: invalid model or provider settings
#[derive(Debug, thiserror::Error)]
pub enum EmbedError {
    /// The text to embed was empty or whitespace only
    #[error("Cannot embed empty text")]
    EmptyInput,

    /// The provider cannot be used at all (missing credentials, unreachable endpoint)
    #[error("Embedding provider unavailable: {message}")]
    ProviderUnavailable { message: String },

    /// The provider answered but the call failed
    #[error("Embedding provider error: {message}")]
    Provider { message: String },

    /// A single call exceeded its time budget
    #[error("Embedding call timed out after {after:?}")]
    Timeout { after: Duration },

    /// The provider returned a vector of the wrong length
    #[error("Embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// Error when provider configuration is invalid
    #[error("Invalid embedding configuration: {message}")]
    InvalidConfig { message: String },

    /// Transport errors from the HTTP client
    #[error("HTTP error: {source}")]
    Http {
        #[from]
        source: reqwest::Error,
    },
}

impl EmbedError {
    /// Create an invalid configuration error with a custom message.
    pub fn invalid_config<S: Into<String>>(message: S) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }

    /// Create a provider error with a custom message.
    pub fn provider<S: Into<String>>(message: S) -> Self {
        Self::Provider {
            message: message.into(),
        }
    }

    /// Create a provider-unavailable error with a custom message.
    pub fn unavailable<S: Into<String>>(message: S) -> Self {
        Self::ProviderUnavailable {
            message: message.into(),
        }
    }

    /// Whether a later attempt with the same input may succeed.
    ///
    /// Empty input and bad configuration never heal on their own; everything that depends
    /// on the remote side might.
    pub fn is_transient(&self) -> bool {
        !matches!(
            self,
            Self::EmptyInput | Self::InvalidConfig { .. } | Self::DimensionMismatch { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        assert_eq!(EmbedError::EmptyInput.to_string(), "Cannot embed empty text");
        assert_eq!(
            EmbedError::DimensionMismatch {
                expected: 4,
                actual: 3
            }
            .to_string(),
            "Embedding dimension mismatch: expected 4, got 3"
        );
        assert!(
            EmbedError::provider("rate limited")
                .to_string()
                .contains("rate limited")
        );
    }

    #[test]
    fn test_transient_classification() {
        assert!(!EmbedError::EmptyInput.is_transient());
        assert!(!EmbedError::invalid_config("bad").is_transient());
        assert!(EmbedError::unavailable("down").is_transient());
        assert!(
            EmbedError::Timeout {
                after: Duration::from_secs(1)
            }
            .is_transient()
        );
    }
}
