//! Core error types.

use thiserror::Error;

/// Error returned by repository implementations.
///
/// The relational store is an external collaborator; this engine only
/// distinguishes lookup failures from connectivity problems, it never
/// inspects persistence mechanics.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// The backing store could not be reached or answered abnormally.
    #[error("repository unavailable: {message}")]
    Unavailable {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// The stored record is malformed and cannot be mapped to the model.
    #[error("invalid record: {message}")]
    InvalidRecord { message: String },
}

impl RepositoryError {
    /// Create an unavailable error.
    pub fn unavailable(message: impl Into<String>) -> Self {
        RepositoryError::Unavailable {
            message: message.into(),
            source: None,
        }
    }

    /// Create an unavailable error with source.
    pub fn unavailable_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        RepositoryError::Unavailable {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create an invalid-record error.
    pub fn invalid_record(message: impl Into<String>) -> Self {
        RepositoryError::InvalidRecord {
            message: message.into(),
        }
    }
}

/// Result type for repository operations.
pub type RepoResult<T> = Result<T, RepositoryError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = RepositoryError::unavailable("connection refused");
        assert_eq!(err.to_string(), "repository unavailable: connection refused");

        let err = RepositoryError::invalid_record("kennung missing");
        assert_eq!(err.to_string(), "invalid record: kennung missing");
    }

    #[test]
    fn test_error_with_source() {
        let source = std::io::Error::new(std::io::ErrorKind::Other, "underlying");
        let err = RepositoryError::unavailable_with_source("failed", source);
        if let RepositoryError::Unavailable { source, .. } = &err {
            assert!(source.is_some());
        } else {
            panic!("expected Unavailable variant");
        }
    }
}
