//! Error types for triage-core.

use thiserror::Error;

/// Result type alias using triage-core Error
pub type Result<T> = std::result::Result<T, Error>;

/// Core error types for triage operations
#[derive(Error, Debug)]
pub enum Error {
    // Input validation
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    // Session errors
    #[error("Session is closed: {0}")]
    SessionClosed(String),

    #[error("Session not found: {0}")]
    SessionNotFound(String),

    // Collaborator failures
    #[error("Generation failed: {0}")]
    Generation(String),

    #[error("Embedding failed: {0}")]
    Embedding(String),

    #[error("Search failed: {0}")]
    Search(String),

    // Knowledge store errors
    #[error("Embedding dimension mismatch: index expects {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Knowledge index not initialized: {0}")]
    IndexMissing(String),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Database lock poisoned")]
    LockPoisoned,

    // IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    /// Create an invalid input error
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput(message.into())
    }

    /// Create a generation error from any displayable cause
    pub fn generation(message: impl Into<String>) -> Self {
        Self::Generation(message.into())
    }

    /// Create an embedding error from any displayable cause
    pub fn embedding(message: impl Into<String>) -> Self {
        Self::Embedding(message.into())
    }

    /// Create a search error from any displayable cause
    pub fn search(message: impl Into<String>) -> Self {
        Self::Search(message.into())
    }

    /// Check if this error came from an external collaborator.
    ///
    /// Collaborator failures leave core state untouched, so the same call
    /// can be retried as-is.
    pub fn is_collaborator(&self) -> bool {
        matches!(
            self,
            Self::Generation(_) | Self::Embedding(_) | Self::Search(_)
        )
    }

    /// Check if this error is a closed-session error
    pub fn is_session_closed(&self) -> bool {
        matches!(self, Self::SessionClosed(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::DimensionMismatch {
            expected: 1024,
            actual: 384,
        };
        assert!(err.to_string().contains("1024"));
        assert!(err.to_string().contains("384"));

        let err = Error::SessionClosed("S1".into());
        assert!(err.is_session_closed());
        assert!(err.to_string().contains("S1"));
    }

    #[test]
    fn test_collaborator_errors() {
        assert!(Error::generation("timeout").is_collaborator());
        assert!(Error::embedding("bad").is_collaborator());
        assert!(Error::search("down").is_collaborator());
        assert!(!Error::invalid_input("empty").is_collaborator());
    }
}
