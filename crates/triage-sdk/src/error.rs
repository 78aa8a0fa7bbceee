//! SDK Error Types
//!
//! Defines error types for the triage SDK.

use thiserror::Error;

/// SDK Result type alias
pub type SDKResult<T> = Result<T, SDKError>;

/// SDK errors
#[derive(Debug, Error)]
pub enum SDKError {
    /// Configuration error
    #[error("configuration error: {0}")]
    Config(#[from] crate::config::ConfigValidationError),

    /// Error raised by the core library
    #[error(transparent)]
    Core(#[from] triage_core::Error),

    /// Transport-level HTTP failure
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Non-success response from the model API
    #[error("model API returned {status}: {message}")]
    Api { status: u16, message: String },

    /// Embedding model error
    #[error("embedding error: {message}")]
    Embedding { message: String },

    /// Invalid operation
    #[error("invalid operation: {message}")]
    InvalidOperation { message: String },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl SDKError {
    /// Create an API error
    pub fn api(status: u16, message: impl Into<String>) -> Self {
        Self::Api {
            status,
            message: message.into(),
        }
    }

    /// Create an embedding error
    pub fn embedding(message: impl Into<String>) -> Self {
        Self::Embedding {
            message: message.into(),
        }
    }

    /// Create an invalid operation error
    pub fn invalid_operation(message: impl Into<String>) -> Self {
        Self::InvalidOperation {
            message: message.into(),
        }
    }

    /// Check if the error means the session no longer accepts turns
    pub fn is_session_closed(&self) -> bool {
        matches!(self, Self::Core(e) if e.is_session_closed())
    }

    /// Check if the error is an authentication failure from the model API
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, Self::Api { status: 401 | 403, .. })
    }
}

/// Collapse an SDK error into a core error for the collaborator traits.
pub(crate) fn into_generation_error(err: SDKError) -> triage_core::Error {
    match err {
        SDKError::Core(e) => e,
        other => triage_core::Error::generation(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation() {
        let err = SDKError::api(401, "invalid x-api-key");
        assert!(err.is_unauthorized());
        assert!(err.to_string().contains("401"));
        assert!(err.to_string().contains("invalid x-api-key"));

        let err = SDKError::from(triage_core::Error::SessionClosed("S1".into()));
        assert!(err.is_session_closed());
        assert!(err.to_string().contains("S1"));
    }

    #[test]
    fn test_into_generation_error() {
        let err = into_generation_error(SDKError::api(529, "overloaded"));
        assert!(matches!(err, triage_core::Error::Generation(ref m) if m.contains("529")));

        let err = into_generation_error(SDKError::Core(triage_core::Error::invalid_input("x")));
        assert!(matches!(err, triage_core::Error::InvalidInput(_)));
    }
}
