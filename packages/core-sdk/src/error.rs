use std::path::PathBuf;

use thiserror::Error;

/**
 * \brief Failure while reading or writing one of the flat JSON stores.
 */
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("failed to access store {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("store {path} holds invalid JSON: {source}")]
    Decode {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to encode records: {0}")]
    Encode(#[source] serde_json::Error),
}

/**
 * \brief Candidate provider rejected by the validity predicate.
 */
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct ValidationError {
    /** \brief Human readable reason, shown to the user as-is. */
    pub message: String,
}

impl ValidationError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

/**
 * \brief Why the outbound chat call did not produce a usable body.
 */
#[derive(Debug, Error)]
pub enum UpstreamError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("request timed out")]
    Timeout,

    #[error("upstream returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("upstream body is not JSON: {0}")]
    Decode(#[source] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_error_displays_message_only() {
        let err = ValidationError::new("provide a model");
        assert_eq!(err.to_string(), "provide a model");
        let wrapped: RegistryError = err.into();
        assert_eq!(wrapped.to_string(), "provide a model");
    }

    #[test]
    fn test_storage_error_names_path() {
        let err = StorageError::Io {
            path: PathBuf::from("data/providers.json"),
            source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        };
        assert!(err.to_string().contains("data/providers.json"));
    }

    #[test]
    fn test_upstream_status_display() {
        let err = UpstreamError::Status {
            status: 401,
            body: "unauthorized".to_string(),
        };
        assert_eq!(err.to_string(), "upstream returned status 401: unauthorized");
    }
}
