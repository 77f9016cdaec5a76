//! Client error types

use thiserror::Error;

use crate::rest::MapperError;

/// Errors that can occur during reads and writes against the API
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("{kind} \"{key}\" not found")]
    NotFound { kind: String, key: String },

    #[error("{kind} \"{key}\" already exists")]
    AlreadyExists { kind: String, key: String },

    #[error("conflict updating {kind} \"{key}\": {message}")]
    Conflict { kind: String, key: String, message: String },

    #[error("API error {status}: {message}")]
    Api { status: u16, message: String },

    #[error("Network error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Mapping(#[from] MapperError),

    #[error("the cache is not started, can not read objects")]
    CacheNotStarted,

    #[error("index with name field:{field} does not exist for {kind}")]
    MissingIndex { kind: String, field: String },
}

impl ClientError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, ClientError::NotFound { .. })
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, ClientError::Conflict { .. } | ClientError::AlreadyExists { .. })
    }

    /// Map a non-success HTTP status to an error
    pub(crate) fn from_status(status: u16, kind: &str, key: &str, message: String) -> Self {
        match status {
            404 => ClientError::NotFound {
                kind: kind.to_string(),
                key: key.to_string(),
            },
            409 if message.contains("already exists") => ClientError::AlreadyExists {
                kind: kind.to_string(),
                key: key.to_string(),
            },
            409 => ClientError::Conflict {
                kind: kind.to_string(),
                key: key.to_string(),
                message,
            },
            _ => ClientError::Api { status, message },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_status() {
        let err = ClientError::from_status(404, "Pod", "default/web-0", String::new());
        assert!(err.is_not_found());
        assert_eq!(err.to_string(), "Pod \"default/web-0\" not found");

        let err = ClientError::from_status(409, "Pod", "default/web-0", "pods \"web-0\" already exists".to_string());
        assert!(matches!(err, ClientError::AlreadyExists { .. }));

        let err = ClientError::from_status(409, "Pod", "default/web-0", "object has been modified".to_string());
        assert!(matches!(err, ClientError::Conflict { .. }));
        assert!(err.is_conflict());

        let err = ClientError::from_status(500, "Pod", "default/web-0", "boom".to_string());
        assert!(matches!(err, ClientError::Api { status: 500, .. }));
        assert!(!err.is_not_found());
    }
}
