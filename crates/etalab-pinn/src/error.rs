//! Error types for the PINN dashboard client.

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while talking to the PINN benchmark server.
#[derive(Error, Debug)]
pub enum Error {
    /// The HTTP request could not be sent or its body could not be read.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The server answered with a non-success status.
    #[error("server returned {status}: {detail}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// The `detail` field of the error body, or the raw body.
        detail: String,
    },

    /// The server accepted the request but refused to start training.
    #[error("training was not started: {0}")]
    TrainingRejected(String),

    /// The log stream WebSocket failed.
    #[error("WebSocket error: {0}")]
    WebSocket(Box<tokio_tungstenite::tungstenite::Error>),

    /// A run id that cannot be used as a path segment.
    #[error("invalid run id: {0:?}")]
    InvalidRunId(String),

    /// A mesh file the server would reject.
    #[error("invalid mesh file {path}: {reason}")]
    InvalidMesh {
        /// The offending file.
        path: PathBuf,
        /// Why it was rejected.
        reason: String,
    },

    /// The server base URL could not be used.
    #[error("invalid URL: {0}")]
    InvalidUrl(String),

    /// Reading a local file failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A response body was not the expected JSON.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// A specialized Result type for dashboard operations.
pub type Result<T> = std::result::Result<T, Error>;

impl From<tokio_tungstenite::tungstenite::Error> for Error {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        Self::WebSocket(Box::new(err))
    }
}

impl From<url::ParseError> for Error {
    fn from(err: url::ParseError) -> Self {
        Self::InvalidUrl(err.to_string())
    }
}

impl Error {
    /// Check if the server reported the resource as missing.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Api { status: 404, .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_error_display() {
        let err = Error::Api {
            status: 404,
            detail: "Run not found".to_string(),
        };
        assert_eq!(err.to_string(), "server returned 404: Run not found");
        assert!(err.is_not_found());
    }

    #[test]
    fn test_is_not_found_other_status() {
        let err = Error::Api {
            status: 500,
            detail: "boom".to_string(),
        };
        assert!(!err.is_not_found());
        assert!(!Error::InvalidRunId("..".to_string()).is_not_found());
    }

    #[test]
    fn test_invalid_mesh_display() {
        let err = Error::InvalidMesh {
            path: PathBuf::from("/tmp/plate.stl"),
            reason: "only .msh files are allowed".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("/tmp/plate.stl"));
        assert!(msg.contains(".msh"));
    }

    #[test]
    fn test_from_url_parse_error() {
        let parse_err = url::Url::parse("not a url").unwrap_err();
        let err: Error = parse_err.into();
        assert!(matches!(err, Error::InvalidUrl(_)));
    }

    #[test]
    fn test_from_json_error() {
        let json_err = serde_json::from_str::<i32>("nope").unwrap_err();
        let err: Error = json_err.into();
        assert!(matches!(err, Error::Json(_)));
    }
}
