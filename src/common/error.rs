//! Error types for minifs

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    // === I/O Errors ===
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // === Node Errors ===
    #[error("Communication with node {node} failed: {reason}")]
    Communication { node: usize, reason: String },

    #[error("Node {0} is unavailable")]
    NodeUnavailable(usize),

    // === Request Errors ===
    #[error("Invalid filename: {0}")]
    InvalidFilename(String),

    // === Network Errors ===
    #[error("HTTP error: {0}")]
    Http(String),

    // === Config Errors ===
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl Error {
    /// Did a call to a node fail in transit?
    ///
    /// Only these errors move a slot from live to dead.
    pub fn is_communication(&self) -> bool {
        matches!(self, Error::Communication { .. })
    }

    /// Convert to HTTP status code
    pub fn to_http_status(&self) -> axum::http::StatusCode {
        use axum::http::StatusCode;
        match self {
            Error::InvalidFilename(_) | Error::InvalidConfig(_) => StatusCode::BAD_REQUEST,
            Error::Communication { .. } | Error::NodeUnavailable(_) => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<config::ConfigError> for Error {
    fn from(e: config::ConfigError) -> Self {
        Error::InvalidConfig(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;

    #[test]
    fn test_only_communication_errors_kill_nodes() {
        let comm = Error::Communication {
            node: 1,
            reason: "connection reset".into(),
        };
        assert!(comm.is_communication());
        assert!(!Error::NodeUnavailable(1).is_communication());
        assert!(!Error::InvalidFilename("..".into()).is_communication());
    }

    #[test]
    fn test_http_status_mapping() {
        assert_eq!(
            Error::InvalidFilename("".into()).to_http_status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            Error::NodeUnavailable(0).to_http_status(),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            Error::Http("builder failed".into()).to_http_status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
