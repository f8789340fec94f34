use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

/// Message shown whenever the API host cannot be reached at all.
pub const CONNECTIVITY_MESSAGE: &str =
    "Unable to connect to the API. Please check that the backend is running.";

#[derive(Debug, Error, Diagnostic)]
pub enum StatlensError {
    #[error("{message}")]
    #[diagnostic(code(statlens::http))]
    Http { status: u16, message: String },

    #[error("{}", CONNECTIVITY_MESSAGE)]
    #[diagnostic(
        code(statlens::network),
        help("start the backend or point STATLENS_API_URL at a running instance")
    )]
    Network { reason: String },

    #[error("failed to parse API response: {0}")]
    #[diagnostic(code(statlens::parse))]
    Parse(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("invalid dataset code: {0}")]
    InvalidDatasetCode(String),

    #[error("invalid API base URL: {0}")]
    #[diagnostic(help("expected an absolute http(s) URL such as http://localhost:8000/api"))]
    InvalidBaseUrl(String),

    #[error("failed to read config file at {0}")]
    ConfigRead(PathBuf),

    #[error("failed to parse JSON config: {0}")]
    ConfigParse(String),
}

impl StatlensError {
    pub fn status(&self) -> Option<u16> {
        match self {
            StatlensError::Http { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn is_connectivity(&self) -> bool {
        matches!(self, StatlensError::Network { .. })
    }
}

impl From<reqwest::Error> for StatlensError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_builder() {
            StatlensError::InvalidRequest(err.to_string())
        } else if err.is_decode() {
            StatlensError::Parse(err.to_string())
        } else {
            StatlensError::Network {
                reason: err.to_string(),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn network_display_hides_reason() {
        let err = StatlensError::Network {
            reason: "tcp connect error: Connection refused".to_string(),
        };
        assert_eq!(err.to_string(), CONNECTIVITY_MESSAGE);
        assert!(err.is_connectivity());
    }

    #[test]
    fn http_display_is_message() {
        let err = StatlensError::Http {
            status: 404,
            message: "Dataset XYZ not found".to_string(),
        };
        assert_eq!(err.to_string(), "Dataset XYZ not found");
        assert_eq!(err.status(), Some(404));
    }
}
