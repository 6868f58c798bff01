//! Hetzner Cloud client error types

use hconnect_cloud::{CloudError, ErrorCode};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum HetznerError {
    #[error("entered token is invalid (must be exactly 64 characters long)")]
    InvalidToken,

    #[error("Invalid endpoint: {0}")]
    InvalidEndpoint(String),

    #[error("API error ({code}): {message}")]
    Api { code: String, message: String },

    #[error("Unexpected HTTP status {status}: {body}")]
    UnexpectedStatus { status: u16, body: String },

    #[error("Invalid address in API response: {0}")]
    InvalidAddress(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON parse error: {0}")]
    JsonError(#[from] serde_json::Error),
}

impl HetznerError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, HetznerError::Api { code, .. } if code == "not_found")
    }
}

impl From<HetznerError> for CloudError {
    fn from(err: HetznerError) -> Self {
        match err {
            HetznerError::Api { code, message } => CloudError::Api {
                code: ErrorCode::from_code(&code),
                message,
            },
            HetznerError::InvalidToken | HetznerError::InvalidEndpoint(_) => {
                CloudError::InvalidConfig(err.to_string())
            }
            HetznerError::JsonError(e) => CloudError::Json(e),
            other => CloudError::Transport(other.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, HetznerError>;
