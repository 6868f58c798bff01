//! Cloud provider error types

use std::fmt;

use thiserror::Error;

/// Provider error codes that callers need to tell apart.
///
/// Everything the provider sends that is not listed here is kept verbatim in
/// [`ErrorCode::Other`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ErrorCode {
    /// The resource is locked by another running action.
    Locked,
    /// The resource was changed concurrently.
    Conflict,
    RateLimitExceeded,
    NotFound,
    /// The load balancer already has this target.
    TargetAlreadyDefined,
    UniquenessError,
    Other(String),
}

impl ErrorCode {
    /// Map the provider's wire code (e.g. `"rate_limit_exceeded"`).
    pub fn from_code(code: &str) -> Self {
        match code {
            "locked" => ErrorCode::Locked,
            "conflict" => ErrorCode::Conflict,
            "rate_limit_exceeded" => ErrorCode::RateLimitExceeded,
            "not_found" => ErrorCode::NotFound,
            "target_already_defined" => ErrorCode::TargetAlreadyDefined,
            "uniqueness_error" => ErrorCode::UniquenessError,
            other => ErrorCode::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            ErrorCode::Locked => "locked",
            ErrorCode::Conflict => "conflict",
            ErrorCode::RateLimitExceeded => "rate_limit_exceeded",
            ErrorCode::NotFound => "not_found",
            ErrorCode::TargetAlreadyDefined => "target_already_defined",
            ErrorCode::UniquenessError => "uniqueness_error",
            ErrorCode::Other(code) => code,
        }
    }

    /// Lock, conflict and rate limit responses clear up on their own after a while.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            ErrorCode::Locked | ErrorCode::Conflict | ErrorCode::RateLimitExceeded
        )
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Cloud provider errors
#[derive(Error, Debug)]
pub enum CloudError {
    #[error("API error ({code}): {message}")]
    Api { code: ErrorCode, message: String },

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Action {id} failed ({code}): {message}")]
    ActionFailed {
        id: u64,
        code: ErrorCode,
        message: String,
    },

    #[error("Action {0} watch ended without a result")]
    ActionWatchClosed(u64),

    #[error("Operation cancelled")]
    Cancelled,

    #[error("{op}: gave up after {attempts} attempts: {last}")]
    RetriesExhausted {
        op: String,
        attempts: u32,
        #[source]
        last: Box<CloudError>,
    },

    #[error("{op}: {source}")]
    Operation {
        op: String,
        #[source]
        source: Box<CloudError>,
    },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl CloudError {
    /// Annotate an error with the operation that produced it.
    pub fn in_op(self, op: impl Into<String>) -> Self {
        CloudError::Operation {
            op: op.into(),
            source: Box::new(self),
        }
    }

    /// Provider error code, looking through operation annotations.
    pub fn code(&self) -> Option<&ErrorCode> {
        match self {
            CloudError::Api { code, .. } | CloudError::ActionFailed { code, .. } => Some(code),
            CloudError::Operation { source, .. } => source.code(),
            CloudError::RetriesExhausted { last, .. } => last.code(),
            _ => None,
        }
    }

    pub fn is_transient(&self) -> bool {
        self.code().is_some_and(ErrorCode::is_transient)
    }

    pub fn is_target_already_defined(&self) -> bool {
        self.code() == Some(&ErrorCode::TargetAlreadyDefined)
    }

    pub fn is_cancelled(&self) -> bool {
        match self {
            CloudError::Cancelled => true,
            CloudError::Operation { source, .. } => source.is_cancelled(),
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, CloudError>;
