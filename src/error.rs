use std::path::PathBuf;

use thiserror::Error;

/// Failure of a single backend call, classified for the retry policy.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum BackendError {
    /// 401/403 or a backend-reported key problem. Never retried.
    #[error("authentication failed: {0}")]
    Authentication(String),

    #[error("rate limit exceeded: {0}")]
    RateLimited(String),

    /// Timeouts, connection failures and non-auth HTTP errors.
    #[error("network error: {0}")]
    Transient(String),

    #[error("malformed response: {0}")]
    Malformed(String),
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AbortReason {
    #[error("too many errors ({count}/{max})")]
    ErrorBudget { count: usize, max: usize },

    #[error("retries exhausted after {attempts} attempts: {last}")]
    RetriesExhausted { attempts: usize, last: BackendError },

    #[error("translation cancelled")]
    Cancelled,

    /// Another call of the same run already ended it.
    #[error("run already aborted by another request")]
    Halted,
}

#[derive(Debug, Error)]
pub enum ResourceError {
    #[error("failed to access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("parse error at line {line}: {message}")]
    Parse { line: usize, message: String },

    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("unsupported: {0}")]
    Unsupported(String),
}

impl ResourceError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        ResourceError::Io {
            path: path.into(),
            source,
        }
    }
}

/// Errors that end a run.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("authentication failed: {0}")]
    Authentication(String),

    #[error("run aborted: {0}")]
    Aborted(AbortReason),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error(transparent)]
    Resource(#[from] ResourceError),
}

impl RunError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, RunError::Aborted(AbortReason::Cancelled))
    }
}

impl From<AbortReason> for RunError {
    fn from(reason: AbortReason) -> Self {
        RunError::Aborted(reason)
    }
}
