//! Error taxonomy.
//!
//! [`RemoteFailure`] describes a single failed call to the GitLab API. It is
//! always scoped to one (project, source) pair and ends up as a
//! [`SourceError`](crate::models::SourceError) in the response rather than
//! aborting the search. [`SearchError`] covers the request-level failures
//! that stop a search before (or instead of) producing results.

use thiserror::Error;

/// Outcome of a failed remote call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RemoteFailure {
    #[error("GitLab API Unauthorized (401). Check your API token.")]
    Unauthorized,

    #[error("GitLab API Forbidden (403). Ensure the API token has sufficient permissions.")]
    Forbidden,

    #[error("GitLab API resource Not Found (404).")]
    NotFound,

    #[error("GitLab API error (HTTP {status}): {body}")]
    Other { status: u16, body: String },

    #[error("Could not connect to GitLab: {0}")]
    Transport(String),

    #[error("Failed to parse GitLab response: {0}")]
    Decode(String),

    #[error("GitLab request timed out")]
    Timeout,
}

impl RemoteFailure {
    /// Map a non-success HTTP status to its tagged failure.
    pub fn from_status(status: u16, body: String) -> Self {
        match status {
            401 => Self::Unauthorized,
            403 => Self::Forbidden,
            404 => Self::NotFound,
            _ => Self::Other { status, body },
        }
    }

    /// Classify a `reqwest` error raised while sending or reading a response.
    pub fn from_reqwest(err: &reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout
        } else if err.is_decode() {
            Self::Decode(err.to_string())
        } else {
            Self::Transport(err.to_string())
        }
    }
}

/// Request-level failures.
#[derive(Debug, Error)]
pub enum SearchError {
    /// URL or token missing. Checked before any remote call.
    #[error(
        "GitLab URL or API key not configured. Set GITLAB_URL and GITLAB_API_KEY \
         or the [gitlab] section of the config file."
    )]
    Configuration,

    /// Malformed request. Checked before any remote call.
    #[error("{0}")]
    Validation(String),

    /// The orchestration itself failed (not a single project or source).
    #[error("Search failed unexpectedly: {0}")]
    Internal(String),
}
