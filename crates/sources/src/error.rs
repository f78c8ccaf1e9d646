//! Error type shared by the source clients.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SourceError {
    /// Upstream answered 429. Back off and retry later.
    #[error("rate limited by upstream")]
    RateLimited,
    /// Network failure or upstream 5xx. Usually clears on retry.
    #[error("transient upstream failure: {0}")]
    Transient(String),
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
    /// Upstream rejected our credentials (401/403). Every later request
    /// with the same key fails the same way, so this is never retried.
    #[error("request denied by upstream: {0}")]
    Denied(String),
    /// Upstream answered but the payload was not what we expect.
    #[error("unexpected response: {0}")]
    InvalidResponse(String),
    /// The scoring model rejected the image or failed internally.
    #[error("scoring model error: {0}")]
    Model(String),
}

impl SourceError {
    /// Whether a retry with backoff is worthwhile.
    pub fn is_retryable(&self) -> bool {
        match self {
            SourceError::RateLimited | SourceError::Transient(_) => true,
            SourceError::Transport(err) => err.is_timeout() || err.is_connect(),
            SourceError::Denied(_) | SourceError::InvalidResponse(_) | SourceError::Model(_) => {
                false
            }
        }
    }

    /// Map an HTTP status line to the matching variant.
    pub(crate) fn from_status(status: reqwest::StatusCode, context: &str) -> Self {
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            SourceError::RateLimited
        } else if status == reqwest::StatusCode::UNAUTHORIZED
            || status == reqwest::StatusCode::FORBIDDEN
        {
            SourceError::Denied(format!("{context}: {status}"))
        } else if status.is_server_error() {
            SourceError::Transient(format!("{context}: {status}"))
        } else {
            SourceError::InvalidResponse(format!("{context}: {status}"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rate_limit_and_server_errors_are_retryable() {
        assert!(SourceError::RateLimited.is_retryable());
        assert!(SourceError::Transient("gateway".into()).is_retryable());
        assert!(!SourceError::Model("oom".into()).is_retryable());
        assert!(!SourceError::InvalidResponse("html".into()).is_retryable());
        assert!(!SourceError::Denied("403".into()).is_retryable());
    }

    #[test]
    fn status_mapping() {
        assert!(matches!(
            SourceError::from_status(reqwest::StatusCode::TOO_MANY_REQUESTS, "x"),
            SourceError::RateLimited
        ));
        assert!(matches!(
            SourceError::from_status(reqwest::StatusCode::BAD_GATEWAY, "x"),
            SourceError::Transient(_)
        ));
        assert!(matches!(
            SourceError::from_status(reqwest::StatusCode::FORBIDDEN, "x"),
            SourceError::Denied(_)
        ));
        assert!(matches!(
            SourceError::from_status(reqwest::StatusCode::UNAUTHORIZED, "x"),
            SourceError::Denied(_)
        ));
        assert!(matches!(
            SourceError::from_status(reqwest::StatusCode::NOT_FOUND, "x"),
            SourceError::InvalidResponse(_)
        ));
    }
}
