//! Failure taxonomy shared by every source provider.

use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Coarse classification of a provider failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    Transport,
    Timeout,
    Auth,
    RateLimit,
    NotFound,
    Malformed,
}

impl FailureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureKind::Transport => "transport",
            FailureKind::Timeout => "timeout",
            FailureKind::Auth => "auth",
            FailureKind::RateLimit => "rate-limit",
            FailureKind::NotFound => "not-found",
            FailureKind::Malformed => "malformed",
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error raised by a provider adapter.
///
/// These never leave [`SourceClient::fetch`](super::SourceClient::fetch);
/// they are converted into a diagnostic string on a fallback result.
/// Legitimate zero-match responses are `Ok(vec![])`, not an error.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SourceError {
    #[error("network error: {0}")]
    Transport(String),

    #[error("request timed out: {0}")]
    Timeout(String),

    #[error("credentials rejected: {0}")]
    Auth(String),

    #[error("rate limit exceeded: {0}")]
    RateLimit(String),

    #[error("endpoint not found: {0}")]
    NotFound(String),

    #[error("unreadable response: {0}")]
    Malformed(String),
}

impl SourceError {
    pub fn kind(&self) -> FailureKind {
        match self {
            SourceError::Transport(_) => FailureKind::Transport,
            SourceError::Timeout(_) => FailureKind::Timeout,
            SourceError::Auth(_) => FailureKind::Auth,
            SourceError::RateLimit(_) => FailureKind::RateLimit,
            SourceError::NotFound(_) => FailureKind::NotFound,
            SourceError::Malformed(_) => FailureKind::Malformed,
        }
    }

    /// Classify a non-success HTTP status.
    pub fn from_status(status: StatusCode, body: &str) -> Self {
        let detail = if body.trim().is_empty() {
            status.to_string()
        } else {
            format!("{} ({})", status, truncate(body.trim(), 120))
        };

        match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => SourceError::Auth(detail),
            StatusCode::TOO_MANY_REQUESTS => SourceError::RateLimit(detail),
            StatusCode::NOT_FOUND | StatusCode::GONE => SourceError::NotFound(detail),
            StatusCode::REQUEST_TIMEOUT | StatusCode::GATEWAY_TIMEOUT => {
                SourceError::Timeout(detail)
            }
            _ => SourceError::Transport(detail),
        }
    }
}

impl From<reqwest::Error> for SourceError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            SourceError::Timeout(err.to_string())
        } else if err.is_decode() {
            SourceError::Malformed(err.to_string())
        } else if let Some(status) = err.status() {
            SourceError::from_status(status, "")
        } else {
            SourceError::Transport(err.to_string())
        }
    }
}

impl From<serde_json::Error> for SourceError {
    fn from(err: serde_json::Error) -> Self {
        SourceError::Malformed(err.to_string())
    }
}

fn truncate(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        s.to_string()
    } else {
        let mut out: String = s.chars().take(max_chars).collect();
        out.push('…');
        out
    }
}
