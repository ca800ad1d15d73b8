use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::fusion::FusionResult;

// ============= Query Types =============

/// Speaker of a prior conversational turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    pub text: String,
}

impl Turn {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            text: text.into(),
        }
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            text: text.into(),
        }
    }
}

/// One user search submission. Never mutated once built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Query {
    text: String,
    #[serde(default)]
    turn_history: Vec<Turn>,
}

impl Query {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into().trim().to_string(),
            turn_history: Vec::new(),
        }
    }

    pub fn with_history(text: impl Into<String>, turn_history: Vec<Turn>) -> Self {
        Self {
            turn_history,
            ..Self::new(text)
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn turn_history(&self) -> &[Turn] {
        &self.turn_history
    }

    pub fn is_follow_up(&self) -> bool {
        !self.turn_history.is_empty()
    }

    /// Lowercased, whitespace-collapsed form used for cache keys.
    pub fn normalized(&self) -> String {
        self.text
            .split_whitespace()
            .map(str::to_lowercase)
            .collect::<Vec<_>>()
            .join(" ")
    }
}

// ============= Source Types =============

/// Identity of a content provider.
///
/// `Web` is the primary source that backs the narrative; the others are
/// secondary sources whose content may be spliced into it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceId {
    Web,
    Video,
    Discussion,
    Image,
}

impl SourceId {
    pub const ALL: [SourceId; 4] = [
        SourceId::Web,
        SourceId::Video,
        SourceId::Discussion,
        SourceId::Image,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SourceId::Web => "web",
            SourceId::Video => "video",
            SourceId::Discussion => "discussion",
            SourceId::Image => "image",
        }
    }

    pub fn is_primary(&self) -> bool {
        matches!(self, SourceId::Web)
    }

    /// Secondary sources, in splice priority order.
    pub fn secondary() -> impl Iterator<Item = SourceId> {
        Self::ALL.into_iter().filter(|s| !s.is_primary())
    }
}

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SourceId {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "web" => Ok(SourceId::Web),
            "video" => Ok(SourceId::Video),
            "discussion" => Ok(SourceId::Discussion),
            "image" => Ok(SourceId::Image),
            other => Err(AppError::InvalidInput(format!(
                "Unknown source: {}. Use one of: web, video, discussion, image",
                other
            ))),
        }
    }
}

/// Engagement counters reported by a provider. Missing counters are zero.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Engagement {
    #[serde(default)]
    pub views: u64,
    #[serde(default)]
    pub likes: u64,
    #[serde(default)]
    pub comments: u64,
}

impl Engagement {
    /// Single engagement figure; likes and comments weigh more than views.
    pub fn weighted_total(&self) -> f64 {
        self.views as f64 + 10.0 * self.likes as f64 + 20.0 * self.comments as f64
    }
}

/// Normalized record produced by a provider adapter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentItem {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub media_url: Option<String>,
    pub url: String,
    #[serde(default)]
    pub engagement: Engagement,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    /// True for locally generated fallback items.
    #[serde(default)]
    pub synthetic: bool,
}

/// Outcome of one source fetch. Failed results still carry fallback items.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceResult {
    pub source_id: SourceId,
    pub items: Vec<ContentItem>,
    pub succeeded: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diagnostic: Option<String>,
}

impl SourceResult {
    pub fn success(source_id: SourceId, items: Vec<ContentItem>) -> Self {
        Self {
            source_id,
            items,
            succeeded: true,
            diagnostic: None,
        }
    }

    pub fn fallback(source_id: SourceId, items: Vec<ContentItem>, diagnostic: String) -> Self {
        Self {
            source_id,
            items,
            succeeded: false,
            diagnostic: Some(diagnostic),
        }
    }
}

/// Per-query results, keyed by source so arrival order never matters.
pub type SourceMap = BTreeMap<SourceId, SourceResult>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Citation {
    pub title: String,
    pub url: String,
    pub domain: String,
}

impl Citation {
    pub fn new(title: impl Into<String>, url: impl Into<String>) -> Self {
        let url = url.into();
        let domain = domain_of(&url);
        Self {
            title: title.into(),
            url,
            domain,
        }
    }
}

/// Host of a URL without a leading `www.`; empty when unparseable.
pub fn domain_of(url: &str) -> String {
    reqwest::Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(|h| h.trim_start_matches("www.").to_string()))
        .unwrap_or_default()
}

// ============= API Request/Response Types =============

#[derive(Debug, Serialize, Deserialize)]
pub struct SearchRequest {
    pub query: String,
    #[serde(default)]
    pub prior_turns: Vec<Turn>,
    #[serde(default = "default_entitled")]
    pub is_entitled: bool,
}

fn default_entitled() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResponse {
    pub request_id: String,
    pub sources: SourceMap,
    pub fusion: FusionResult,
    pub duration_ms: u64,
}

// ============= Error Types =============

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Request cancelled")]
    Cancelled,

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<crate::synthesis::Cancelled> for AppError {
    fn from(_: crate::synthesis::Cancelled) -> Self {
        AppError::Cancelled
    }
}

impl axum::response::IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let (status, message) = match self {
            AppError::Configuration(msg) => (axum::http::StatusCode::INTERNAL_SERVER_ERROR, msg),
            AppError::InvalidInput(msg) => (axum::http::StatusCode::BAD_REQUEST, msg),
            AppError::Cancelled => (
                axum::http::StatusCode::SERVICE_UNAVAILABLE,
                "Request cancelled".to_string(),
            ),
            AppError::Internal(msg) => (axum::http::StatusCode::INTERNAL_SERVER_ERROR, msg),
        };

        let body = serde_json::json!({
            "error": message
        });

        (status, axum::Json(body)).into_response()
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
