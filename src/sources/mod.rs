//! Source Clients
//!
//! One client per content provider. A client wraps a fallible
//! [`SourceProvider`] and turns every outcome into a [`SourceResult`]:
//!
//! - live items on success (possibly empty for a legitimate zero-match query)
//! - a deterministic fallback item set plus a classified diagnostic on
//!   timeout, auth, rate-limit, not-found, transport or malformed-payload
//!   failures
//!
//! `SourceClient::fetch` never returns an error and never outlives its
//! configured timeout.
//!
//! # Example
//!
//! ```ignore
//! use braid::sources::{HttpSourceProvider, SourceClient};
//! use braid::types::{Query, SourceId};
//!
//! let provider = HttpSourceProvider::new(SourceId::Video, "https://videos.example/search")?;
//! let client = SourceClient::new(Arc::new(provider), Duration::from_secs(6));
//! let result = client.fetch(&Query::new("rust ownership")).await;
//! assert!(!result.items.is_empty() || result.succeeded);
//! ```

/// Failure taxonomy and HTTP status classification.
pub mod error;
/// Deterministic fallback item generation.
pub mod fallback;
/// HTTP provider implementation.
pub mod http;
/// Provider-specific payload parsers.
pub mod parsers;

pub use error::{FailureKind, SourceError};
pub use fallback::FallbackGenerator;
pub use http::HttpSourceProvider;

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

use crate::types::{ContentItem, Query, SourceId, SourceResult};

/// Raw provider adapter. Free to fail; [`SourceClient`] absorbs the failure.
#[async_trait]
pub trait SourceProvider: Send + Sync {
    /// Source this provider serves
    fn id(&self) -> SourceId;

    /// Search the provider for the query
    async fn search(&self, query: &Query) -> Result<Vec<ContentItem>, SourceError>;
}

/// Fault-isolating wrapper around a provider.
#[derive(Clone)]
pub struct SourceClient {
    provider: Arc<dyn SourceProvider>,
    timeout: Duration,
    fallback: FallbackGenerator,
}

impl SourceClient {
    pub fn new(provider: Arc<dyn SourceProvider>, timeout: Duration) -> Self {
        Self {
            provider,
            timeout,
            fallback: FallbackGenerator::default(),
        }
    }

    pub fn with_fallback(mut self, fallback: FallbackGenerator) -> Self {
        self.fallback = fallback;
        self
    }

    pub fn id(&self) -> SourceId {
        self.provider.id()
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Fetch items for the query. Always returns within the timeout.
    pub async fn fetch(&self, query: &Query) -> SourceResult {
        let id = self.id();
        let outcome = match tokio::time::timeout(self.timeout, self.provider.search(query)).await
        {
            Ok(result) => result,
            Err(_) => Err(SourceError::Timeout(format!(
                "no response within {} ms",
                self.timeout.as_millis()
            ))),
        };

        match outcome {
            Ok(items) => SourceResult::success(id, items),
            Err(err) => self.fall_back(query, &err),
        }
    }

    /// Fallback result for a failure that happened outside `fetch`
    /// (for example a panicked task).
    pub fn fallback_result(&self, query: &Query, err: &SourceError) -> SourceResult {
        self.fall_back(query, err)
    }

    fn fall_back(&self, query: &Query, err: &SourceError) -> SourceResult {
        let id = self.id();
        tracing::warn!(
            source = %id,
            kind = %err.kind(),
            error = %err,
            "Source unavailable, using fallback items"
        );

        let diagnostic = format!("{} source unavailable ({}): {}", id, err.kind(), err);
        SourceResult::fallback(id, self.fallback.generate(id, query), diagnostic)
    }
}
