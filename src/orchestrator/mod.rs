//! Fan-out/fan-in over the configured source clients.
//!
//! One task per client, all joined before returning. A failed or slow
//! source never cancels its siblings: [`SourceClient::fetch`] already turns
//! every failure into a fallback result, and the orchestrator fills in a
//! fallback for any task that died before reporting.

pub mod cache;

pub use cache::{CacheConfig, CacheStats, InMemoryResultCache, ResultCache};

use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinSet;

use crate::sources::{SourceClient, SourceError};
use crate::types::{Query, SourceId, SourceMap, SourceResult};

pub struct FetchOrchestrator {
    clients: Vec<SourceClient>,
    cache: Option<Arc<dyn ResultCache>>,
    cache_ttl: Option<Duration>,
}

impl FetchOrchestrator {
    pub fn new(clients: Vec<SourceClient>) -> Self {
        Self {
            clients,
            cache: None,
            cache_ttl: None,
        }
    }

    /// Attach a result cache. Only successful results are stored.
    pub fn with_cache(mut self, cache: Arc<dyn ResultCache>, ttl: Option<Duration>) -> Self {
        self.cache = Some(cache);
        self.cache_ttl = ttl;
        self
    }

    pub fn sources(&self) -> Vec<SourceId> {
        self.clients.iter().map(SourceClient::id).collect()
    }

    pub fn cache(&self) -> Option<&Arc<dyn ResultCache>> {
        self.cache.as_ref()
    }

    /// Query every configured source concurrently and collect one result
    /// per source.
    pub async fn aggregate(&self, query: &Query) -> SourceMap {
        let mut set = JoinSet::new();

        for client in &self.clients {
            let client = client.clone();
            let query = query.clone();
            let cache = self.cache.clone();
            let ttl = self.cache_ttl;

            set.spawn(async move { fetch_one(client, query, cache, ttl).await });
        }

        let mut results = SourceMap::new();
        while let Some(joined) = set.join_next().await {
            match joined {
                Ok(result) => {
                    results.insert(result.source_id, result);
                }
                Err(e) => {
                    tracing::error!(error = %e, "Source task failed before reporting");
                }
            }
        }

        for client in &self.clients {
            let id = client.id();
            if !results.contains_key(&id) {
                let err = SourceError::Transport("source task aborted".to_string());
                results.insert(id, client.fallback_result(query, &err));
            }
        }

        results
    }
}

async fn fetch_one(
    client: SourceClient,
    query: Query,
    cache: Option<Arc<dyn ResultCache>>,
    ttl: Option<Duration>,
) -> SourceResult {
    let id = client.id();
    let started = Instant::now();
    let key = cache.as_ref().map(|c| c.compute_key(id, &query));

    if let (Some(cache), Some(key)) = (cache.as_ref(), key.as_deref())
        && let Some(hit) = cache.get(key)
    {
        log_outcome(&hit, started, true);
        return hit;
    }

    let result = client.fetch(&query).await;

    if result.succeeded
        && let (Some(cache), Some(key)) = (cache.as_ref(), key.as_deref())
    {
        cache.put(key, result.clone(), ttl);
    }

    log_outcome(&result, started, false);
    result
}

fn log_outcome(result: &SourceResult, started: Instant, cached: bool) {
    tracing::info!(
        source = %result.source_id,
        duration_ms = started.elapsed().as_millis() as u64,
        succeeded = result.succeeded,
        items = result.items.len(),
        cached,
        "Source settled"
    );
}
