//! End-to-end search pipeline.
//!
//! Source aggregation and narrative synthesis run concurrently for each
//! query; fusion runs once both have settled. Cancelling the synthesis
//! never cancels the source fetches for the same query.

use arc_swap::ArcSwap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::fusion::ContentFusionEngine;
use crate::orchestrator::{CacheConfig, FetchOrchestrator, InMemoryResultCache};
use crate::sources::{FallbackGenerator, HttpSourceProvider, SourceClient};
use crate::synthesis::{ChatCompletionBackend, DraftUpdate, SynthesisClient};
use crate::types::{AppError, Query, Result, SearchRequest, SearchResponse, Turn};
use crate::utils::toml_config::{BraidConfig, BraidConfigManager};

/// Event published by the streaming pipeline.
#[derive(Debug, Clone, serde::Serialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum SearchEvent {
    /// Newly committed narrative text
    Delta(DraftUpdate),
    /// Final structured answer; the last event of a successful search
    Result(Box<SearchResponse>),
    /// Terminal failure (invalid input), published instead of a result
    Error(String),
}

pub struct SearchService {
    orchestrator: FetchOrchestrator,
    synthesis: SynthesisClient,
    fusion: ContentFusionEngine,
}

impl SearchService {
    pub fn new(
        orchestrator: FetchOrchestrator,
        synthesis: SynthesisClient,
        fusion: ContentFusionEngine,
    ) -> Self {
        Self {
            orchestrator,
            synthesis,
            fusion,
        }
    }

    /// Build the full pipeline from configuration.
    pub fn from_config(config: &BraidConfig) -> Result<Self> {
        let mut clients = Vec::new();
        for (id, source) in config.enabled_sources() {
            let endpoint = source.endpoint.as_deref().ok_or_else(|| {
                AppError::Configuration(format!("source '{}' has no endpoint", id))
            })?;
            let api_key = source
                .api_key_env
                .as_deref()
                .and_then(|env| config.resolve_env(env));

            let provider = HttpSourceProvider::new(id, endpoint)
                .map_err(|e| AppError::Configuration(e.to_string()))?
                .with_api_key(api_key)
                .with_max_items(source.max_items);

            clients.push(
                SourceClient::new(Arc::new(provider), Duration::from_millis(source.timeout_ms))
                    .with_fallback(FallbackGenerator::new(source.fallback_items)),
            );
        }

        let mut orchestrator = FetchOrchestrator::new(clients);
        if config.cache.enabled {
            let cache = InMemoryResultCache::new(CacheConfig {
                max_entries: config.cache.max_entries,
                default_ttl: None,
                enabled: true,
            });
            orchestrator = orchestrator.with_cache(
                Arc::new(cache),
                Some(Duration::from_secs(config.cache.ttl_secs)),
            );
        }

        let settings = config.synthesis.settings();
        let synthesis = match config.synthesis.base_url.as_deref() {
            Some(base_url) => {
                let backend = ChatCompletionBackend::new(
                    base_url,
                    config.synthesis.fast_model.as_str(),
                    config.synthesis.web_model.as_str(),
                )
                .map_err(|e| AppError::Configuration(e.to_string()))?
                .with_api_key(config.resolve_env(&config.synthesis.api_key_env));
                SynthesisClient::new(Arc::new(backend), settings)
            }
            None => {
                tracing::warn!("No synthesis endpoint configured, answers use the offline template");
                SynthesisClient::offline(settings)
            }
        };

        Ok(Self::new(
            orchestrator,
            synthesis,
            ContentFusionEngine::new(config.fusion.settings()),
        ))
    }

    pub fn orchestrator(&self) -> &FetchOrchestrator {
        &self.orchestrator
    }

    /// One-shot entry point for callers that do not need cancellation.
    pub async fn aggregate_and_synthesize(
        &self,
        query: &str,
        prior_turns: Vec<Turn>,
        is_entitled: bool,
    ) -> Result<SearchResponse> {
        let request = SearchRequest {
            query: query.to_string(),
            prior_turns,
            is_entitled,
        };
        self.search(request, &CancellationToken::new()).await
    }

    pub async fn search(
        &self,
        request: SearchRequest,
        token: &CancellationToken,
    ) -> Result<SearchResponse> {
        let query = parse_query(request.query, request.prior_turns)?;
        let started = Instant::now();

        let (sources, narrative) = tokio::join!(
            self.orchestrator.aggregate(&query),
            self.synthesis.synthesize(&query, request.is_entitled, token),
        );
        let narrative = narrative?;
        let fusion = self.fusion.fuse(&query, &narrative, &sources);

        let response = SearchResponse {
            request_id: uuid::Uuid::new_v4().to_string(),
            sources,
            fusion,
            duration_ms: started.elapsed().as_millis() as u64,
        };
        log_response(&response, &narrative.resolved_by);
        Ok(response)
    }

    /// Streaming variant: narrative deltas are published as they are
    /// committed, followed by one final [`SearchEvent::Result`].
    pub async fn search_streaming(
        &self,
        request: SearchRequest,
        token: &CancellationToken,
        events: mpsc::Sender<SearchEvent>,
    ) -> Result<SearchResponse> {
        let query = parse_query(request.query, request.prior_turns)?;
        let started = Instant::now();
        let (draft_tx, mut draft_rx) = mpsc::channel::<DraftUpdate>(64);

        let forward = {
            let events = events.clone();
            async move {
                while let Some(update) = draft_rx.recv().await {
                    if events.send(SearchEvent::Delta(update)).await.is_err() {
                        break;
                    }
                }
            }
        };

        let (sources, narrative, ()) = tokio::join!(
            self.orchestrator.aggregate(&query),
            self.synthesis
                .synthesize_streaming(&query, request.is_entitled, token, draft_tx),
            forward,
        );
        let narrative = narrative?;
        let fusion = self.fusion.fuse(&query, &narrative, &sources);

        let response = SearchResponse {
            request_id: uuid::Uuid::new_v4().to_string(),
            sources,
            fusion,
            duration_ms: started.elapsed().as_millis() as u64,
        };
        log_response(&response, &narrative.resolved_by);

        let _ = events
            .send(SearchEvent::Result(Box::new(response.clone())))
            .await;
        Ok(response)
    }
}

fn parse_query(text: String, prior_turns: Vec<Turn>) -> Result<Query> {
    let query = Query::with_history(text, prior_turns);
    if query.text().is_empty() {
        return Err(AppError::InvalidInput("Query cannot be empty".to_string()));
    }
    Ok(query)
}

fn log_response(response: &SearchResponse, resolved_by: &crate::synthesis::SynthesisState) {
    let live = response.sources.values().filter(|r| r.succeeded).count();
    tracing::info!(
        request_id = %response.request_id,
        duration_ms = response.duration_ms,
        sources = response.sources.len(),
        live_sources = live,
        included = response.fusion.included_sources.len(),
        narrative = ?resolved_by,
        "Search completed"
    );
}

// ============= Shared Handle =============

struct Versioned {
    generation: u64,
    service: Arc<SearchService>,
}

/// Hands out the current [`SearchService`], rebuilding it after the
/// configuration file was hot-reloaded.
pub struct ServiceHandle {
    config: Option<Arc<BraidConfigManager>>,
    current: ArcSwap<Versioned>,
}

impl ServiceHandle {
    pub fn from_manager(config: Arc<BraidConfigManager>) -> Result<Self> {
        let generation = config.generation();
        let service = SearchService::from_config(&config.config())?;
        Ok(Self {
            config: Some(config),
            current: ArcSwap::from_pointee(Versioned {
                generation,
                service: Arc::new(service),
            }),
        })
    }

    /// A handle that never rebuilds (tests, embedding).
    pub fn fixed(service: SearchService) -> Self {
        Self {
            config: None,
            current: ArcSwap::from_pointee(Versioned {
                generation: 0,
                service: Arc::new(service),
            }),
        }
    }

    pub fn service(&self) -> Arc<SearchService> {
        let current = self.current.load();
        let Some(config) = self.config.as_ref() else {
            return Arc::clone(&current.service);
        };

        let generation = config.generation();
        if generation == current.generation {
            return Arc::clone(&current.service);
        }

        match SearchService::from_config(&config.config()) {
            Ok(service) => {
                let service = Arc::new(service);
                self.current.store(Arc::new(Versioned {
                    generation,
                    service: Arc::clone(&service),
                }));
                tracing::info!(generation, "Search pipeline rebuilt from reloaded configuration");
                service
            }
            Err(e) => {
                tracing::warn!(error = %e, "Failed to rebuild search pipeline, keeping previous");
                Arc::clone(&current.service)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::synthesis::SynthesisSettings;

    fn offline_service() -> SearchService {
        SearchService::new(
            FetchOrchestrator::new(vec![]),
            SynthesisClient::offline(SynthesisSettings::default()),
            ContentFusionEngine::default(),
        )
    }

    #[tokio::test]
    async fn test_blank_query_is_rejected() {
        let err = offline_service()
            .aggregate_and_synthesize("   ", vec![], true)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn test_cancelled_search_reports_cancellation() {
        let token = CancellationToken::new();
        token.cancel();
        let request = SearchRequest {
            query: "rust".to_string(),
            prior_turns: vec![],
            is_entitled: true,
        };
        let err = offline_service().search(request, &token).await.unwrap_err();
        assert!(matches!(err, AppError::Cancelled));
    }

    #[tokio::test]
    async fn test_streaming_ends_with_result_event() {
        let (tx, mut rx) = mpsc::channel(16);
        let request = SearchRequest {
            query: "rust".to_string(),
            prior_turns: vec![],
            is_entitled: true,
        };
        let response = offline_service()
            .search_streaming(request, &CancellationToken::new(), tx)
            .await
            .unwrap();

        let mut events = Vec::new();
        while let Some(event) = rx.recv().await {
            events.push(event);
        }
        assert!(matches!(events.first(), Some(SearchEvent::Delta(_))));
        match events.last() {
            Some(SearchEvent::Result(result)) => assert_eq!(result.request_id, response.request_id),
            other => panic!("expected result event, got {:?}", other),
        }
    }
}
