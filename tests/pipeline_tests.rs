//! End-to-end pipeline: aggregation and synthesis run together, then the
//! fusion engine assembles the answer.

mod common;

use braid::fusion::{ContentFusionEngine, Placement, QualityTier};
use braid::orchestrator::FetchOrchestrator;
use braid::service::{SearchEvent, SearchService};
use braid::sources::{SourceClient, SourceError};
use braid::synthesis::{SynthesisClient, SynthesisSettings};
use braid::types::{AppError, SearchRequest, SourceId};
use common::mocks::{MockBackend, MockProvider, items};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

const NARRATIVE: &str = "^^Rust ownership explained^^\n\n\
    Rust uses ownership. [[video]]\n\n\
    Borrowing rules apply. [[image]]";

fn client(provider: MockProvider) -> SourceClient {
    SourceClient::new(Arc::new(provider), Duration::from_millis(300))
}

/// Video high tier, discussion medium tier, image low tier, web high tier.
fn healthy_sources() -> FetchOrchestrator {
    FetchOrchestrator::new(vec![
        client(MockProvider::returning(
            SourceId::Web,
            items("w", "rust ownership", 5, 500_000),
        )),
        client(MockProvider::returning(
            SourceId::Video,
            items("v", "rust ownership", 8, 500_000),
        )),
        client(MockProvider::returning(
            SourceId::Discussion,
            items("d", "rust ownership", 4, 500),
        )),
        client(MockProvider::returning(
            SourceId::Image,
            items("i", "rust ownership", 2, 5),
        )),
    ])
}

fn service(orchestrator: FetchOrchestrator, backend: MockBackend) -> SearchService {
    SearchService::new(
        orchestrator,
        SynthesisClient::new(Arc::new(backend), SynthesisSettings::default()),
        ContentFusionEngine::default(),
    )
}

#[tokio::test]
async fn test_qualifying_sources_are_spliced_into_the_narrative() {
    let response = service(healthy_sources(), MockBackend::new(NARRATIVE))
        .aggregate_and_synthesize("rust ownership", vec![], true)
        .await
        .unwrap();
    let fusion = &response.fusion;

    assert_eq!(fusion.headline, "Rust ownership explained");
    assert!(!fusion.body.contains("[["));
    assert!(fusion.body.starts_with("Rust uses ownership."));

    assert_eq!(fusion.assessments[&SourceId::Video].tier, QualityTier::High);
    assert_eq!(fusion.assessments[&SourceId::Discussion].tier, QualityTier::Medium);
    assert_eq!(fusion.assessments[&SourceId::Image].tier, QualityTier::Low);
    assert!(!fusion.assessments.contains_key(&SourceId::Web));

    let included: Vec<_> = fusion.included_sources.iter().copied().collect();
    assert_eq!(included, vec![SourceId::Video, SourceId::Discussion]);

    let video = &fusion.placements[0];
    assert_eq!(video.source_id, SourceId::Video);
    assert_eq!(video.placement, Placement::Inline);
    assert_eq!(video.item_ids.len(), 6);
    assert!(fusion.body[..video.offset].ends_with("ownership."));

    let discussion = &fusion.placements[1];
    assert_eq!(discussion.source_id, SourceId::Discussion);
    assert_eq!(discussion.placement, Placement::Appended);
    assert_eq!(discussion.item_ids.len(), 3);
    assert_eq!(discussion.offset, fusion.body.len());
    assert!(
        fusion
            .body
            .ends_with("See what people are saying about rust ownership.")
    );

    assert_eq!(fusion.citations.len(), 5);
    assert_eq!(fusion.more_citations, 1);
}

#[tokio::test]
async fn test_everything_failing_still_renders_an_answer() {
    let failing = |id| {
        client(MockProvider::failing(
            id,
            SourceError::Transport("unreachable".to_string()),
        ))
    };
    let orchestrator = FetchOrchestrator::new(SourceId::ALL.iter().map(|id| failing(*id)).collect());

    let response = service(orchestrator, MockBackend::failing())
        .aggregate_and_synthesize("sourdough starter", vec![], true)
        .await
        .unwrap();

    assert_eq!(response.sources.len(), 4);
    assert!(response.sources.values().all(|r| !r.succeeded && !r.items.is_empty()));
    assert!(!response.fusion.headline.is_empty());
    assert!(!response.fusion.body.is_empty());
    assert!(!response.fusion.body.contains("[["));
    assert!(!response.fusion.citations.is_empty());
}

#[tokio::test]
async fn test_web_source_is_never_spliced() {
    let text = "^^Headline^^ Body text [[web]] more text";
    let response = service(healthy_sources(), MockBackend::new(text))
        .aggregate_and_synthesize("rust ownership", vec![], true)
        .await
        .unwrap();

    assert!(!response.fusion.included_sources.contains(&SourceId::Web));
    assert!(!response.fusion.body.contains("[[web]]"));
    assert!(response.fusion.body.starts_with("Body text more text"));
}

#[tokio::test]
async fn test_source_failure_does_not_change_synthesis() {
    let orchestrator = FetchOrchestrator::new(vec![client(MockProvider::failing(
        SourceId::Video,
        SourceError::Auth("401".to_string()),
    ))]);

    let response = service(orchestrator, MockBackend::new(NARRATIVE))
        .aggregate_and_synthesize("rust ownership", vec![], true)
        .await
        .unwrap();

    assert_eq!(response.fusion.headline, "Rust ownership explained");
    assert!(!response.sources[&SourceId::Video].succeeded);
}

#[tokio::test]
async fn test_streaming_search_emits_deltas_then_result() {
    let backend = MockBackend::new("unused").streaming(&[
        "^^Rust ownership^^ ",
        "Values have ",
        "one owner. [[video]]",
    ]);
    let (tx, mut rx) = mpsc::channel(64);
    let request = SearchRequest {
        query: "rust ownership".to_string(),
        prior_turns: vec![],
        is_entitled: true,
    };

    let response = service(healthy_sources(), backend)
        .search_streaming(request, &CancellationToken::new(), tx)
        .await
        .unwrap();

    let mut deltas = String::new();
    let mut result = None;
    while let Some(event) = rx.recv().await {
        match event {
            SearchEvent::Delta(update) => {
                assert!(result.is_none(), "delta after result");
                deltas.push_str(&update.delta);
            }
            SearchEvent::Result(response) => result = Some(response),
            SearchEvent::Error(e) => panic!("unexpected error event: {}", e),
        }
    }

    assert_eq!(deltas, "^^Rust ownership^^ Values have one owner. [[video]]");
    let result = result.expect("result event");
    assert_eq!(result.request_id, response.request_id);
    assert_eq!(result.fusion.headline, "Rust ownership");
    assert_eq!(result.fusion.placements[0].source_id, SourceId::Video);
}

#[tokio::test]
async fn test_cancelling_synthesis_reports_cancelled() {
    let backend = MockBackend::new("slow").with_fast_delay(Duration::from_secs(5));
    let token = CancellationToken::new();
    let request = SearchRequest {
        query: "rust".to_string(),
        prior_turns: vec![],
        is_entitled: true,
    };

    let canceller = {
        let token = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            token.cancel();
        })
    };

    let err = service(healthy_sources(), backend)
        .search(request, &token)
        .await
        .unwrap_err();
    canceller.await.unwrap();
    assert!(matches!(err, AppError::Cancelled));
}

#[tokio::test]
async fn test_no_sources_configured_still_answers() {
    let response = service(FetchOrchestrator::new(vec![]), MockBackend::failing())
        .aggregate_and_synthesize("tea", vec![], false)
        .await
        .unwrap();
    assert!(response.sources.is_empty());
    assert!(response.fusion.placements.is_empty());
    assert!(response.fusion.included_sources.is_empty());
    assert!(!response.fusion.body.is_empty());
    assert!(!response.fusion.body.contains("[["));
}
