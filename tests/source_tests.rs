//! HTTP provider behavior against a mock server: payload adaptation and
//! failure classification through `SourceClient`.

use braid::sources::{FallbackGenerator, HttpSourceProvider, SourceClient, SourceProvider};
use braid::types::{Query, SourceId};
use rstest::rstest;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client(server: &MockServer, id: SourceId) -> SourceClient {
    let provider = HttpSourceProvider::new(id, format!("{}/search", server.uri()))
        .unwrap()
        .with_max_items(3);
    SourceClient::new(Arc::new(provider), Duration::from_millis(500))
        .with_fallback(FallbackGenerator::new(2))
}

#[tokio::test]
async fn test_video_payload_is_normalized() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/search"))
        .and(query_param("q", "rust async"))
        .and(query_param("limit", "3"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "items": [
                {
                    "id": { "kind": "youtube#video", "videoId": "abc123" },
                    "snippet": {
                        "title": "Async Rust in depth",
                        "description": "Futures and executors",
                        "publishedAt": "2024-03-01T12:00:00Z",
                        "thumbnails": { "high": { "url": "https://img.example/abc.jpg" } }
                    },
                    "statistics": { "viewCount": "125000", "likeCount": "4000" }
                },
                { "id": "plain-id", "snippet": { "title": "" } }
            ]
        })))
        .mount(&server)
        .await;

    let result = client(&server, SourceId::Video)
        .fetch(&Query::new("rust async"))
        .await;

    assert!(result.succeeded, "{:?}", result.diagnostic);
    assert_eq!(result.items.len(), 2);

    let first = &result.items[0];
    assert_eq!(first.id, "abc123");
    assert_eq!(first.url, "https://www.youtube.com/watch?v=abc123");
    assert_eq!(first.engagement.views, 125_000);
    assert_eq!(first.engagement.likes, 4_000);
    assert_eq!(first.media_url.as_deref(), Some("https://img.example/abc.jpg"));
    assert!(first.created_at.is_some());
    assert!(!first.synthetic);

    assert_eq!(result.items[1].title, "Untitled video");
}

#[tokio::test]
async fn test_discussion_listing_skips_non_posts() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/search"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": {
                "children": [
                    { "kind": "t3", "data": {
                        "id": "p1",
                        "title": "Is async Rust worth it?",
                        "permalink": "/r/rust/comments/p1/",
                        "score": 812,
                        "num_comments": 140,
                        "created_utc": 1700000000.0
                    }},
                    { "kind": "t5", "data": { "id": "sub" } }
                ]
            }
        })))
        .mount(&server)
        .await;

    let result = client(&server, SourceId::Discussion)
        .fetch(&Query::new("async rust"))
        .await;

    assert!(result.succeeded);
    assert_eq!(result.items.len(), 1);
    assert_eq!(result.items[0].url, "https://www.reddit.com/r/rust/comments/p1/");
    assert_eq!(result.items[0].engagement.comments, 140);
}

#[tokio::test]
async fn test_items_are_capped_at_max_items() {
    let server = MockServer::start().await;
    let results: Vec<_> = (0..10)
        .map(|i| json!({ "title": format!("Result {}", i), "url": format!("https://r.example/{}", i) }))
        .collect();
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "results": results })))
        .mount(&server)
        .await;

    let result = client(&server, SourceId::Web).fetch(&Query::new("rust")).await;
    assert!(result.succeeded);
    assert_eq!(result.items.len(), 3);
}

#[tokio::test]
async fn test_zero_matches_is_success_without_fallback() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "items": [] })))
        .mount(&server)
        .await;

    let result = client(&server, SourceId::Image)
        .fetch(&Query::new("nothing matches this"))
        .await;
    assert!(result.succeeded);
    assert!(result.items.is_empty());
    assert!(result.diagnostic.is_none());
}

#[rstest]
#[case(401, "auth")]
#[case(403, "auth")]
#[case(404, "not-found")]
#[case(429, "rate-limit")]
#[case(500, "transport")]
#[case(503, "transport")]
#[tokio::test]
async fn test_status_codes_are_classified(#[case] status: u16, #[case] kind: &str) {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(status).set_body_string("upstream says no"))
        .mount(&server)
        .await;

    let result = client(&server, SourceId::Video).fetch(&Query::new("rust")).await;

    assert!(!result.succeeded);
    assert_eq!(result.items.len(), 2);
    assert!(result.items.iter().all(|i| i.synthetic));
    let diagnostic = result.diagnostic.unwrap();
    assert!(diagnostic.contains(kind), "{}", diagnostic);
}

#[tokio::test]
async fn test_unparseable_body_is_malformed() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>not json</html>"))
        .mount(&server)
        .await;

    let result = client(&server, SourceId::Web).fetch(&Query::new("rust")).await;
    assert!(!result.succeeded);
    assert!(result.diagnostic.unwrap().contains("malformed"));
}

#[tokio::test]
async fn test_slow_provider_times_out() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "items": [] }))
                .set_delay(Duration::from_secs(3)),
        )
        .mount(&server)
        .await;

    let started = std::time::Instant::now();
    let result = client(&server, SourceId::Video).fetch(&Query::new("rust")).await;

    assert!(started.elapsed() < Duration::from_secs(2));
    assert!(!result.succeeded);
    assert!(result.diagnostic.unwrap().contains("timeout"));
}

#[tokio::test]
async fn test_api_key_is_sent_as_bearer() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(header("authorization", "Bearer secret-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "items": [] })))
        .expect(1)
        .mount(&server)
        .await;

    let provider = HttpSourceProvider::new(SourceId::Image, format!("{}/search", server.uri()))
        .unwrap()
        .with_api_key(Some("secret-key".to_string()));

    let items = provider.search(&Query::new("rust")).await.unwrap();
    assert!(items.is_empty());
}

#[tokio::test]
async fn test_fallback_items_are_stable_per_query() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let client = client(&server, SourceId::Discussion);
    let first = client.fetch(&Query::new("sourdough starter")).await;
    let second = client.fetch(&Query::new("  sourdough starter ")).await;
    let other = client.fetch(&Query::new("pizza dough")).await;

    assert_eq!(first.items, second.items);
    assert_ne!(first.items, other.items);
}
