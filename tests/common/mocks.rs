//! Mock implementations for testing.
//!
//! Providers and synthesis backends with scripted behavior, shared across
//! the integration test files.

use async_trait::async_trait;
use braid::sources::{SourceError, SourceProvider};
use braid::synthesis::{
    AttemptMode, ChunkStream, Completion, SynthesisBackend, SynthesisError, SynthesisRequest,
};
use braid::types::{ContentItem, Engagement, Query, SourceId};
use futures::stream::{self, StreamExt};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

// ============= Source Providers =============

/// Provider returning a fixed outcome after an optional delay.
pub struct MockProvider {
    id: SourceId,
    outcome: Result<Vec<ContentItem>, SourceError>,
    delay: Duration,
    calls: Arc<AtomicUsize>,
}

impl MockProvider {
    pub fn returning(id: SourceId, items: Vec<ContentItem>) -> Self {
        Self {
            id,
            outcome: Ok(items),
            delay: Duration::ZERO,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn failing(id: SourceId, err: SourceError) -> Self {
        Self {
            id,
            outcome: Err(err),
            delay: Duration::ZERO,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Shared counter of `search` invocations.
    pub fn calls(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.calls)
    }
}

#[async_trait]
impl SourceProvider for MockProvider {
    fn id(&self) -> SourceId {
        self.id
    }

    async fn search(&self, _query: &Query) -> Result<Vec<ContentItem>, SourceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.outcome.clone()
    }
}

/// Provider that panics, to exercise task isolation.
pub struct PanickingProvider(pub SourceId);

#[async_trait]
impl SourceProvider for PanickingProvider {
    fn id(&self) -> SourceId {
        self.0
    }

    async fn search(&self, _query: &Query) -> Result<Vec<ContentItem>, SourceError> {
        panic!("provider exploded");
    }
}

/// A live item whose title and description mention `topic`.
pub fn item(id: &str, topic: &str, views: u64) -> ContentItem {
    ContentItem {
        id: id.to_string(),
        title: format!("{} explained", topic),
        description: format!("Everything about {}", topic),
        media_url: None,
        url: format!("https://content.example/{}", id),
        engagement: Engagement {
            views,
            likes: views / 20,
            comments: views / 100,
        },
        created_at: None,
        synthetic: false,
    }
}

/// `count` items about `topic`, all with the same view count.
pub fn items(prefix: &str, topic: &str, count: usize, views: u64) -> Vec<ContentItem> {
    (0..count)
        .map(|i| item(&format!("{}-{}", prefix, i), topic, views))
        .collect()
}

// ============= Synthesis Backends =============

/// Scripted blocking and streaming responses.
#[derive(Clone)]
pub struct MockBackend {
    fast: Result<Completion, SynthesisError>,
    web: Result<Completion, SynthesisError>,
    chunks: Option<Vec<Result<String, SynthesisError>>>,
    chunk_delay: Duration,
    fast_delay: Duration,
    calls: Arc<AtomicUsize>,
    chunks_polled: Arc<AtomicUsize>,
    stream_dropped: Arc<AtomicBool>,
}

/// Sets its flag when the stream that owns it is dropped.
struct DropFlag(Arc<AtomicBool>);

impl Drop for DropFlag {
    fn drop(&mut self) {
        self.0.store(true, Ordering::SeqCst);
    }
}

impl MockBackend {
    /// Fast attempt succeeds with `text`; streaming unsupported.
    pub fn new(text: &str) -> Self {
        Self {
            fast: Ok(completion(text)),
            web: Err(SynthesisError::Empty),
            chunks: None,
            chunk_delay: Duration::ZERO,
            fast_delay: Duration::ZERO,
            calls: Arc::new(AtomicUsize::new(0)),
            chunks_polled: Arc::new(AtomicUsize::new(0)),
            stream_dropped: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Every remote attempt fails.
    pub fn failing() -> Self {
        Self {
            fast: Err(SynthesisError::Transport("connection refused".to_string())),
            web: Err(SynthesisError::Transport("connection refused".to_string())),
            ..Self::new("")
        }
    }

    pub fn with_fast(mut self, result: Result<Completion, SynthesisError>) -> Self {
        self.fast = result;
        self
    }

    pub fn with_web(mut self, result: Result<Completion, SynthesisError>) -> Self {
        self.web = result;
        self
    }

    pub fn with_fast_delay(mut self, delay: Duration) -> Self {
        self.fast_delay = delay;
        self
    }

    /// Stream the given chunks, then end.
    pub fn streaming(mut self, chunks: &[&str]) -> Self {
        self.chunks = Some(chunks.iter().map(|c| Ok(c.to_string())).collect());
        self
    }

    /// Stream an explicit chunk sequence, errors included.
    pub fn streaming_results(mut self, chunks: Vec<Result<String, SynthesisError>>) -> Self {
        self.chunks = Some(chunks);
        self
    }

    pub fn with_chunk_delay(mut self, delay: Duration) -> Self {
        self.chunk_delay = delay;
        self
    }

    /// Shared counter of blocking `complete` invocations.
    pub fn calls(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.calls)
    }

    /// Shared counter of chunks pulled from the stream by the consumer.
    pub fn chunks_polled(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.chunks_polled)
    }

    /// Set once the consumer has dropped the stream.
    pub fn stream_dropped(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.stream_dropped)
    }
}

pub fn completion(text: &str) -> Completion {
    Completion {
        text: text.to_string(),
        citations: vec![],
    }
}

#[async_trait]
impl SynthesisBackend for MockBackend {
    async fn complete(
        &self,
        _request: &SynthesisRequest,
        mode: AttemptMode,
    ) -> Result<Completion, SynthesisError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match mode {
            AttemptMode::Fast => {
                if !self.fast_delay.is_zero() {
                    tokio::time::sleep(self.fast_delay).await;
                }
                self.fast.clone()
            }
            AttemptMode::WebSearch => self.web.clone(),
        }
    }

    async fn stream(&self, _request: &SynthesisRequest) -> Result<ChunkStream, SynthesisError> {
        let Some(chunks) = self.chunks.clone() else {
            return Err(SynthesisError::StreamingUnsupported);
        };
        let delay = self.chunk_delay;
        let polled = Arc::clone(&self.chunks_polled);
        let guard = DropFlag(Arc::clone(&self.stream_dropped));
        Ok(stream::iter(chunks)
            .then(move |chunk| {
                let _held = &guard;
                let polled = Arc::clone(&polled);
                async move {
                    polled.fetch_add(1, Ordering::SeqCst);
                    if !delay.is_zero() {
                        tokio::time::sleep(delay).await;
                    }
                    chunk
                }
            })
            .boxed())
    }

    fn model_name(&self, mode: AttemptMode) -> &str {
        match mode {
            AttemptMode::Fast => "mock-fast",
            AttemptMode::WebSearch => "mock-web",
        }
    }
}
