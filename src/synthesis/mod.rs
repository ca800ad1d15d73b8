//! Narrative Synthesis
//!
//! Per query turn the client walks a fixed sequence of states:
//!
//! ```text
//! Idle -> FastAttempt -> (done | WebSearchAttempt) -> (done | MockFallback) -> Complete
//! ```
//!
//! Each remote attempt has its own timeout. Every failure moves to the next
//! state, and `MockFallback` always succeeds, so the only error a caller can
//! see is [`Cancelled`].
//!
//! The streaming variant consumes an incremental chunk channel into a
//! [`NarrativeDraft`], publishing each committed delta. The stream is
//! dropped (closing its connection) as soon as the word budget is reached,
//! the caller cancels, or the stream deadline passes. If the backend cannot
//! stream, the blocking sequence runs and its text is delivered as a single
//! update.

pub mod backend;
pub mod draft;
pub mod mock;
pub mod prompt;

pub use backend::{
    AttemptMode, ChatCompletionBackend, ChatMessage, ChunkStream, Completion, SynthesisBackend,
    SynthesisError, SynthesisRequest,
};
pub use draft::NarrativeDraft;
pub use mock::{generic_citations, mock_narrative};

use futures::StreamExt;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::types::{Citation, Query};

// ============= State & Trace Types =============

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SynthesisState {
    Idle,
    FastAttempt,
    WebSearchAttempt,
    MockFallback,
    Complete,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptOutcome {
    Succeeded,
    Failed,
    TimedOut,
    Skipped,
}

/// One visited state and how it ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttemptRecord {
    pub state: SynthesisState,
    pub outcome: AttemptOutcome,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    pub duration_ms: u64,
}

impl AttemptRecord {
    fn new(
        state: SynthesisState,
        outcome: AttemptOutcome,
        detail: Option<String>,
        started: Instant,
    ) -> Self {
        tracing::info!(
            state = ?state,
            outcome = ?outcome,
            detail = detail.as_deref().unwrap_or(""),
            duration_ms = started.elapsed().as_millis() as u64,
            "Synthesis state settled"
        );
        Self {
            state,
            outcome,
            detail,
            duration_ms: started.elapsed().as_millis() as u64,
        }
    }
}

/// Final narrative for one query turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Narrative {
    pub text: String,
    pub citations: Vec<Citation>,
    /// State whose output became the text
    pub resolved_by: SynthesisState,
    pub trace: Vec<AttemptRecord>,
    /// True when the word budget cut the text short
    pub truncated: bool,
    pub streamed: bool,
}

/// Incremental update published by the streaming path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DraftUpdate {
    /// Newly committed text, to be appended to what was already shown
    pub delta: String,
    pub word_count: usize,
    pub complete: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("synthesis cancelled")]
pub struct Cancelled;

// ============= Client =============

#[derive(Debug, Clone)]
pub struct SynthesisSettings {
    pub word_budget: usize,
    pub max_tokens: u32,
    pub temperature: f32,
    pub fast_timeout: Duration,
    pub web_timeout: Duration,
    pub stream_timeout: Duration,
}

impl Default for SynthesisSettings {
    fn default() -> Self {
        Self {
            word_budget: 200,
            max_tokens: 300,
            temperature: 0.3,
            fast_timeout: Duration::from_secs(5),
            web_timeout: Duration::from_secs(15),
            stream_timeout: Duration::from_secs(20),
        }
    }
}

pub struct SynthesisClient {
    backend: Option<Arc<dyn SynthesisBackend>>,
    settings: SynthesisSettings,
}

impl SynthesisClient {
    pub fn new(backend: Arc<dyn SynthesisBackend>, settings: SynthesisSettings) -> Self {
        Self {
            backend: Some(backend),
            settings,
        }
    }

    /// A client with no remote backend; every turn resolves to the mock.
    pub fn offline(settings: SynthesisSettings) -> Self {
        Self {
            backend: None,
            settings,
        }
    }

    pub fn settings(&self) -> &SynthesisSettings {
        &self.settings
    }

    fn request_for(&self, query: &Query) -> SynthesisRequest {
        prompt::build_request(
            query,
            self.settings.word_budget,
            self.settings.max_tokens,
            self.settings.temperature,
        )
    }

    /// Produce a narrative in one shot. Web search is skipped for
    /// non-entitled callers.
    pub async fn synthesize(
        &self,
        query: &Query,
        is_entitled: bool,
        token: &CancellationToken,
    ) -> Result<Narrative, Cancelled> {
        self.run_blocking(query, is_entitled, token, Vec::new()).await
    }

    async fn run_blocking(
        &self,
        query: &Query,
        is_entitled: bool,
        token: &CancellationToken,
        mut trace: Vec<AttemptRecord>,
    ) -> Result<Narrative, Cancelled> {
        if token.is_cancelled() {
            return Err(Cancelled);
        }

        let request = self.request_for(query);

        if let Some(completion) = self
            .attempt(&request, AttemptMode::Fast, token, &mut trace)
            .await?
        {
            let citations = if completion.citations.is_empty() {
                generic_citations(query)
            } else {
                completion.citations
            };
            return Ok(self.finish(
                &completion.text,
                citations,
                SynthesisState::FastAttempt,
                trace,
            ));
        }

        if is_entitled {
            if let Some(completion) = self
                .attempt(&request, AttemptMode::WebSearch, token, &mut trace)
                .await?
            {
                let citations = if completion.citations.is_empty() {
                    generic_citations(query)
                } else {
                    completion.citations
                };
                return Ok(self.finish(
                    &completion.text,
                    citations,
                    SynthesisState::WebSearchAttempt,
                    trace,
                ));
            }
        } else {
            trace.push(AttemptRecord::new(
                SynthesisState::WebSearchAttempt,
                AttemptOutcome::Skipped,
                Some("caller not entitled to web search".to_string()),
                Instant::now(),
            ));
        }

        let started = Instant::now();
        let text = mock_narrative(query);
        trace.push(AttemptRecord::new(
            SynthesisState::MockFallback,
            AttemptOutcome::Succeeded,
            None,
            started,
        ));
        Ok(self.finish(
            &text,
            generic_citations(query),
            SynthesisState::MockFallback,
            trace,
        ))
    }

    /// One remote attempt. `Ok(None)` means move on to the next state.
    async fn attempt(
        &self,
        request: &SynthesisRequest,
        mode: AttemptMode,
        token: &CancellationToken,
        trace: &mut Vec<AttemptRecord>,
    ) -> Result<Option<Completion>, Cancelled> {
        let (state, timeout) = match mode {
            AttemptMode::Fast => (SynthesisState::FastAttempt, self.settings.fast_timeout),
            AttemptMode::WebSearch => (SynthesisState::WebSearchAttempt, self.settings.web_timeout),
        };
        let started = Instant::now();

        let Some(backend) = self.backend.as_ref() else {
            trace.push(AttemptRecord::new(
                state,
                AttemptOutcome::Skipped,
                Some("no synthesis backend configured".to_string()),
                started,
            ));
            return Ok(None);
        };

        tracing::debug!(model = backend.model_name(mode), state = ?state, "Starting synthesis attempt");

        let outcome = tokio::select! {
            _ = token.cancelled() => return Err(Cancelled),
            result = tokio::time::timeout(timeout, backend.complete(request, mode)) => result,
        };

        let record = match outcome {
            Ok(Ok(completion)) => {
                trace.push(AttemptRecord::new(
                    state,
                    AttemptOutcome::Succeeded,
                    None,
                    started,
                ));
                return Ok(Some(completion));
            }
            Ok(Err(e)) => {
                tracing::warn!(state = ?state, error = %e, "Synthesis attempt failed");
                AttemptRecord::new(state, AttemptOutcome::Failed, Some(e.to_string()), started)
            }
            Err(_) => AttemptRecord::new(
                state,
                AttemptOutcome::TimedOut,
                Some(format!("no response within {} ms", timeout.as_millis())),
                started,
            ),
        };
        trace.push(record);
        Ok(None)
    }

    fn finish(
        &self,
        text: &str,
        citations: Vec<Citation>,
        resolved_by: SynthesisState,
        trace: Vec<AttemptRecord>,
    ) -> Narrative {
        let draft = NarrativeDraft::from_text(text, self.settings.word_budget);
        Narrative {
            truncated: draft.is_truncated(),
            text: draft.into_text(),
            citations,
            resolved_by,
            trace,
            streamed: false,
        }
    }

    /// Produce a narrative incrementally, publishing each committed delta on
    /// `updates` in arrival order.
    pub async fn synthesize_streaming(
        &self,
        query: &Query,
        is_entitled: bool,
        token: &CancellationToken,
        updates: mpsc::Sender<DraftUpdate>,
    ) -> Result<Narrative, Cancelled> {
        if token.is_cancelled() {
            return Err(Cancelled);
        }

        let mut trace = Vec::new();
        let started = Instant::now();

        let Some(backend) = self.backend.as_ref() else {
            return self
                .blocking_as_single_update(query, is_entitled, token, trace, &updates)
                .await;
        };

        let request = self.request_for(query);
        let deadline = tokio::time::sleep(self.settings.stream_timeout);
        tokio::pin!(deadline);

        let opened = tokio::select! {
            _ = token.cancelled() => return Err(Cancelled),
            _ = &mut deadline => Err(SynthesisError::Timeout("stream did not open in time".to_string())),
            result = backend.stream(&request) => result,
        };

        let mut stream = match opened {
            Ok(stream) => stream,
            Err(e) => {
                let outcome = match e {
                    SynthesisError::Timeout(_) => AttemptOutcome::TimedOut,
                    _ => AttemptOutcome::Failed,
                };
                trace.push(AttemptRecord::new(
                    SynthesisState::FastAttempt,
                    outcome,
                    Some(format!("streaming: {}", e)),
                    started,
                ));
                return self
                    .blocking_as_single_update(query, is_entitled, token, trace, &updates)
                    .await;
            }
        };

        let mut draft = NarrativeDraft::new(self.settings.word_budget);
        let mut failure: Option<SynthesisError> = None;
        let mut chunks: u64 = 0;
        let mut closed = false;

        loop {
            tokio::select! {
                _ = token.cancelled() => {
                    tracing::warn!(chunks, words = draft.word_count(), "Synthesis stream cancelled");
                    return Err(Cancelled);
                }
                _ = &mut deadline => {
                    failure = Some(SynthesisError::Timeout("stream deadline passed".to_string()));
                    break;
                }
                item = stream.next() => match item {
                    Some(Ok(chunk)) => {
                        chunks += 1;
                        let delta = draft.push_chunk(&chunk);
                        if !delta.is_empty() {
                            closed = publish(&updates, delta, &draft).await;
                        }
                        if draft.is_complete() {
                            tracing::debug!(chunks, "Word budget reached, closing stream");
                            break;
                        }
                    }
                    Some(Err(e)) => {
                        failure = Some(e);
                        break;
                    }
                    None => break,
                }
            }
        }
        drop(stream);

        let tail = draft.finish();
        if draft.word_count() == 0 {
            let detail = failure
                .map(|e| format!("streaming: {}", e))
                .unwrap_or_else(|| "streaming: no text received".to_string());
            trace.push(AttemptRecord::new(
                SynthesisState::FastAttempt,
                AttemptOutcome::Failed,
                Some(detail),
                started,
            ));
            return self
                .blocking_as_single_update(query, is_entitled, token, trace, &updates)
                .await;
        }

        if let Some(e) = failure {
            tracing::warn!(error = %e, words = draft.word_count(), "Synthesis stream ended early, keeping partial text");
        }
        if !tail.is_empty() {
            closed = publish(&updates, tail, &draft).await;
        }
        if !closed {
            let _ = updates
                .send(DraftUpdate {
                    delta: String::new(),
                    word_count: draft.word_count(),
                    complete: true,
                })
                .await;
        }

        trace.push(AttemptRecord::new(
            SynthesisState::FastAttempt,
            AttemptOutcome::Succeeded,
            Some(format!("streamed {} chunks", chunks)),
            started,
        ));

        Ok(Narrative {
            truncated: draft.is_truncated(),
            text: draft.into_text(),
            citations: generic_citations(query),
            resolved_by: SynthesisState::FastAttempt,
            trace,
            streamed: true,
        })
    }

    async fn blocking_as_single_update(
        &self,
        query: &Query,
        is_entitled: bool,
        token: &CancellationToken,
        trace: Vec<AttemptRecord>,
        updates: &mpsc::Sender<DraftUpdate>,
    ) -> Result<Narrative, Cancelled> {
        let narrative = self.run_blocking(query, is_entitled, token, trace).await?;
        let _ = updates
            .send(DraftUpdate {
                delta: narrative.text.clone(),
                word_count: narrative.text.split_whitespace().count(),
                complete: true,
            })
            .await;
        Ok(narrative)
    }
}

/// Returns whether the published update was the terminal one.
async fn publish(updates: &mpsc::Sender<DraftUpdate>, delta: String, draft: &NarrativeDraft) -> bool {
    let complete = draft.is_complete();
    let update = DraftUpdate {
        delta,
        word_count: draft.word_count(),
        complete,
    };
    // A closed receiver only means nobody is watching the draft
    let _ = updates.send(update).await;
    complete
}
