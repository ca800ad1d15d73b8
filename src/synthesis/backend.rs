//! Remote narrative generation.
//!
//! [`SynthesisBackend`] is the seam between the synthesis state machine and
//! the network. [`ChatCompletionBackend`] talks to any OpenAI-compatible
//! `/chat/completions` endpoint and accepts either a single JSON body or a
//! server-sent-event body on the streaming path.

use async_trait::async_trait;
use eventsource_stream::Eventsource;
use futures::StreamExt;
use futures::stream::BoxStream;
use reqwest::{Client, StatusCode, header};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::sources::{FailureKind, SourceError};
use crate::types::Citation;

// ============= Request/Response Types =============

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn new(role: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SynthesisRequest {
    pub messages: Vec<ChatMessage>,
    pub max_tokens: u32,
    pub temperature: f32,
}

/// Which remote attempt a blocking call belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptMode {
    /// Short timeout, no web augmentation.
    Fast,
    /// Longer timeout, web-augmented, returns citation metadata.
    WebSearch,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Completion {
    pub text: String,
    pub citations: Vec<Citation>,
}

/// Incremental text chunks in arrival order. Dropping the stream releases
/// the underlying connection.
pub type ChunkStream = BoxStream<'static, Result<String, SynthesisError>>;

// ============= Errors =============

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SynthesisError {
    #[error("network error: {0}")]
    Transport(String),

    #[error("request timed out: {0}")]
    Timeout(String),

    #[error("credentials rejected: {0}")]
    Auth(String),

    #[error("rate limit exceeded: {0}")]
    RateLimit(String),

    #[error("unreadable response: {0}")]
    Malformed(String),

    #[error("completion contained no text")]
    Empty,

    #[error("backend does not support incremental delivery")]
    StreamingUnsupported,
}

impl SynthesisError {
    pub fn from_status(status: StatusCode, body: &str) -> Self {
        SourceError::from_status(status, body).into()
    }
}

impl From<SourceError> for SynthesisError {
    fn from(err: SourceError) -> Self {
        let detail = err.to_string();
        match err.kind() {
            FailureKind::Timeout => SynthesisError::Timeout(detail),
            FailureKind::Auth => SynthesisError::Auth(detail),
            FailureKind::RateLimit => SynthesisError::RateLimit(detail),
            FailureKind::Malformed => SynthesisError::Malformed(detail),
            FailureKind::Transport | FailureKind::NotFound => SynthesisError::Transport(detail),
        }
    }
}

impl From<reqwest::Error> for SynthesisError {
    fn from(err: reqwest::Error) -> Self {
        SourceError::from(err).into()
    }
}

impl From<serde_json::Error> for SynthesisError {
    fn from(err: serde_json::Error) -> Self {
        SynthesisError::Malformed(err.to_string())
    }
}

// ============= Backend Trait =============

#[async_trait]
pub trait SynthesisBackend: Send + Sync {
    /// Generate the whole narrative in one response.
    async fn complete(
        &self,
        request: &SynthesisRequest,
        mode: AttemptMode,
    ) -> Result<Completion, SynthesisError>;

    /// Open an incremental token channel.
    async fn stream(&self, _request: &SynthesisRequest) -> Result<ChunkStream, SynthesisError> {
        Err(SynthesisError::StreamingUnsupported)
    }

    /// Model used for the given attempt, for logs
    fn model_name(&self, mode: AttemptMode) -> &str;
}

// ============= OpenAI-compatible Backend =============

pub struct ChatCompletionBackend {
    http: Client,
    base_url: String,
    api_key: Option<String>,
    fast_model: String,
    web_model: String,
}

impl ChatCompletionBackend {
    pub fn new(
        base_url: impl Into<String>,
        fast_model: impl Into<String>,
        web_model: impl Into<String>,
    ) -> Result<Self, SynthesisError> {
        let http = Client::builder()
            .user_agent(concat!("braid-server/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(Duration::from_secs(4))
            .build()
            .map_err(|e| SynthesisError::Transport(format!("failed to build client: {}", e)))?;

        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: None,
            fast_model: fast_model.into(),
            web_model: web_model.into(),
        })
    }

    pub fn with_api_key(mut self, api_key: Option<String>) -> Self {
        self.api_key = api_key.filter(|k| !k.is_empty());
        self
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }

    async fn send(&self, body: &ChatBody<'_>) -> Result<reqwest::Response, SynthesisError> {
        let mut request = self.http.post(self.endpoint()).json(body);
        if let Some(ref key) = self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(SynthesisError::from_status(status, &text));
        }
        Ok(response)
    }
}

#[derive(Serialize)]
struct ChatBody<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    web_search_options: Option<serde_json::Value>,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ResponseChoice>,
}

#[derive(Deserialize)]
struct ResponseChoice {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    annotations: Vec<Annotation>,
}

#[derive(Deserialize)]
struct Annotation {
    #[serde(default)]
    url_citation: Option<UrlCitation>,
}

#[derive(Deserialize)]
struct UrlCitation {
    url: String,
    #[serde(default)]
    title: String,
}

#[derive(Deserialize)]
struct StreamChunk {
    #[serde(default)]
    choices: Vec<StreamChoice>,
}

#[derive(Deserialize)]
struct StreamChoice {
    #[serde(default)]
    delta: StreamDelta,
}

#[derive(Deserialize, Default)]
struct StreamDelta {
    #[serde(default)]
    content: Option<String>,
}

fn parse_completion(body: &str) -> Result<Completion, SynthesisError> {
    let response: ChatResponse = serde_json::from_str(body)?;
    let message = response
        .choices
        .into_iter()
        .next()
        .map(|c| c.message)
        .ok_or_else(|| SynthesisError::Malformed("no choices in response".to_string()))?;

    let text = message.content.unwrap_or_default();
    if text.trim().is_empty() {
        return Err(SynthesisError::Empty);
    }

    let mut citations: Vec<Citation> = Vec::new();
    for cite in message.annotations.into_iter().filter_map(|a| a.url_citation) {
        if citations.iter().any(|c| c.url == cite.url) {
            continue;
        }
        let citation = Citation::new(cite.title, cite.url);
        let citation = if citation.title.trim().is_empty() {
            Citation {
                title: citation.domain.clone(),
                ..citation
            }
        } else {
            citation
        };
        citations.push(citation);
    }

    Ok(Completion { text, citations })
}

#[async_trait]
impl SynthesisBackend for ChatCompletionBackend {
    async fn complete(
        &self,
        request: &SynthesisRequest,
        mode: AttemptMode,
    ) -> Result<Completion, SynthesisError> {
        let web = mode == AttemptMode::WebSearch;
        let body = ChatBody {
            model: self.model_name(mode),
            messages: &request.messages,
            max_tokens: request.max_tokens,
            // search-augmented models reject sampling parameters
            temperature: (!web).then_some(request.temperature),
            stream: false,
            web_search_options: web.then(|| serde_json::json!({})),
        };

        let response = self.send(&body).await?;
        let text = response.text().await?;
        parse_completion(&text)
    }

    async fn stream(&self, request: &SynthesisRequest) -> Result<ChunkStream, SynthesisError> {
        let body = ChatBody {
            model: &self.fast_model,
            messages: &request.messages,
            max_tokens: request.max_tokens,
            temperature: Some(request.temperature),
            stream: true,
            web_search_options: None,
        };

        let response = self.send(&body).await?;
        let is_sse = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| v.starts_with("text/event-stream"));

        if !is_sse {
            // Server ignored the stream flag: deliver the body as one chunk.
            let text = response.text().await?;
            let completion = parse_completion(&text)?;
            return Ok(futures::stream::once(async move { Ok(completion.text) }).boxed());
        }

        let mut events = response.bytes_stream().eventsource();
        let stream = async_stream::stream! {
            while let Some(event) = events.next().await {
                match event {
                    Ok(event) => {
                        if event.data == "[DONE]" {
                            tracing::debug!("Synthesis stream finished");
                            break;
                        }
                        match serde_json::from_str::<StreamChunk>(&event.data) {
                            Ok(chunk) => {
                                for content in chunk
                                    .choices
                                    .into_iter()
                                    .filter_map(|c| c.delta.content)
                                    .filter(|c| !c.is_empty())
                                {
                                    yield Ok(content);
                                }
                            }
                            Err(e) => {
                                yield Err(SynthesisError::from(e));
                                break;
                            }
                        }
                    }
                    Err(e) => {
                        yield Err(SynthesisError::Transport(format!("stream error: {}", e)));
                        break;
                    }
                }
            }
        };

        Ok(stream.boxed())
    }

    fn model_name(&self, mode: AttemptMode) -> &str {
        match mode {
            AttemptMode::Fast => &self.fast_model,
            AttemptMode::WebSearch => &self.web_model,
        }
    }
}
