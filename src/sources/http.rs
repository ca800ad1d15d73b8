//! HTTP-backed source provider.
//!
//! One request per query against the provider's search endpoint; the body
//! is handed to the provider-specific [`PayloadParser`].

use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;

use super::parsers::{PayloadParser, parser_for};
use super::{SourceError, SourceProvider};
use crate::types::{ContentItem, Query, SourceId};

pub struct HttpSourceProvider {
    id: SourceId,
    http: Client,
    endpoint: String,
    api_key: Option<String>,
    max_items: usize,
    parser: PayloadParser,
}

impl HttpSourceProvider {
    pub fn new(id: SourceId, endpoint: impl Into<String>) -> Result<Self, SourceError> {
        let http = Client::builder()
            .user_agent(concat!("braid-server/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(Duration::from_secs(4))
            .build()
            .map_err(|e| SourceError::Transport(format!("failed to build client: {}", e)))?;

        Ok(Self {
            id,
            http,
            endpoint: endpoint.into(),
            api_key: None,
            max_items: 8,
            parser: parser_for(id),
        })
    }

    pub fn with_api_key(mut self, api_key: Option<String>) -> Self {
        self.api_key = api_key.filter(|k| !k.is_empty());
        self
    }

    pub fn with_max_items(mut self, max_items: usize) -> Self {
        self.max_items = max_items.max(1);
        self
    }

    /// Override the payload parser (mainly for providers sharing a shape).
    pub fn with_parser(mut self, parser: PayloadParser) -> Self {
        self.parser = parser;
        self
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl SourceProvider for HttpSourceProvider {
    fn id(&self) -> SourceId {
        self.id
    }

    async fn search(&self, query: &Query) -> Result<Vec<ContentItem>, SourceError> {
        let limit = self.max_items.to_string();
        let mut request = self
            .http
            .get(&self.endpoint)
            .query(&[("q", query.text()), ("limit", limit.as_str())]);

        if let Some(ref key) = self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(SourceError::from_status(status, &body));
        }

        let mut items = (self.parser)(&body)?;
        items.truncate(self.max_items);

        tracing::debug!(
            source = %self.id,
            items = items.len(),
            "Parsed provider payload"
        );

        Ok(items)
    }
}
