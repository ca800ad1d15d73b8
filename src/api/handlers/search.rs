use crate::{
    AppState,
    service::SearchEvent,
    types::{AppError, Result, SearchRequest, SearchResponse},
};
use axum::{
    Json,
    extract::State,
    response::sse::{Event, KeepAlive, Sse},
};
use futures::Stream;
use std::convert::Infallible;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Aggregate all sources, synthesize the narrative and fuse them.
///
/// The cancellation token is tied to this handler: if the client goes away
/// the handler future is dropped and the synthesis stops.
pub async fn search(
    State(state): State<AppState>,
    Json(payload): Json<SearchRequest>,
) -> Result<Json<SearchResponse>> {
    let token = CancellationToken::new();
    let _guard = token.clone().drop_guard();

    let service = state.search.service();
    let response = service.search(payload, &token).await?;
    Ok(Json(response))
}

/// Streaming search over server-sent events.
///
/// Emits `delta` events carrying newly committed narrative text and ends
/// with a single `result` event (or `error` for a rejected request).
pub async fn search_stream(
    State(state): State<AppState>,
    Json(payload): Json<SearchRequest>,
) -> Result<Sse<impl Stream<Item = std::result::Result<Event, Infallible>>>> {
    if payload.query.trim().is_empty() {
        return Err(AppError::InvalidInput("Query cannot be empty".to_string()));
    }

    let token = CancellationToken::new();
    let guard = token.clone().drop_guard();
    let (tx, mut rx) = mpsc::channel::<SearchEvent>(64);

    let service = state.search.service();
    let errors = tx.clone();
    tokio::spawn(async move {
        match service.search_streaming(payload, &token, tx).await {
            Ok(_) => {}
            Err(AppError::Cancelled) => {
                tracing::debug!("Streaming search cancelled by client");
            }
            Err(e) => {
                let _ = errors.send(SearchEvent::Error(e.to_string())).await;
            }
        }
    });

    let stream = async_stream::stream! {
        // Dropping the response stream cancels the pipeline
        let _guard = guard;
        while let Some(event) = rx.recv().await {
            yield Ok::<Event, Infallible>(to_sse_event(&event));
        }
    };

    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}

fn to_sse_event(event: &SearchEvent) -> Event {
    let built = match event {
        SearchEvent::Delta(update) => Event::default().event("delta").json_data(update),
        SearchEvent::Result(response) => Event::default().event("result").json_data(response),
        SearchEvent::Error(message) => Ok(Event::default()
            .event("error")
            .data(serde_json::json!({ "error": message }).to_string())),
    };

    built.unwrap_or_else(|e| {
        tracing::error!(error = %e, "Failed to encode search event");
        Event::default().event("error").data("failed to encode event")
    })
}
