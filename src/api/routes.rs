use crate::AppState;
use crate::api::handlers::{health, search};
use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{get, post},
};
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

/// Request bodies carry a query and a few prior turns.
const MAX_BODY_BYTES: usize = 64 * 1024;

pub fn create_router() -> Router<AppState> {
    Router::new()
        .route("/search", post(search::search))
        .route("/search/stream", post(search::search_stream))
}

/// Full application: health probe, `/api` routes and shared layers.
pub fn build_app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health::health))
        .nest("/api", create_router())
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors)
                .layer(DefaultBodyLimit::max(MAX_BODY_BYTES)),
        )
        .with_state(state)
}
