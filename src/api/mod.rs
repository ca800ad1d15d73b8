//! HTTP API Handlers and Routes
//!
//! This module provides the REST API layer for Braid, built on the Axum web framework.
//!
//! # Module Structure
//!
//! - [`api::handlers`](crate::api::handlers) - Request handlers for each endpoint
//! - [`api::routes`](crate::api::routes) - Route definitions and router configuration
//!
//! # API Endpoints
//!
//! ## Search (`/api/search`)
//! - `POST /api/search` - Run the full pipeline and return the structured answer
//! - `POST /api/search/stream` - Same pipeline as server-sent events: `delta`
//!   events while the narrative is written, then one `result` event
//!
//! ## Health
//! - `GET /health` - Liveness probe
//!
//! Closing the connection cancels the in-flight synthesis for that request.

/// Request and response handlers for all API endpoints.
pub mod handlers;
/// Router configuration and route definitions.
pub mod routes;
