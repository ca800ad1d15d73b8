//! # Braid - multi-source search aggregation
//!
//! Braid answers a single search query by combining several independent,
//! unreliable content providers into one structured answer:
//!
//! - a primary generated narrative from a chat-completion endpoint, either
//!   in one shot or streamed word by word under a hard word budget
//! - secondary content from video, discussion and image providers, spliced
//!   into the narrative when it is relevant and popular enough
//!
//! Every provider may fail independently. Failed sources fall back to
//! deterministic local items and failed synthesis falls back to a templated
//! narrative, so a request always produces a renderable answer.
//!
//! ## Quick Start (Library Usage)
//!
//! ```rust,ignore
//! use braid::{BraidConfig, SearchService};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = BraidConfig::load("braid.toml")?;
//!     let service = SearchService::from_config(&config)?;
//!
//!     let response = service
//!         .aggregate_and_synthesize("best hiking trails near Denver", vec![], true)
//!         .await?;
//!     println!("{}", response.fusion.headline);
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Modules
//!
//! - [`sources`] - Provider adapters with timeout, classification and fallback
//! - [`orchestrator`] - Concurrent fan-out/fan-in with a result cache
//! - [`synthesis`] - Narrative state machine, streaming and word budget
//! - [`fusion`] - Headline split, tiering and content-block placement
//! - [`service`] - End-to-end pipeline
//! - [`api`] - REST and server-sent-event handlers
//! - [`types`] - Common types and error handling

#![warn(rustdoc::missing_crate_level_docs)]

/// HTTP API handlers and routes.
pub mod api;
/// Command-line interface.
pub mod cli;
/// Narrative and source fusion.
pub mod fusion;
/// Concurrent source aggregation.
pub mod orchestrator;
/// End-to-end search pipeline.
pub mod service;
/// Content source clients.
pub mod sources;
/// Narrative synthesis.
pub mod synthesis;
/// Core types (requests, responses, errors).
pub mod types;
/// Configuration and hashing helpers.
pub mod utils;

// Re-export commonly used types
pub use fusion::{ContentFusionEngine, FusionResult, QualityTier};
pub use orchestrator::FetchOrchestrator;
pub use service::{SearchEvent, SearchService, ServiceHandle};
pub use sources::{SourceClient, SourceProvider};
pub use synthesis::{Narrative, SynthesisClient};
pub use types::{AppError, Result};
pub use utils::toml_config::{BraidConfig, BraidConfigManager};

use std::sync::Arc;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// TOML configuration with hot-reload support
    pub config_manager: Arc<BraidConfigManager>,
    /// Current search pipeline, rebuilt after configuration reloads
    pub search: Arc<ServiceHandle>,
}
