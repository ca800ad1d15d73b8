//! TOML-based configuration for Braid
//!
//! This module provides declarative configuration for the server, the
//! synthesis endpoint, each content source, fusion thresholds and the
//! result cache via a TOML file (`braid.toml`).
//!
//! Secrets never live in the file. Components name the environment variable
//! that holds their key (`api_key_env`), and the binary loads `.env` with
//! `dotenvy` before reading the configuration.
//!
//! # Hot Reloading
//!
//! Configuration changes are automatically detected and applied at runtime.
//! Use `BraidConfigManager` for thread-safe access to the current configuration.

use arc_swap::ArcSwap;
use notify::{Event, RecommendedWatcher, RecursiveMode, Watcher};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

use crate::fusion::{FusionSettings, FusionThresholds};
use crate::synthesis::SynthesisSettings;
use crate::types::SourceId;

/// Root configuration structure loaded from braid.toml
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BraidConfig {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub synthesis: SynthesisConfig,

    /// Per-source provider settings, keyed by source name
    #[serde(default)]
    pub sources: BTreeMap<SourceId, SourceConfig>,

    #[serde(default)]
    pub fusion: FusionConfig,

    #[serde(default)]
    pub cache: CacheSection,
}

// ============= Server Configuration =============

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            log_level: default_log_level(),
        }
    }
}

// ============= Synthesis Configuration =============

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SynthesisConfig {
    /// OpenAI-compatible base URL. Without it every answer is the offline template.
    #[serde(default)]
    pub base_url: Option<String>,

    #[serde(default = "default_synthesis_key_env")]
    pub api_key_env: String,

    #[serde(default = "default_fast_model")]
    pub fast_model: String,

    #[serde(default = "default_web_model")]
    pub web_model: String,

    /// Hard cap on narrative words
    #[serde(default = "default_word_budget")]
    pub word_budget: usize,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    #[serde(default = "default_fast_timeout_ms")]
    pub fast_timeout_ms: u64,

    #[serde(default = "default_web_timeout_ms")]
    pub web_timeout_ms: u64,

    #[serde(default = "default_stream_timeout_ms")]
    pub stream_timeout_ms: u64,

    #[serde(default = "default_temperature")]
    pub temperature: f32,
}

fn default_synthesis_key_env() -> String {
    "BRAID_SYNTHESIS_API_KEY".to_string()
}

fn default_fast_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_web_model() -> String {
    "gpt-4o-mini-search-preview".to_string()
}

fn default_word_budget() -> usize {
    200
}

fn default_max_tokens() -> u32 {
    300
}

fn default_fast_timeout_ms() -> u64 {
    5_000
}

fn default_web_timeout_ms() -> u64 {
    15_000
}

fn default_stream_timeout_ms() -> u64 {
    20_000
}

fn default_temperature() -> f32 {
    0.3
}

impl Default for SynthesisConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            api_key_env: default_synthesis_key_env(),
            fast_model: default_fast_model(),
            web_model: default_web_model(),
            word_budget: default_word_budget(),
            max_tokens: default_max_tokens(),
            fast_timeout_ms: default_fast_timeout_ms(),
            web_timeout_ms: default_web_timeout_ms(),
            stream_timeout_ms: default_stream_timeout_ms(),
            temperature: default_temperature(),
        }
    }
}

impl SynthesisConfig {
    pub fn settings(&self) -> SynthesisSettings {
        SynthesisSettings {
            word_budget: self.word_budget,
            max_tokens: self.max_tokens,
            temperature: self.temperature,
            fast_timeout: Duration::from_millis(self.fast_timeout_ms),
            web_timeout: Duration::from_millis(self.web_timeout_ms),
            stream_timeout: Duration::from_millis(self.stream_timeout_ms),
        }
    }
}

// ============= Source Configuration =============

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Search endpoint, queried with `?q=<query>&limit=<max_items>`
    #[serde(default)]
    pub endpoint: Option<String>,

    #[serde(default)]
    pub api_key_env: Option<String>,

    #[serde(default = "default_source_timeout_ms")]
    pub timeout_ms: u64,

    #[serde(default = "default_max_items")]
    pub max_items: usize,

    /// Items generated locally when the provider fails
    #[serde(default = "default_fallback_items")]
    pub fallback_items: usize,
}

fn default_true() -> bool {
    true
}

fn default_source_timeout_ms() -> u64 {
    6_000
}

fn default_max_items() -> usize {
    8
}

fn default_fallback_items() -> usize {
    4
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            endpoint: None,
            api_key_env: None,
            timeout_ms: default_source_timeout_ms(),
            max_items: default_max_items(),
            fallback_items: default_fallback_items(),
        }
    }
}

// ============= Fusion Configuration =============

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FusionConfig {
    #[serde(default = "default_high_relevance")]
    pub high_relevance: f64,

    #[serde(default = "default_high_popularity")]
    pub high_popularity: f64,

    #[serde(default = "default_medium_relevance")]
    pub medium_relevance: f64,

    #[serde(default = "default_medium_popularity")]
    pub medium_popularity: f64,

    #[serde(default = "default_relevance_floor")]
    pub relevance_floor: f64,

    /// Engagement total treated as maximally popular
    #[serde(default = "default_popularity_reference")]
    pub popularity_reference: f64,

    #[serde(default = "default_headline_max_words")]
    pub headline_max_words: usize,

    #[serde(default = "default_max_citations")]
    pub max_citations: usize,

    #[serde(default = "default_high_tier_items")]
    pub high_tier_items: usize,

    #[serde(default = "default_medium_tier_items")]
    pub medium_tier_items: usize,
}

fn default_high_relevance() -> f64 {
    0.5
}

fn default_high_popularity() -> f64 {
    0.6
}

fn default_medium_relevance() -> f64 {
    0.25
}

fn default_medium_popularity() -> f64 {
    0.3
}

fn default_relevance_floor() -> f64 {
    0.1
}

fn default_popularity_reference() -> f64 {
    1_000_000.0
}

fn default_headline_max_words() -> usize {
    20
}

fn default_max_citations() -> usize {
    5
}

fn default_high_tier_items() -> usize {
    6
}

fn default_medium_tier_items() -> usize {
    3
}

impl Default for FusionConfig {
    fn default() -> Self {
        Self {
            high_relevance: default_high_relevance(),
            high_popularity: default_high_popularity(),
            medium_relevance: default_medium_relevance(),
            medium_popularity: default_medium_popularity(),
            relevance_floor: default_relevance_floor(),
            popularity_reference: default_popularity_reference(),
            headline_max_words: default_headline_max_words(),
            max_citations: default_max_citations(),
            high_tier_items: default_high_tier_items(),
            medium_tier_items: default_medium_tier_items(),
        }
    }
}

impl FusionConfig {
    pub fn thresholds(&self) -> FusionThresholds {
        FusionThresholds {
            high_relevance: self.high_relevance,
            high_popularity: self.high_popularity,
            medium_relevance: self.medium_relevance,
            medium_popularity: self.medium_popularity,
            relevance_floor: self.relevance_floor,
            popularity_reference: self.popularity_reference,
        }
    }

    pub fn settings(&self) -> FusionSettings {
        FusionSettings {
            thresholds: self.thresholds(),
            headline_max_words: self.headline_max_words,
            max_citations: self.max_citations,
            high_tier_items: self.high_tier_items,
            medium_tier_items: self.medium_tier_items,
        }
    }
}

// ============= Cache Configuration =============

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheSection {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_cache_ttl_secs")]
    pub ttl_secs: u64,

    #[serde(default = "default_cache_max_entries")]
    pub max_entries: usize,
}

fn default_cache_ttl_secs() -> u64 {
    900
}

fn default_cache_max_entries() -> usize {
    512
}

impl Default for CacheSection {
    fn default() -> Self {
        Self {
            enabled: true,
            ttl_secs: default_cache_ttl_secs(),
            max_entries: default_cache_max_entries(),
        }
    }
}

// ============= Configuration Loading & Validation =============

/// Configuration warnings that don't prevent operation but may indicate issues
#[derive(Debug, Clone)]
pub struct ConfigWarning {
    pub kind: ConfigWarningKind,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ConfigWarningKind {
    NoSources,
    DisabledSource,
    OfflineSynthesis,
}

impl std::fmt::Display for ConfigWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

/// Errors that can occur during configuration loading
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Configuration file not found: {0}")]
    FileNotFound(PathBuf),

    #[error("Failed to read configuration file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Environment variable '{0}' referenced in config is not set")]
    MissingEnvVar(String),

    #[error("Watch error: {0}")]
    WatchError(#[from] notify::Error),
}

impl BraidConfig {
    /// Load configuration from a TOML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.to_path_buf()));
        }

        let content = fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Parse and validate configuration text
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: BraidConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate value ranges, cross-field consistency and env var availability
    pub fn validate(&self) -> Result<(), ConfigError> {
        let synthesis = &self.synthesis;
        if synthesis.word_budget == 0 {
            return Err(ConfigError::ValidationError(
                "synthesis.word_budget must be greater than zero".to_string(),
            ));
        }
        if synthesis.fast_timeout_ms >= synthesis.web_timeout_ms {
            return Err(ConfigError::ValidationError(format!(
                "synthesis.fast_timeout_ms ({}) must be shorter than web_timeout_ms ({})",
                synthesis.fast_timeout_ms, synthesis.web_timeout_ms
            )));
        }
        if synthesis.base_url.is_some() {
            self.validate_env_var(&synthesis.api_key_env)?;
        }

        let fusion = &self.fusion;
        for (name, value) in [
            ("high_relevance", fusion.high_relevance),
            ("high_popularity", fusion.high_popularity),
            ("medium_relevance", fusion.medium_relevance),
            ("medium_popularity", fusion.medium_popularity),
            ("relevance_floor", fusion.relevance_floor),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigError::ValidationError(format!(
                    "fusion.{} must be within [0, 1], got {}",
                    name, value
                )));
            }
        }
        if fusion.high_relevance < fusion.medium_relevance
            || fusion.high_popularity < fusion.medium_popularity
        {
            return Err(ConfigError::ValidationError(
                "fusion high thresholds must be at least as strict as medium thresholds"
                    .to_string(),
            ));
        }
        if fusion.popularity_reference <= 0.0 {
            return Err(ConfigError::ValidationError(
                "fusion.popularity_reference must be positive".to_string(),
            ));
        }

        for (id, source) in self.enabled_sources() {
            let endpoint = source.endpoint.as_deref().unwrap_or("").trim();
            if endpoint.is_empty() {
                return Err(ConfigError::ValidationError(format!(
                    "sources.{} is enabled but has no endpoint",
                    id
                )));
            }
            if let Some(ref env) = source.api_key_env {
                self.validate_env_var(env)?;
            }
        }

        Ok(())
    }

    /// Validate configuration and report non-fatal issues
    pub fn validate_with_warnings(&self) -> Result<Vec<ConfigWarning>, ConfigError> {
        self.validate()?;

        let mut warnings = Vec::new();

        if self.enabled_sources().next().is_none() {
            warnings.push(ConfigWarning {
                kind: ConfigWarningKind::NoSources,
                message: "No sources are enabled; answers will have no content blocks".to_string(),
            });
        }

        warnings.extend(
            self.sources
                .iter()
                .filter(|(_, source)| !source.enabled)
                .map(|(id, _)| ConfigWarning {
                    kind: ConfigWarningKind::DisabledSource,
                    message: format!("Source '{}' is configured but disabled", id),
                }),
        );

        if self.synthesis.base_url.is_none() {
            warnings.push(ConfigWarning {
                kind: ConfigWarningKind::OfflineSynthesis,
                message: "synthesis.base_url is not set; every answer uses the offline template"
                    .to_string(),
            });
        }

        Ok(warnings)
    }

    fn validate_env_var(&self, name: &str) -> Result<(), ConfigError> {
        std::env::var(name).map_err(|_| ConfigError::MissingEnvVar(name.to_string()))?;
        Ok(())
    }

    /// Get a resolved value from an env var reference
    pub fn resolve_env(&self, env_name: &str) -> Option<String> {
        std::env::var(env_name).ok()
    }

    /// Enabled sources in source order
    pub fn enabled_sources(&self) -> impl Iterator<Item = (SourceId, &SourceConfig)> {
        self.sources
            .iter()
            .filter(|(_, source)| source.enabled)
            .map(|(id, source)| (*id, source))
    }
}

// ============= Hot Reloading Configuration Manager =============

/// Thread-safe configuration manager with hot reloading support
pub struct BraidConfigManager {
    config: Arc<ArcSwap<BraidConfig>>,
    generation: Arc<AtomicU64>,
    config_path: PathBuf,
    watcher: RwLock<Option<RecommendedWatcher>>,
    reload_tx: Option<mpsc::UnboundedSender<()>>,
}

impl BraidConfigManager {
    /// Create a new configuration manager and load the initial config
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        // Convert to absolute path for reliable file watching
        let path = path.as_ref();
        let path = if path.is_absolute() {
            path.to_path_buf()
        } else {
            std::env::current_dir()
                .map_err(ConfigError::ReadError)?
                .join(path)
        };

        let config = BraidConfig::load(&path)?;

        Ok(Self {
            config: Arc::new(ArcSwap::from_pointee(config)),
            generation: Arc::new(AtomicU64::new(0)),
            config_path: path,
            watcher: RwLock::new(None),
            reload_tx: None,
        })
    }

    /// Get the current configuration (lockless read)
    pub fn config(&self) -> Arc<BraidConfig> {
        self.config.load_full()
    }

    /// Incremented on every successful reload
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    pub fn path(&self) -> &Path {
        &self.config_path
    }

    /// Manually reload the configuration from disk
    pub fn reload(&self) -> Result<(), ConfigError> {
        info!("Reloading configuration from {:?}", self.config_path);

        let new_config = BraidConfig::load(&self.config_path)?;
        self.config.store(Arc::new(new_config));
        self.generation.fetch_add(1, Ordering::AcqRel);

        info!("Configuration reloaded successfully");
        Ok(())
    }

    /// Start watching for configuration file changes
    pub fn start_watching(&mut self) -> Result<(), ConfigError> {
        let (tx, mut rx) = mpsc::unbounded_channel::<()>();
        self.reload_tx = Some(tx.clone());

        let config_path = self.config_path.clone();
        let config_arc = Arc::clone(&self.config);
        let generation = Arc::clone(&self.generation);

        let mut watcher = notify::recommended_watcher(move |res: Result<Event, notify::Error>| {
            match res {
                Ok(event) => {
                    if event.kind.is_modify() || event.kind.is_create() {
                        // Debounced in the receiver
                        let _ = tx.send(());
                    }
                }
                Err(e) => {
                    error!("Config watcher error: {:?}", e);
                }
            }
        })?;

        // Watch the config file's parent directory
        if let Some(parent) = self.config_path.parent() {
            watcher.watch(parent, RecursiveMode::NonRecursive)?;
        }

        *self.watcher.write() = Some(watcher);

        tokio::spawn(async move {
            let mut last_reload = std::time::Instant::now();
            let debounce_duration = Duration::from_millis(500);

            while rx.recv().await.is_some() {
                if last_reload.elapsed() < debounce_duration {
                    continue;
                }

                // Wait a bit for file write to complete
                tokio::time::sleep(Duration::from_millis(100)).await;

                match BraidConfig::load(&config_path) {
                    Ok(new_config) => {
                        config_arc.store(Arc::new(new_config));
                        generation.fetch_add(1, Ordering::AcqRel);
                        info!("Configuration hot-reloaded successfully");
                        last_reload = std::time::Instant::now();
                    }
                    Err(e) => {
                        warn!(
                            "Failed to hot-reload config: {}. Keeping previous config.",
                            e
                        );
                    }
                }
            }
        });

        info!("Configuration hot-reload watcher started");
        Ok(())
    }

    /// Stop watching for configuration changes
    pub fn stop_watching(&self) {
        *self.watcher.write() = None;
        info!("Configuration hot-reload watcher stopped");
    }

    /// Create a config manager directly from a config (useful for testing)
    /// This won't have file watching capabilities.
    pub fn from_config(config: BraidConfig) -> Self {
        Self {
            config: Arc::new(ArcSwap::from_pointee(config)),
            generation: Arc::new(AtomicU64::new(0)),
            config_path: PathBuf::from("test-config.toml"),
            watcher: RwLock::new(None),
            reload_tx: None,
        }
    }
}

impl Clone for BraidConfigManager {
    fn clone(&self) -> Self {
        Self {
            config: Arc::clone(&self.config),
            generation: Arc::clone(&self.generation),
            config_path: self.config_path.clone(),
            watcher: RwLock::new(None), // Watcher is not cloned
            reload_tx: self.reload_tx.clone(),
        }
    }
}
