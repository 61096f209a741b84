//! Configuration management for citeset
//!
//! Supports loading configuration from:
//! - Environment variables (prefixed with CITESET__)
//! - Configuration files (config/default, config/{env}, config/local, --config)
//! - Default values

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Main application configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AppConfig {
    /// Fetcher configuration
    #[serde(default)]
    pub fetch: FetchConfig,

    /// Analysis defaults
    #[serde(default)]
    pub analysis: AnalysisConfig,

    /// Observability configuration
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FetchConfig {
    /// Sources to query, in priority order: openalex, semantic_scholar
    #[serde(default = "default_sources")]
    pub sources: Vec<String>,

    /// OpenAlex API base URL
    #[serde(default = "default_openalex_base_url")]
    pub openalex_base_url: String,

    /// Semantic Scholar Graph API base URL
    #[serde(default = "default_s2_base_url")]
    pub s2_base_url: String,

    /// Contact address for the OpenAlex polite pool
    pub mailto: Option<String>,

    /// Semantic Scholar API key (higher rate limits)
    pub s2_api_key: Option<String>,

    /// Request timeout in seconds
    #[serde(default = "default_request_timeout")]
    pub timeout_secs: u64,

    /// Give up retrying a transient failure after this many seconds
    #[serde(default = "default_max_elapsed")]
    pub max_elapsed_secs: u64,

    /// Requests per minute allowed per source
    #[serde(default = "default_requests_per_minute")]
    pub requests_per_minute: u32,

    /// Maximum number of references or citing works fetched per paper
    #[serde(default = "default_max_citing")]
    pub max_citing: usize,

    /// Seeds fetched concurrently
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AnalysisConfig {
    /// Minimum number of seed papers that must cite a reference
    #[serde(default = "default_k_cited")]
    pub k_cited: usize,

    /// Minimum number of seed papers a citing paper must cite
    #[serde(default = "default_k_citing")]
    pub k_citing: usize,

    /// Drop seed papers from both result lists
    #[serde(default)]
    pub exclude_seeds: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ObservabilityConfig {
    /// Log level (debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Enable JSON logging
    #[serde(default)]
    pub json_logging: bool,
}

// Default value functions
fn default_sources() -> Vec<String> { vec!["openalex".to_string(), "semantic_scholar".to_string()] }
fn default_openalex_base_url() -> String { "https://api.openalex.org".to_string() }
fn default_s2_base_url() -> String { "https://api.semanticscholar.org/graph/v1".to_string() }
fn default_request_timeout() -> u64 { 30 }
fn default_max_elapsed() -> u64 { 120 }
fn default_requests_per_minute() -> u32 { 20 }
fn default_max_citing() -> usize { 500 }
fn default_concurrency() -> usize { 2 }
fn default_k_cited() -> usize { crate::DEFAULT_K_CITED }
fn default_k_citing() -> usize { crate::DEFAULT_K_CITING }
fn default_log_level() -> String { "info".to_string() }

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            sources: default_sources(),
            openalex_base_url: default_openalex_base_url(),
            s2_base_url: default_s2_base_url(),
            mailto: None,
            s2_api_key: None,
            timeout_secs: default_request_timeout(),
            max_elapsed_secs: default_max_elapsed(),
            requests_per_minute: default_requests_per_minute(),
            max_citing: default_max_citing(),
            concurrency: default_concurrency(),
        }
    }
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            k_cited: default_k_cited(),
            k_citing: default_k_citing(),
            exclude_seeds: false,
        }
    }
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            json_logging: false,
        }
    }
}

impl AppConfig {
    /// Load configuration from files and environment
    ///
    /// An explicit file, when given, is layered above the config/ directory
    /// and below environment variables.
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        let env = std::env::var("CITESET_ENV").unwrap_or_else(|_| "development".to_string());

        let mut builder = Config::builder()
            // Load base config file
            .add_source(File::with_name("config/default").required(false))

            // Load environment-specific config
            .add_source(File::with_name(&format!("config/{}", env)).required(false))

            // Load local overrides
            .add_source(File::with_name("config/local").required(false));

        if let Some(path) = explicit {
            builder = builder.add_source(File::from(path));
        }

        let config = builder
            // Load from environment variables with CITESET__ prefix
            // e.g., CITESET__FETCH__MAILTO=me@example.org
            .add_source(
                Environment::with_prefix("CITESET")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("fetch.sources")
            )
            .build()?;

        config.try_deserialize()
    }
}

impl FetchConfig {
    /// Get request timeout as Duration
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Get the retry budget for transient failures as Duration
    pub fn retry_budget(&self) -> Duration {
        Duration::from_secs(self.max_elapsed_secs)
    }
}
