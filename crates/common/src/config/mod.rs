//! Configuration management for CiteForge
//!
//! Supports loading configuration from:
//! - Environment variables (prefixed with APP__)
//! - Configuration files (config/default, config/{APP_ENV}, config/local)
//! - Default values

use crate::errors::{AppError, Result};
use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Main application configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AppConfig {
    /// Crawl scheduling
    #[serde(default)]
    pub crawl: CrawlConfig,

    /// Metadata sources
    #[serde(default)]
    pub sources: SourcesConfig,

    /// Lexical index options
    #[serde(default)]
    pub index: IndexConfig,

    /// Observability configuration
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CrawlConfig {
    /// Maximum in-flight resolutions per pass
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Timeout for a single source attempt, in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// File with one seed title per line
    pub seeds_file: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SourcesConfig {
    /// Primary provider: pmc, elsevier, static
    #[serde(default = "default_primary_source")]
    pub primary: String,

    /// Fallback provider: pmc, elsevier, static
    #[serde(default = "default_secondary_source")]
    pub secondary: String,

    /// JSON fixtures for the static provider
    pub fixtures_path: Option<String>,

    #[serde(default)]
    pub pmc: PmcConfig,

    #[serde(default)]
    pub elsevier: ElsevierConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PmcConfig {
    /// NCBI E-utilities search endpoint
    #[serde(default = "default_esearch_url")]
    pub esearch_url: String,

    /// BioC RESTful service base URL
    #[serde(default = "default_bioc_base_url")]
    pub bioc_base_url: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ElsevierConfig {
    /// API key sent as X-ELS-APIKey
    pub api_key: Option<String>,

    /// ScienceDirect search endpoint
    #[serde(default = "default_elsevier_search_url")]
    pub search_url: String,

    /// Article retrieval by DOI endpoint
    #[serde(default = "default_elsevier_article_url")]
    pub article_url: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct IndexConfig {
    /// Lowercase tokens before counting
    #[serde(default = "default_true")]
    pub lowercase: bool,

    /// Add one to document frequencies as if an extra document held every term
    #[serde(default = "default_true")]
    pub smooth_idf: bool,

    /// Replace tf with 1 + ln(tf)
    #[serde(default)]
    pub sublinear_tf: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ObservabilityConfig {
    /// Log level (debug, info, warn, error) or an EnvFilter directive
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Enable JSON logging
    #[serde(default)]
    pub json_logging: bool,

    /// Prometheus exporter port (0 to disable)
    #[serde(default)]
    pub metrics_port: u16,

    /// Service name attached to log output
    #[serde(default = "default_service_name")]
    pub service_name: String,
}

/// Provider names accepted in `sources.primary` / `sources.secondary`
pub const KNOWN_PROVIDERS: &[&str] = &["pmc", "elsevier", "static"];

// Default value functions
fn default_concurrency() -> usize { 8 }
fn default_request_timeout() -> u64 { 30 }
fn default_primary_source() -> String { "pmc".to_string() }
fn default_secondary_source() -> String { "elsevier".to_string() }
fn default_esearch_url() -> String {
    "https://eutils.ncbi.nlm.nih.gov/entrez/eutils/esearch.fcgi".to_string()
}
fn default_bioc_base_url() -> String {
    "https://www.ncbi.nlm.nih.gov/research/bionlp/RESTful/pmcoa.cgi".to_string()
}
fn default_elsevier_search_url() -> String {
    "https://api.elsevier.com/content/search/sciencedirect".to_string()
}
fn default_elsevier_article_url() -> String {
    "https://api.elsevier.com/content/article/doi".to_string()
}
fn default_true() -> bool { true }
fn default_log_level() -> String { "info".to_string() }
fn default_service_name() -> String { "citeforge".to_string() }

impl AppConfig {
    /// Load configuration from environment and files
    pub fn load() -> std::result::Result<Self, ConfigError> {
        let env = std::env::var("APP_ENV").unwrap_or_else(|_| "development".to_string());

        let config = Config::builder()
            // Load base config file
            .add_source(File::with_name("config/default").required(false))
            // Load environment-specific config
            .add_source(File::with_name(&format!("config/{}", env)).required(false))
            // Load local overrides
            .add_source(File::with_name("config/local").required(false))
            // Load from environment variables with APP__ prefix
            // e.g., APP__CRAWL__CONCURRENCY=16
            .add_source(
                Environment::with_prefix("APP")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }

    /// Load from a specific TOML file
    pub fn from_file(path: &str) -> std::result::Result<Self, ConfigError> {
        let config = Config::builder()
            .add_source(File::with_name(path))
            .add_source(
                Environment::with_prefix("APP")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }

    /// Reject settings the crawler cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.crawl.concurrency == 0 {
            return Err(AppError::Configuration {
                message: "crawl.concurrency must be at least 1".to_string(),
            });
        }
        if self.crawl.request_timeout_secs == 0 {
            return Err(AppError::Configuration {
                message: "crawl.request_timeout_secs must be at least 1".to_string(),
            });
        }
        for (key, provider) in [
            ("sources.primary", &self.sources.primary),
            ("sources.secondary", &self.sources.secondary),
        ] {
            if !KNOWN_PROVIDERS.contains(&provider.as_str()) {
                return Err(AppError::Configuration {
                    message: format!("{} has unknown provider {:?}", key, provider),
                });
            }
        }
        Ok(())
    }

    /// Get the per-attempt source timeout as Duration
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.crawl.request_timeout_secs)
    }
}

impl Default for CrawlConfig {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
            request_timeout_secs: default_request_timeout(),
            seeds_file: None,
        }
    }
}

impl Default for SourcesConfig {
    fn default() -> Self {
        Self {
            primary: default_primary_source(),
            secondary: default_secondary_source(),
            fixtures_path: None,
            pmc: PmcConfig::default(),
            elsevier: ElsevierConfig::default(),
        }
    }
}

impl Default for PmcConfig {
    fn default() -> Self {
        Self {
            esearch_url: default_esearch_url(),
            bioc_base_url: default_bioc_base_url(),
        }
    }
}

impl Default for ElsevierConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            search_url: default_elsevier_search_url(),
            article_url: default_elsevier_article_url(),
        }
    }
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            lowercase: true,
            smooth_idf: true,
            sublinear_tf: false,
        }
    }
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            json_logging: false,
            metrics_port: 0,
            service_name: default_service_name(),
        }
    }
}
