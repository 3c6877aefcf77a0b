//! Application configuration structures.

use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};

/// Root application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Remote analyzer connection settings
    #[serde(default)]
    pub client: ClientConfig,

    /// Result cache sizing and expiry
    #[serde(default)]
    pub cache: CacheConfig,

    /// Circuit breaker thresholds
    #[serde(default)]
    pub circuit_breaker: CircuitBreakerConfig,

    /// Retry/backoff policy
    #[serde(default)]
    pub retry: RetryConfig,

    /// Orchestration settings
    #[serde(default)]
    pub service: ServiceConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Load configuration or return default if loading fails.
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        Self::load(&path).unwrap_or_else(|e| {
            log::warn!(
                "Config load failed from {:?}: {}. Using defaults.",
                path.as_ref(),
                e
            );
            Self::default()
        })
    }

    /// Validate configuration values for basic sanity.
    pub fn validate(&self) -> Result<()> {
        if self.client.user_agent.trim().is_empty() {
            return Err(AppError::validation("client.user_agent is empty"));
        }
        if self.client.analyze_timeout_secs == 0
            || self.client.classify_timeout_secs == 0
            || self.client.health_timeout_secs == 0
            || self.client.metrics_timeout_secs == 0
        {
            return Err(AppError::validation("client timeouts must be > 0"));
        }
        if self.cache.max_size_mb <= 0.0 {
            return Err(AppError::validation("cache.max_size_mb must be > 0"));
        }
        if self.cache.max_entries == 0 {
            return Err(AppError::validation("cache.max_entries must be > 0"));
        }
        if self.cache.ttl_ms == 0 {
            return Err(AppError::validation("cache.ttl_ms must be > 0"));
        }
        if self.cache.cleanup_interval_ms == 0 {
            return Err(AppError::validation(
                "cache.cleanup_interval_ms must be > 0",
            ));
        }
        if !(self.cache.similarity_threshold > 0.0 && self.cache.similarity_threshold <= 1.0) {
            return Err(AppError::validation(
                "cache.similarity_threshold must be in (0, 1]",
            ));
        }
        if self.circuit_breaker.failure_threshold == 0 {
            return Err(AppError::validation(
                "circuit_breaker.failure_threshold must be > 0",
            ));
        }
        if self.retry.backoff_multiplier < 1.0 {
            return Err(AppError::validation(
                "retry.backoff_multiplier must be >= 1",
            ));
        }
        if self.retry.max_delay_ms < self.retry.initial_delay_ms {
            return Err(AppError::validation(
                "retry.max_delay_ms must be >= retry.initial_delay_ms",
            ));
        }
        if self.service.max_concurrent == 0 {
            return Err(AppError::validation("service.max_concurrent must be > 0"));
        }
        Ok(())
    }
}

/// Remote analyzer connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Base URL of the analysis service
    #[serde(default = "defaults::base_url")]
    pub base_url: String,

    /// User-Agent header for HTTP requests
    #[serde(default = "defaults::user_agent")]
    pub user_agent: String,

    /// `POST /analyze` deadline, covering every retry
    #[serde(default = "defaults::analyze_timeout")]
    pub analyze_timeout_secs: u64,

    /// `POST /classify` deadline
    #[serde(default = "defaults::classify_timeout")]
    pub classify_timeout_secs: u64,

    /// `GET /health` deadline
    #[serde(default = "defaults::health_timeout")]
    pub health_timeout_secs: u64,

    /// `GET /metrics` deadline
    #[serde(default = "defaults::metrics_timeout")]
    pub metrics_timeout_secs: u64,

    /// Environment variable holding the bearer token
    #[serde(default = "defaults::token_env")]
    pub token_env: String,
}

impl ClientConfig {
    pub fn analyze_timeout(&self) -> Duration {
        Duration::from_secs(self.analyze_timeout_secs)
    }

    pub fn classify_timeout(&self) -> Duration {
        Duration::from_secs(self.classify_timeout_secs)
    }

    pub fn health_timeout(&self) -> Duration {
        Duration::from_secs(self.health_timeout_secs)
    }

    pub fn metrics_timeout(&self) -> Duration {
        Duration::from_secs(self.metrics_timeout_secs)
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: defaults::base_url(),
            user_agent: defaults::user_agent(),
            analyze_timeout_secs: defaults::analyze_timeout(),
            classify_timeout_secs: defaults::classify_timeout(),
            health_timeout_secs: defaults::health_timeout(),
            metrics_timeout_secs: defaults::metrics_timeout(),
            token_env: defaults::token_env(),
        }
    }
}

/// Result cache settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Memory budget in megabytes
    #[serde(default = "defaults::max_size_mb")]
    pub max_size_mb: f64,

    /// Maximum number of stored results
    #[serde(default = "defaults::max_entries")]
    pub max_entries: usize,

    /// Entry time-to-live in milliseconds
    #[serde(default = "defaults::ttl_ms")]
    pub ttl_ms: u64,

    /// Minimum combined similarity for a near-duplicate hit
    #[serde(default = "defaults::similarity_threshold")]
    pub similarity_threshold: f64,

    /// Record hit/miss counters
    #[serde(default = "defaults::enable_metrics")]
    pub enable_metrics: bool,

    /// Interval of the background expiry sweep in milliseconds
    #[serde(default = "defaults::cleanup_interval_ms")]
    pub cleanup_interval_ms: u64,
}

impl CacheConfig {
    pub fn max_size_bytes(&self) -> u64 {
        (self.max_size_mb * 1024.0 * 1024.0) as u64
    }

    pub fn ttl(&self) -> Duration {
        Duration::from_millis(self.ttl_ms)
    }

    pub fn cleanup_interval(&self) -> Duration {
        Duration::from_millis(self.cleanup_interval_ms)
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_size_mb: defaults::max_size_mb(),
            max_entries: defaults::max_entries(),
            ttl_ms: defaults::ttl_ms(),
            similarity_threshold: defaults::similarity_threshold(),
            enable_metrics: defaults::enable_metrics(),
            cleanup_interval_ms: defaults::cleanup_interval_ms(),
        }
    }
}

/// Circuit breaker settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CircuitBreakerConfig {
    /// Consecutive failures before the circuit opens
    #[serde(default = "defaults::failure_threshold")]
    pub failure_threshold: u32,

    /// Time the circuit stays open before a trial call, in milliseconds
    #[serde(default = "defaults::reset_timeout_ms")]
    pub reset_timeout_ms: u64,

    /// Monitoring window in milliseconds (reported, not enforced)
    #[serde(default = "defaults::monitoring_period_ms")]
    pub monitoring_period_ms: u64,
}

impl CircuitBreakerConfig {
    pub fn reset_timeout(&self) -> Duration {
        Duration::from_millis(self.reset_timeout_ms)
    }
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: defaults::failure_threshold(),
            reset_timeout_ms: defaults::reset_timeout_ms(),
            monitoring_period_ms: defaults::monitoring_period_ms(),
        }
    }
}

/// Exponential backoff settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Retries after the first attempt
    #[serde(default = "defaults::max_retries")]
    pub max_retries: u32,

    #[serde(default = "defaults::initial_delay_ms")]
    pub initial_delay_ms: u64,

    #[serde(default = "defaults::max_delay_ms")]
    pub max_delay_ms: u64,

    #[serde(default = "defaults::backoff_multiplier")]
    pub backoff_multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: defaults::max_retries(),
            initial_delay_ms: defaults::initial_delay_ms(),
            max_delay_ms: defaults::max_delay_ms(),
            backoff_multiplier: defaults::backoff_multiplier(),
        }
    }
}

/// Orchestration settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Maximum concurrent analyses in a batch
    #[serde(default = "defaults::max_concurrent")]
    pub max_concurrent: usize,

    /// Keep only the most severe findings when set
    #[serde(default)]
    pub max_findings: Option<usize>,

    /// Cap on generated recommendations
    #[serde(default = "defaults::max_recommendations")]
    pub max_recommendations: usize,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            max_concurrent: defaults::max_concurrent(),
            max_findings: None,
            max_recommendations: defaults::max_recommendations(),
        }
    }
}

mod defaults {
    // Client defaults
    pub fn base_url() -> String {
        "http://localhost:8080".into()
    }
    pub fn user_agent() -> String {
        "bidreview/0.1".into()
    }
    pub fn analyze_timeout() -> u64 {
        120
    }
    pub fn classify_timeout() -> u64 {
        30
    }
    pub fn health_timeout() -> u64 {
        5
    }
    pub fn metrics_timeout() -> u64 {
        10
    }
    pub fn token_env() -> String {
        "BIDREVIEW_TOKEN".into()
    }

    // Cache defaults
    pub fn max_size_mb() -> f64 {
        100.0
    }
    pub fn max_entries() -> usize {
        1000
    }
    pub fn ttl_ms() -> u64 {
        24 * 60 * 60 * 1000
    }
    pub fn similarity_threshold() -> f64 {
        0.85
    }
    pub fn enable_metrics() -> bool {
        true
    }
    pub fn cleanup_interval_ms() -> u64 {
        5 * 60 * 1000
    }

    // Circuit breaker defaults
    pub fn failure_threshold() -> u32 {
        5
    }
    pub fn reset_timeout_ms() -> u64 {
        60_000
    }
    pub fn monitoring_period_ms() -> u64 {
        10_000
    }

    // Retry defaults
    pub fn max_retries() -> u32 {
        3
    }
    pub fn initial_delay_ms() -> u64 {
        1000
    }
    pub fn max_delay_ms() -> u64 {
        10_000
    }
    pub fn backoff_multiplier() -> f64 {
        2.0
    }

    // Service defaults
    pub fn max_concurrent() -> usize {
        4
    }
    pub fn max_recommendations() -> usize {
        5
    }
}
