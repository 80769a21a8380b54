//! Ingestion configuration
//!
//! Read from `INGEST_*`, `SODA_*` and `GEOCODER_*` environment variables.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::datasets::DEFAULT_SCHEDULED;
use super::enrichment::geocoder::DEFAULT_GEOCODER_BASE_URL;
use super::loader::{LoaderSettings, DEFAULT_ENRICHMENT_CONCURRENCY, DEFAULT_RUN_TIMEOUT_SECS};
use super::source::{DEFAULT_SODA_BASE_URL, DEFAULT_SODA_PAGE_SIZE};

/// Default timer period in seconds (daily).
pub const DEFAULT_INGEST_INTERVAL_SECS: u64 = 86_400;

/// Default timeout for a single outbound request in seconds.
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 300;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestConfig {
    /// Whether the timer loop runs
    pub enabled: bool,
    pub interval_secs: u64,
    /// Whole-run timeout; 0 disables it
    pub run_timeout_secs: u64,
    pub http_timeout_secs: u64,
    pub geocode_concurrency: usize,
    /// Dataset ids the scheduler runs
    pub datasets: Vec<String>,
    pub source: SourceConfig,
    pub geocoder: GeocoderConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    pub base_url: String,
    pub app_token: Option<String>,
    pub page_size: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeocoderConfig {
    pub base_url: String,
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
}

impl GeocoderConfig {
    pub fn is_configured(&self) -> bool {
        self.api_key.as_deref().is_some_and(|key| !key.trim().is_empty())
    }
}

fn env_parse<T: std::str::FromStr>(name: &str, default: T) -> T {
    std::env::var(name)
        .ok()
        .and_then(|s| s.trim().parse().ok())
        .unwrap_or(default)
}

fn env_optional(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|s| !s.trim().is_empty())
}

impl IngestConfig {
    /// Load ingestion configuration from environment variables
    pub fn from_env() -> anyhow::Result<Self> {
        let datasets = std::env::var("INGEST_DATASETS")
            .map(|s| {
                s.split(',')
                    .map(|id| id.trim().to_string())
                    .filter(|id| !id.is_empty())
                    .collect()
            })
            .unwrap_or_else(|_| DEFAULT_SCHEDULED.iter().map(|id| id.to_string()).collect());

        let config = Self {
            enabled: env_parse("INGEST_ENABLED", true),
            interval_secs: env_parse("INGEST_INTERVAL_SECS", DEFAULT_INGEST_INTERVAL_SECS),
            run_timeout_secs: env_parse("INGEST_RUN_TIMEOUT_SECS", DEFAULT_RUN_TIMEOUT_SECS),
            http_timeout_secs: env_parse("INGEST_HTTP_TIMEOUT_SECS", DEFAULT_HTTP_TIMEOUT_SECS),
            geocode_concurrency: env_parse(
                "INGEST_GEOCODE_CONCURRENCY",
                DEFAULT_ENRICHMENT_CONCURRENCY,
            ),
            datasets,
            source: SourceConfig {
                base_url: std::env::var("SODA_BASE_URL")
                    .unwrap_or_else(|_| DEFAULT_SODA_BASE_URL.to_string()),
                app_token: env_optional("SODA_APP_TOKEN"),
                page_size: env_parse("SODA_PAGE_SIZE", DEFAULT_SODA_PAGE_SIZE),
            },
            geocoder: GeocoderConfig {
                base_url: std::env::var("GEOCODER_BASE_URL")
                    .unwrap_or_else(|_| DEFAULT_GEOCODER_BASE_URL.to_string()),
                api_key: env_optional("GEOCODER_API_KEY"),
            },
        };

        config.validate()?;

        Ok(config)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.interval_secs == 0 {
            anyhow::bail!("INGEST_INTERVAL_SECS must be greater than 0");
        }

        if self.http_timeout_secs == 0 {
            anyhow::bail!("INGEST_HTTP_TIMEOUT_SECS must be greater than 0");
        }

        if self.source.page_size == 0 {
            anyhow::bail!("SODA_PAGE_SIZE must be greater than 0");
        }

        if self.geocode_concurrency == 0 {
            anyhow::bail!("INGEST_GEOCODE_CONCURRENCY must be greater than 0");
        }

        if self.datasets.is_empty() {
            anyhow::bail!("INGEST_DATASETS must name at least one dataset");
        }

        if !self.geocoder.is_configured() {
            tracing::warn!("GEOCODER_API_KEY is not set - datasets needing reverse geocoding will not run");
        }

        Ok(())
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }

    pub fn loader_settings(&self) -> LoaderSettings {
        LoaderSettings {
            enrichment_concurrency: self.geocode_concurrency,
            run_timeout: (self.run_timeout_secs > 0)
                .then(|| Duration::from_secs(self.run_timeout_secs)),
        }
    }
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_secs: DEFAULT_INGEST_INTERVAL_SECS,
            run_timeout_secs: DEFAULT_RUN_TIMEOUT_SECS,
            http_timeout_secs: DEFAULT_HTTP_TIMEOUT_SECS,
            geocode_concurrency: DEFAULT_ENRICHMENT_CONCURRENCY,
            datasets: DEFAULT_SCHEDULED.iter().map(|id| id.to_string()).collect(),
            source: SourceConfig {
                base_url: DEFAULT_SODA_BASE_URL.to_string(),
                app_token: None,
                page_size: DEFAULT_SODA_PAGE_SIZE,
            },
            geocoder: GeocoderConfig {
                base_url: DEFAULT_GEOCODER_BASE_URL.to_string(),
                api_key: None,
            },
        }
    }
}
