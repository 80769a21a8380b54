//! Civic data ingestion
//!
//! Each registered dataset is refreshed in full by a [`DatasetLoader`] run:
//! rows are fetched from the row-list API, validated, optionally reverse
//! geocoded, and swapped into a Postgres table. The [`IngestScheduler`] fires
//! those runs on a timer or on request.
//!
//! - **schema** / **datasets**: declarative per-dataset shapes
//! - **validation**: ordered field rules with reason codes
//! - **enrichment**: postal codes from coordinates
//! - **source**: row-list API client
//! - **sink**: table lifecycle behind a trait, Postgres implementation
//! - **loader**: the per-run state machine
//! - **scheduler**: concurrency, overlap protection and last-run tracking

pub mod config;
pub mod datasets;
pub mod enrichment;
pub mod error;
pub mod loader;
pub mod record;
pub mod scheduler;
pub mod schema;
pub mod sink;
pub mod source;
pub mod validation;

pub use config::IngestConfig;
pub use error::IngestError;
pub use loader::{DatasetLoader, LoadStage, LoaderSettings, Outcome, RunSummary};
pub use scheduler::{DatasetStatus, IngestScheduler, RunReport, TriggerError};
pub use schema::DatasetSchema;

use cbi_common::{CbiError, Result};
use std::sync::Arc;
use tracing::{info, warn};

use enrichment::{GoogleGeocoder, ReverseGeocoder, UnconfiguredGeocoder};
use sink::Sink;
use source::SodaClient;

/// Look up `ids` in the registry.
///
/// Unknown ids are an error. Datasets that need reverse geocoding are left out
/// with a warning when `geocoding` is false.
pub fn resolve_datasets(
    ids: &[String],
    geocoding: bool,
) -> Result<Vec<&'static DatasetSchema>> {
    let mut resolved = Vec::with_capacity(ids.len());

    for id in ids {
        let schema = datasets::find(id).ok_or_else(|| CbiError::UnknownDataset(id.clone()))?;

        if !schema.enrichments.is_empty() && !geocoding {
            warn!(dataset = %schema.id, "Dataset needs reverse geocoding but no API key is set, not scheduling it");
            continue;
        }
        if resolved.iter().any(|s: &&DatasetSchema| s.id == schema.id) {
            continue;
        }
        resolved.push(schema);
    }

    Ok(resolved)
}

/// Wire the production collaborators for `ids` into a scheduler.
pub fn build_scheduler(
    config: &IngestConfig,
    ids: &[String],
    sink: Arc<dyn Sink>,
) -> Result<IngestScheduler> {
    let datasets = resolve_datasets(ids, config.geocoder.is_configured())?;

    let source = SodaClient::new(
        config.source.base_url.clone(),
        config.source.app_token.clone(),
        config.source.page_size,
        config.http_timeout(),
    )
    .map_err(|e| CbiError::config(format!("data source client: {}", e)))?;

    let geocoder: Arc<dyn ReverseGeocoder> = match config.geocoder.api_key {
        Some(ref key) if config.geocoder.is_configured() => Arc::new(
            GoogleGeocoder::new(config.geocoder.base_url.clone(), key.clone(), config.http_timeout())
                .map_err(|e| CbiError::config(format!("geocoder client: {}", e)))?,
        ),
        _ => Arc::new(UnconfiguredGeocoder),
    };

    let loader = DatasetLoader::new(Arc::new(source), geocoder, sink, config.loader_settings());
    let scheduler = IngestScheduler::new(loader, datasets);

    info!(datasets = ?scheduler.datasets(), "Ingestion scheduler ready");
    Ok(scheduler)
}
