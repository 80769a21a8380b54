//! Dataset loader
//!
//! One [`DatasetLoader::run`] is one full refresh of one dataset:
//!
//! ```text
//! START -> SCHEMA_RESET -> FETCH -> TRANSFORM -> LOAD -> PUBLISH -> DONE
//! ```
//!
//! Any run-level error aborts from whichever stage it happened in; the staging
//! table is dropped and the serving table keeps the previous run's rows.
//! Record-level problems (validation, enrichment, rejected inserts) never abort
//! a run; they are counted per reason in [`RejectionCounts`].

use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, info_span, warn, Instrument};
use uuid::Uuid;

use super::enrichment::{Enricher, ReverseGeocoder};
use super::error::IngestError;
use super::record::EnrichedRecord;
use super::schema::DatasetSchema;
use super::sink::Sink;
use super::source::RecordSource;
use super::validation::validate;

/// Default number of reverse-geocoding lookups in flight per run.
pub const DEFAULT_ENRICHMENT_CONCURRENCY: usize = 4;

/// Default upper bound on a whole run, in seconds.
pub const DEFAULT_RUN_TIMEOUT_SECS: u64 = 7200;

/// Reason code for inserts the store refused
pub const INSERT_REJECTED: &str = "insert_rejected";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LoadStage {
    Start,
    SchemaReset,
    Fetch,
    Transform,
    Load,
    Publish,
    Done,
}

impl std::fmt::Display for LoadStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            LoadStage::Start => "start",
            LoadStage::SchemaReset => "schema_reset",
            LoadStage::Fetch => "fetch",
            LoadStage::Transform => "transform",
            LoadStage::Load => "load",
            LoadStage::Publish => "publish",
            LoadStage::Done => "done",
        };
        f.write_str(name)
    }
}

/// Dropped records per reason code
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct RejectionCounts(BTreeMap<&'static str, usize>);

impl RejectionCounts {
    pub fn record(&mut self, reason: &'static str) {
        *self.0.entry(reason).or_default() += 1;
    }

    pub fn get(&self, reason: &str) -> usize {
        self.0.get(reason).copied().unwrap_or(0)
    }

    pub fn total(&self) -> usize {
        self.0.values().sum()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'static str, usize)> + '_ {
        self.0.iter().map(|(reason, count)| (*reason, *count))
    }
}

/// Result of one run
#[derive(Debug)]
pub struct Outcome {
    pub dataset: &'static str,
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub records_fetched: usize,
    pub records_loaded: usize,
    pub rejections: RejectionCounts,
    /// Stage the run aborted in, `None` on success
    pub failed_stage: Option<LoadStage>,
    pub error: Option<IngestError>,
}

impl Outcome {
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }

    pub fn summary(&self) -> RunSummary {
        RunSummary {
            dataset: self.dataset,
            run_id: self.run_id,
            started_at: self.started_at,
            finished_at: self.finished_at,
            records_fetched: self.records_fetched,
            records_loaded: self.records_loaded,
            records_rejected: self.rejections.total(),
            rejections: self.rejections.clone(),
            succeeded: self.is_success(),
            failed_stage: self.failed_stage,
            error: self.error.as_ref().map(ToString::to_string),
        }
    }
}

/// Serializable view of an [`Outcome`], kept as a dataset's last run
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub dataset: &'static str,
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub records_fetched: usize,
    pub records_loaded: usize,
    pub records_rejected: usize,
    pub rejections: RejectionCounts,
    pub succeeded: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failed_stage: Option<LoadStage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl RunSummary {
    /// Summary for a run that ended without producing an [`Outcome`].
    pub fn aborted(dataset: &'static str, message: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            dataset,
            run_id: Uuid::new_v4(),
            started_at: now,
            finished_at: now,
            records_fetched: 0,
            records_loaded: 0,
            records_rejected: 0,
            rejections: RejectionCounts::default(),
            succeeded: false,
            failed_stage: None,
            error: Some(message.into()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct LoaderSettings {
    /// Reverse-geocoding lookups in flight per run
    pub enrichment_concurrency: usize,
    /// Upper bound on a whole run; `None` waits forever
    pub run_timeout: Option<Duration>,
}

impl Default for LoaderSettings {
    fn default() -> Self {
        Self {
            enrichment_concurrency: DEFAULT_ENRICHMENT_CONCURRENCY,
            run_timeout: Some(Duration::from_secs(DEFAULT_RUN_TIMEOUT_SECS)),
        }
    }
}

#[derive(Debug, Default)]
struct Progress {
    stage: Option<LoadStage>,
    fetched: usize,
    loaded: usize,
    rejections: RejectionCounts,
}

impl Progress {
    fn enter(&mut self, stage: LoadStage) {
        debug!(stage = %stage, "Entering stage");
        self.stage = Some(stage);
    }
}

/// Runs full refreshes against injected collaborators.
///
/// A loader holds no per-run state, so one instance serves every dataset and
/// concurrent runs of different datasets.
pub struct DatasetLoader {
    source: Arc<dyn RecordSource>,
    geocoder: Arc<dyn ReverseGeocoder>,
    sink: Arc<dyn Sink>,
    settings: LoaderSettings,
}

impl DatasetLoader {
    pub fn new(
        source: Arc<dyn RecordSource>,
        geocoder: Arc<dyn ReverseGeocoder>,
        sink: Arc<dyn Sink>,
        settings: LoaderSettings,
    ) -> Self {
        Self {
            source,
            geocoder,
            sink,
            settings,
        }
    }

    pub fn settings(&self) -> &LoaderSettings {
        &self.settings
    }

    /// Run one full refresh of `schema`.
    ///
    /// Never returns early with an error: run-level failures are reported in
    /// the returned [`Outcome`].
    pub async fn run(&self, schema: &'static DatasetSchema) -> Outcome {
        let run_id = Uuid::new_v4();
        let span = info_span!("ingest", dataset = %schema.id, run_id = %run_id);

        async move {
            let started_at = Utc::now();
            let clock = Instant::now();
            let mut progress = Progress::default();
            progress.enter(LoadStage::Start);

            info!(table = %schema.table, sources = schema.sources.len(), "Ingestion run started");

            let result = match self.settings.run_timeout {
                Some(limit) => tokio::time::timeout(limit, self.execute(schema, &mut progress))
                    .await
                    .unwrap_or_else(|_| Err(IngestError::Timeout(limit))),
                None => self.execute(schema, &mut progress).await,
            };

            let (failed_stage, error) = match result {
                Ok(()) => (None, None),
                Err(e) => {
                    if let Err(discard) = self.sink.discard_staging(schema).await {
                        warn!(error = %discard, "Failed to drop staging table after abort");
                    }
                    (progress.stage, Some(e))
                },
            };

            let outcome = Outcome {
                dataset: schema.id,
                run_id,
                started_at,
                finished_at: Utc::now(),
                records_fetched: progress.fetched,
                records_loaded: progress.loaded,
                rejections: progress.rejections,
                failed_stage,
                error,
            };

            log_outcome(&outcome, clock.elapsed());
            outcome
        }
        .instrument(span)
        .await
    }

    async fn execute(
        &self,
        schema: &'static DatasetSchema,
        progress: &mut Progress,
    ) -> Result<(), IngestError> {
        progress.enter(LoadStage::SchemaReset);
        self.sink
            .reset_staging(schema)
            .await
            .map_err(|source| IngestError::Schema {
                table: schema.staging_table(),
                source,
            })?;

        progress.enter(LoadStage::Fetch);
        let mut records = Vec::new();
        for endpoint in schema.sources {
            let batch = self.source.fetch(endpoint).await?;
            info!(resource = %endpoint.resource, label = %endpoint.label, rows = batch.len(), "Fetched source");
            records.extend(batch);
        }
        progress.fetched = records.len();

        progress.enter(LoadStage::Transform);
        let accepted = self.transform(schema, records, &mut progress.rejections).await;

        progress.enter(LoadStage::Load);
        for record in &accepted {
            match self.sink.insert(schema, record).await {
                Ok(()) => progress.loaded += 1,
                Err(e) if e.is_record_level() => {
                    debug!(key = %record.natural_key(schema), error = %e, "Insert rejected");
                    progress.rejections.record(INSERT_REJECTED);
                },
                Err(source) => {
                    return Err(IngestError::Load {
                        table: schema.staging_table(),
                        source,
                    });
                },
            }
        }

        progress.enter(LoadStage::Publish);
        self.sink
            .publish(schema)
            .await
            .map_err(|source| IngestError::Publish {
                table: schema.table.to_string(),
                source,
            })?;

        progress.enter(LoadStage::Done);
        Ok(())
    }

    /// Validate then enrich every record, keeping source order.
    async fn transform(
        &self,
        schema: &'static DatasetSchema,
        records: Vec<super::record::SourceRecord>,
        rejections: &mut RejectionCounts,
    ) -> Vec<EnrichedRecord> {
        let enricher = Enricher::new(self.geocoder.clone());
        let enricher = &enricher;

        let results: Vec<Result<EnrichedRecord, &'static str>> = stream::iter(records)
            .map(|record| async move {
                let validated = validate(schema, &record).map_err(|rejection| {
                    debug!(rule = rejection.rule(), reason = %rejection, "Record rejected");
                    rejection.rule()
                })?;
                enricher.enrich(schema, validated).await.map_err(|rejection| {
                    debug!(rule = rejection.rule(), reason = %rejection, "Record not enriched");
                    rejection.rule()
                })
            })
            .buffered(self.settings.enrichment_concurrency.max(1))
            .collect()
            .await;

        if !schema.enrichments.is_empty() {
            let locations = enricher.memoised().await;
            debug!(locations, "Distinct locations geocoded");
        }

        results
            .into_iter()
            .filter_map(|result| match result {
                Ok(record) => Some(record),
                Err(rule) => {
                    rejections.record(rule);
                    None
                },
            })
            .collect()
    }
}

fn log_outcome(outcome: &Outcome, elapsed: Duration) {
    let rejections = outcome
        .rejections
        .iter()
        .map(|(reason, count)| format!("{}={}", reason, count))
        .collect::<Vec<_>>()
        .join(",");

    match outcome.error {
        None => info!(
            fetched = outcome.records_fetched,
            loaded = outcome.records_loaded,
            rejected = outcome.rejections.total(),
            rejections = %rejections,
            elapsed_ms = elapsed.as_millis() as u64,
            "Ingestion run completed"
        ),
        Some(ref e) => error!(
            stage = ?outcome.failed_stage,
            kind = e.kind(),
            error = %e,
            fetched = outcome.records_fetched,
            loaded = outcome.records_loaded,
            rejected = outcome.rejections.total(),
            rejections = %rejections,
            elapsed_ms = elapsed.as_millis() as u64,
            "Ingestion run aborted"
        ),
    }
}
