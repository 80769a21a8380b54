//! Ingestion scheduler
//!
//! Owns the set of scheduled datasets and launches loader runs for them,
//! either all at once on a timer tick or one at a time on request.
//!
//! - Each run is its own tokio task, so an error or panic in one dataset never
//!   reaches the scheduler or a sibling run.
//! - A dataset has at most one run in flight; a second request gets
//!   [`TriggerError::AlreadyRunning`].
//! - Every run reports back a [`RunReport`] and its summary is kept as the
//!   dataset's last run.

use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{Mutex, RwLock};
use tokio::task::{JoinError, JoinHandle};
use tokio::time::MissedTickBehavior;
use tracing::{error, info, warn};

use super::loader::{DatasetLoader, Outcome, RunSummary};
use super::schema::DatasetSchema;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TriggerError {
    #[error("unknown dataset '{0}'")]
    UnknownDataset(String),

    #[error("dataset '{0}' is already running")]
    AlreadyRunning(&'static str),
}

/// How one triggered run ended
#[derive(Debug)]
pub enum RunReport {
    Completed(Outcome),
    /// Not started because a previous run was still in flight
    Skipped {
        dataset: &'static str,
        reason: String,
    },
    Panicked {
        dataset: &'static str,
        message: String,
    },
}

impl RunReport {
    pub fn dataset(&self) -> &'static str {
        match self {
            RunReport::Completed(outcome) => outcome.dataset,
            RunReport::Skipped { dataset, .. } | RunReport::Panicked { dataset, .. } => dataset,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, RunReport::Completed(outcome) if outcome.is_success())
    }

    pub fn outcome(&self) -> Option<&Outcome> {
        match self {
            RunReport::Completed(outcome) => Some(outcome),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    Idle,
    Running,
}

#[derive(Debug, Clone, Serialize)]
pub struct DatasetStatus {
    pub dataset: &'static str,
    pub table: &'static str,
    pub state: RunState,
    pub last_run: Option<RunSummary>,
}

struct DatasetSlot {
    schema: &'static DatasetSchema,
    /// Held for the whole run; only `trigger` ever tries to take it.
    running: Arc<Mutex<()>>,
    /// Mirrors `running` for status reads.
    in_flight: AtomicBool,
    last_run: RwLock<Option<RunSummary>>,
}

#[derive(Clone)]
pub struct IngestScheduler {
    loader: Arc<DatasetLoader>,
    slots: Arc<Vec<Arc<DatasetSlot>>>,
}

impl IngestScheduler {
    pub fn new(loader: DatasetLoader, datasets: Vec<&'static DatasetSchema>) -> Self {
        let slots = datasets
            .into_iter()
            .map(|schema| {
                Arc::new(DatasetSlot {
                    schema,
                    running: Arc::new(Mutex::new(())),
                    in_flight: AtomicBool::new(false),
                    last_run: RwLock::new(None),
                })
            })
            .collect();

        Self {
            loader: Arc::new(loader),
            slots: Arc::new(slots),
        }
    }

    /// Scheduled dataset ids, in registration order.
    pub fn datasets(&self) -> Vec<&'static str> {
        self.slots.iter().map(|slot| slot.schema.id).collect()
    }

    fn slot(&self, dataset: &str) -> Result<Arc<DatasetSlot>, TriggerError> {
        self.slots
            .iter()
            .find(|slot| slot.schema.id == dataset)
            .cloned()
            .ok_or_else(|| TriggerError::UnknownDataset(dataset.to_string()))
    }

    /// Start a run of `dataset` in the background.
    ///
    /// The returned handle resolves once the run has finished and its summary
    /// has been recorded. Dropping the handle detaches the run.
    pub fn trigger(&self, dataset: &str) -> Result<JoinHandle<RunReport>, TriggerError> {
        let slot = self.slot(dataset)?;
        let guard = slot
            .running
            .clone()
            .try_lock_owned()
            .map_err(|_| TriggerError::AlreadyRunning(slot.schema.id))?;
        slot.in_flight.store(true, Ordering::SeqCst);

        let schema = slot.schema;
        let loader = self.loader.clone();
        let run = tokio::spawn(async move { loader.run(schema).await });

        Ok(tokio::spawn(async move {
            // Held until the summary is recorded, so status never shows idle
            // with a stale last run.
            let _guard = guard;

            let (report, summary) = match run.await {
                Ok(outcome) => {
                    let summary = outcome.summary();
                    (RunReport::Completed(outcome), summary)
                },
                Err(e) => {
                    let message = join_error_message(e);
                    error!(dataset = %schema.id, error = %message, "Ingestion run panicked");
                    let summary = RunSummary::aborted(schema.id, message.clone());
                    (
                        RunReport::Panicked {
                            dataset: schema.id,
                            message,
                        },
                        summary,
                    )
                },
            };

            *slot.last_run.write().await = Some(summary);
            slot.in_flight.store(false, Ordering::SeqCst);
            report
        }))
    }

    /// Run `dataset` and wait for it to finish.
    pub async fn run_dataset(&self, dataset: &str) -> Result<RunReport, TriggerError> {
        let slot = self.slot(dataset)?;
        let handle = self.trigger(dataset)?;
        Ok(handle.await.unwrap_or_else(|e| RunReport::Panicked {
            dataset: slot.schema.id,
            message: join_error_message(e),
        }))
    }

    /// Run every scheduled dataset concurrently and wait for all of them.
    ///
    /// Reports come back in registration order, one per dataset.
    pub async fn run_all(&self) -> Vec<RunReport> {
        info!(datasets = self.slots.len(), "Ingestion cycle started");

        let started: Vec<_> = self
            .slots
            .iter()
            .map(|slot| (slot.schema.id, self.trigger(slot.schema.id)))
            .collect();

        let mut reports = Vec::with_capacity(started.len());
        for (dataset, started) in started {
            let report = match started {
                Ok(handle) => handle.await.unwrap_or_else(|e| RunReport::Panicked {
                    dataset,
                    message: join_error_message(e),
                }),
                Err(e) => {
                    warn!(dataset = %dataset, error = %e, "Skipping dataset");
                    RunReport::Skipped {
                        dataset,
                        reason: e.to_string(),
                    }
                },
            };
            reports.push(report);
        }

        let succeeded = reports.iter().filter(|r| r.is_success()).count();
        let skipped = reports
            .iter()
            .filter(|r| matches!(r, RunReport::Skipped { .. }))
            .count();
        info!(
            succeeded,
            failed = reports.len() - succeeded - skipped,
            skipped,
            "Ingestion cycle completed"
        );

        reports
    }

    /// Run every dataset now and then once per `period`, forever.
    ///
    /// Each tick starts its cycle in a detached task, so a hung dataset delays
    /// nothing but its own next run.
    pub fn start(self, period: Duration) -> JoinHandle<()> {
        tokio::spawn(async move {
            info!(period_secs = period.as_secs(), datasets = ?self.datasets(), "Ingestion timer started");

            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                ticker.tick().await;
                let scheduler = self.clone();
                tokio::spawn(async move {
                    scheduler.run_all().await;
                });
            }
        })
    }

    pub async fn statuses(&self) -> Vec<DatasetStatus> {
        let mut statuses = Vec::with_capacity(self.slots.len());
        for slot in self.slots.iter() {
            let state = if slot.in_flight.load(Ordering::SeqCst) {
                RunState::Running
            } else {
                RunState::Idle
            };
            statuses.push(DatasetStatus {
                dataset: slot.schema.id,
                table: slot.schema.table,
                state,
                last_run: slot.last_run.read().await.clone(),
            });
        }
        statuses
    }
}

fn join_error_message(err: JoinError) -> String {
    if !err.is_panic() {
        return "run was cancelled".to_string();
    }

    let payload = err.into_panic();
    payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "run panicked".to_string())
}
