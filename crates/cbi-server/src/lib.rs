//! CBI Server Library
//!
//! Batch ingestion of City of Chicago open data into Postgres.
//!
//! # Overview
//!
//! - **Ingestion**: each registered dataset is pulled from the city's row-list
//!   JSON API, validated field by field, optionally reverse geocoded to a ZIP
//!   code, and loaded as a full refresh through a staging table
//! - **Scheduling**: every scheduled dataset runs on a daily timer, each in its
//!   own task, with at most one run per dataset in flight
//! - **HTTP**: a liveness endpoint, a database health probe, run status and a
//!   run-now trigger
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use cbi_server::{config::Config, db, ingest};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load()?;
//!     let ingest_config = ingest::IngestConfig::from_env()?;
//!     let pool = db::create_pool(&config.database)?;
//!     let sink = Arc::new(ingest::sink::PgSink::new(pool));
//!     let scheduler = ingest::build_scheduler(&ingest_config, &ingest_config.datasets, sink)?;
//!     for report in scheduler.run_all().await {
//!         tracing::info!(dataset = report.dataset(), ok = report.is_success());
//!     }
//!     Ok(())
//! }
//! ```

#![deny(clippy::unwrap_used, clippy::expect_used)]
#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used))]

pub mod api;
pub mod config;
pub mod db;
pub mod error;
pub mod ingest;
pub mod middleware;

pub use error::ApiError;
