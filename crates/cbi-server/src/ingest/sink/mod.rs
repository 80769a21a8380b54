//! Sink adapter
//!
//! The loader only needs four table operations, so the relational store sits
//! behind the [`Sink`] trait. [`PgSink`] is the Postgres implementation; tests
//! substitute an in-memory one.
//!
//! Table lifecycle for one run:
//!
//! 1. [`Sink::reset_staging`] drops and recreates `<table>__staging`.
//! 2. [`Sink::insert`] adds one row at a time to the staging table.
//! 3. [`Sink::publish`] replaces the serving table with the staging table in
//!    one transaction.
//!
//! [`Sink::discard_staging`] undoes step 1 when a run aborts; the serving
//! table is untouched until step 3.

pub mod ddl;
pub mod postgres;

pub use postgres::PgSink;

use async_trait::async_trait;
use thiserror::Error;

use super::record::EnrichedRecord;
use super::schema::DatasetSchema;

#[derive(Error, Debug)]
pub enum SinkError {
    /// The store refused this row only; the connection is still usable
    #[error("row rejected by {table}: {message}")]
    RowRejected { table: String, message: String },

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl SinkError {
    /// Whether the failure affects a single row rather than the run.
    pub fn is_record_level(&self) -> bool {
        matches!(self, SinkError::RowRejected { .. })
    }

    /// Classify an insert failure.
    ///
    /// SQLSTATE class 22 (data exception) and class 23 (integrity constraint
    /// violation, e.g. a duplicate natural key) are row-level. Everything else,
    /// including connection loss, fails the run.
    pub fn from_insert(table: &str, err: sqlx::Error) -> Self {
        let row_level = err
            .as_database_error()
            .and_then(|db| db.code())
            .is_some_and(|code| code.starts_with("22") || code.starts_with("23"));

        if row_level {
            SinkError::RowRejected {
                table: table.to_string(),
                message: err.to_string(),
            }
        } else {
            SinkError::Database(err)
        }
    }
}

#[async_trait]
pub trait Sink: Send + Sync {
    /// Drop any leftover staging table and create an empty one.
    async fn reset_staging(&self, schema: &DatasetSchema) -> Result<(), SinkError>;

    /// Insert one record into the staging table.
    async fn insert(&self, schema: &DatasetSchema, record: &EnrichedRecord) -> Result<(), SinkError>;

    /// Atomically replace the serving table with the staging table.
    async fn publish(&self, schema: &DatasetSchema) -> Result<(), SinkError>;

    /// Drop the staging table, if any.
    async fn discard_staging(&self, schema: &DatasetSchema) -> Result<(), SinkError>;
}
