//! Postgres sink

use async_trait::async_trait;
use sqlx::postgres::{PgArguments, PgPool};
use sqlx::query::Query;
use sqlx::Postgres;
use tracing::{debug, info};

use super::{ddl, Sink, SinkError};
use crate::ingest::record::{EnrichedRecord, FieldValue};
use crate::ingest::schema::{DatasetSchema, FieldKind};

/// Sink backed by a shared connection pool.
///
/// Cloning is cheap; every concurrently running loader gets a handle to the
/// same pool.
#[derive(Clone)]
pub struct PgSink {
    pool: PgPool,
}

impl PgSink {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

fn bind_value<'q>(
    query: Query<'q, Postgres, PgArguments>,
    kind: FieldKind,
    value: &FieldValue,
) -> Query<'q, Postgres, PgArguments> {
    // NULLs are bound with the column's type so Postgres never has to infer it.
    match kind {
        FieldKind::Text | FieldKind::LongText => query.bind(value.as_text().map(str::to_owned)),
        FieldKind::Float => query.bind(value.as_f64()),
        FieldKind::Timestamp { .. } => query.bind(value.as_timestamp()),
    }
}

#[async_trait]
impl Sink for PgSink {
    async fn reset_staging(&self, schema: &DatasetSchema) -> Result<(), SinkError> {
        let staging = schema.staging_table();

        sqlx::query(&ddl::drop_staging_sql(&staging))
            .execute(&self.pool)
            .await?;
        sqlx::query(&ddl::create_table_sql(schema, &staging))
            .execute(&self.pool)
            .await?;

        debug!(table = %staging, "Staging table created");
        Ok(())
    }

    async fn insert(&self, schema: &DatasetSchema, record: &EnrichedRecord) -> Result<(), SinkError> {
        let staging = schema.staging_table();
        let sql = ddl::insert_sql(schema, &staging);

        let query = schema
            .columns()
            .iter()
            .zip(&record.values)
            .fold(sqlx::query(&sql), |query, (column, value)| {
                bind_value(query, column.kind, value)
            });

        query
            .execute(&self.pool)
            .await
            .map_err(|e| SinkError::from_insert(&staging, e))?;

        Ok(())
    }

    async fn publish(&self, schema: &DatasetSchema) -> Result<(), SinkError> {
        let staging = schema.staging_table();

        let mut tx = self.pool.begin().await?;
        sqlx::query(&ddl::drop_table_sql(schema.table))
            .execute(&mut *tx)
            .await?;
        sqlx::query(&ddl::rename_table_sql(&staging, schema.table))
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        info!(table = %schema.table, staging = %staging, "Swapped staging table into place");
        Ok(())
    }

    async fn discard_staging(&self, schema: &DatasetSchema) -> Result<(), SinkError> {
        sqlx::query(&ddl::drop_staging_sql(&schema.staging_table()))
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
