//! Test helpers for CBI server integration tests
//!
//! - [`MemorySink`]: an in-memory [`Sink`] that enforces natural-key
//!   uniqueness like the Postgres `UNIQUE` constraint does
//! - [`StaticSource`]: a [`RecordSource`] serving canned rows per resource
//! - [`ScriptedGeocoder`]: a [`ReverseGeocoder`] answering from a closure
//! - builders for the production loader wired to a mock server

#![allow(dead_code)]

use async_trait::async_trait;
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use cbi_server::ingest::enrichment::{Address, GeocodeError, Location, ReverseGeocoder};
use cbi_server::ingest::error::IngestError;
use cbi_server::ingest::record::{EnrichedRecord, SourceRecord};
use cbi_server::ingest::schema::{DatasetSchema, SourceEndpoint};
use cbi_server::ingest::sink::{Sink, SinkError};
use cbi_server::ingest::source::{RecordSource, SodaClient};
use cbi_server::ingest::{DatasetLoader, LoaderSettings};

// ============================================================================
// Sink
// ============================================================================

#[derive(Debug, Default, Clone)]
pub struct MemoryTable {
    pub rows: Vec<EnrichedRecord>,
    keys: HashSet<String>,
}

#[derive(Default)]
pub struct MemorySink {
    tables: Mutex<HashMap<String, MemoryTable>>,
    fail_reset: AtomicBool,
    fail_inserts: AtomicBool,
    publishes: AtomicUsize,
}

impl MemorySink {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Make the next `reset_staging` calls fail like a DDL error.
    pub fn fail_reset(&self, fail: bool) {
        self.fail_reset.store(fail, Ordering::SeqCst);
    }

    /// Make inserts fail like a dropped connection.
    pub fn fail_inserts(&self, fail: bool) {
        self.fail_inserts.store(fail, Ordering::SeqCst);
    }

    pub fn table(&self, name: &str) -> Option<MemoryTable> {
        self.tables.lock().unwrap().get(name).cloned()
    }

    pub fn has_table(&self, name: &str) -> bool {
        self.tables.lock().unwrap().contains_key(name)
    }

    pub fn publishes(&self) -> usize {
        self.publishes.load(Ordering::SeqCst)
    }

    /// Column `column` of every row in `table`, as text.
    pub fn column(&self, schema: &DatasetSchema, table: &str, column: &str) -> Vec<String> {
        self.table(table)
            .map(|t| {
                t.rows
                    .iter()
                    .map(|r| r.get(schema, column).map(ToString::to_string).unwrap_or_default())
                    .collect()
            })
            .unwrap_or_default()
    }
}

#[async_trait]
impl Sink for MemorySink {
    async fn reset_staging(&self, schema: &DatasetSchema) -> Result<(), SinkError> {
        if self.fail_reset.load(Ordering::SeqCst) {
            return Err(SinkError::Database(sqlx::Error::PoolTimedOut));
        }
        self.tables
            .lock()
            .unwrap()
            .insert(schema.staging_table(), MemoryTable::default());
        Ok(())
    }

    async fn insert(&self, schema: &DatasetSchema, record: &EnrichedRecord) -> Result<(), SinkError> {
        if self.fail_inserts.load(Ordering::SeqCst) {
            return Err(SinkError::Database(sqlx::Error::PoolClosed));
        }

        let staging = schema.staging_table();
        let mut tables = self.tables.lock().unwrap();
        let table = tables
            .get_mut(&staging)
            .ok_or(SinkError::Database(sqlx::Error::RowNotFound))?;

        let key = record.natural_key(schema);
        if !table.keys.insert(key.clone()) {
            return Err(SinkError::RowRejected {
                table: staging,
                message: format!("duplicate key value ({})", key),
            });
        }
        table.rows.push(record.clone());
        Ok(())
    }

    async fn publish(&self, schema: &DatasetSchema) -> Result<(), SinkError> {
        let mut tables = self.tables.lock().unwrap();
        let staging = tables
            .remove(&schema.staging_table())
            .ok_or(SinkError::Database(sqlx::Error::RowNotFound))?;
        tables.insert(schema.table.to_string(), staging);
        self.publishes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn discard_staging(&self, schema: &DatasetSchema) -> Result<(), SinkError> {
        self.tables.lock().unwrap().remove(&schema.staging_table());
        Ok(())
    }
}

// ============================================================================
// Source
// ============================================================================

#[derive(Default)]
pub struct StaticSource {
    rows: HashMap<&'static str, Vec<Value>>,
    broken: HashSet<&'static str>,
    delay: Option<Duration>,
}

impl StaticSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_rows(mut self, resource: &'static str, rows: Vec<Value>) -> Self {
        self.rows.insert(resource, rows);
        self
    }

    /// Fetching `resource` fails with a malformed body.
    pub fn broken(mut self, resource: &'static str) -> Self {
        self.broken.insert(resource);
        self
    }

    /// Every fetch sleeps this long first.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }
}

#[async_trait]
impl RecordSource for StaticSource {
    async fn fetch(&self, endpoint: &SourceEndpoint) -> Result<Vec<SourceRecord>, IngestError> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.broken.contains(endpoint.resource) {
            return Err(IngestError::MalformedBody {
                url: endpoint.resource.to_string(),
                message: "expected a JSON array".to_string(),
            });
        }

        Ok(self
            .rows
            .get(endpoint.resource)
            .into_iter()
            .flatten()
            .filter_map(|row| row.as_object().cloned())
            .collect())
    }
}

// ============================================================================
// Geocoder
// ============================================================================

type Lookup = dyn Fn(Location) -> Result<Vec<Address>, GeocodeError> + Send + Sync;

pub struct ScriptedGeocoder {
    lookup: Box<Lookup>,
    calls: AtomicUsize,
}

impl ScriptedGeocoder {
    pub fn new(
        lookup: impl Fn(Location) -> Result<Vec<Address>, GeocodeError> + Send + Sync + 'static,
    ) -> Arc<Self> {
        Arc::new(Self {
            lookup: Box::new(lookup),
            calls: AtomicUsize::new(0),
        })
    }

    /// Every location resolves to `postal_code`.
    pub fn always(postal_code: &'static str) -> Arc<Self> {
        Self::new(move |_| Ok(vec![address(Some(postal_code))]))
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ReverseGeocoder for ScriptedGeocoder {
    async fn reverse(&self, location: Location) -> Result<Vec<Address>, GeocodeError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        (self.lookup)(location)
    }
}

pub fn address(postal_code: Option<&str>) -> Address {
    Address {
        formatted_address: "Chicago, IL, USA".to_string(),
        postal_code: postal_code.map(str::to_string),
    }
}

pub fn denied() -> GeocodeError {
    GeocodeError::Status {
        status: "REQUEST_DENIED".to_string(),
        message: "test".to_string(),
    }
}

// ============================================================================
// Builders
// ============================================================================

pub fn loader(
    source: impl RecordSource + 'static,
    geocoder: Arc<dyn ReverseGeocoder>,
    sink: Arc<MemorySink>,
) -> DatasetLoader {
    DatasetLoader::new(Arc::new(source), geocoder, sink, LoaderSettings::default())
}

/// A row-list client pointed at a mock server.
pub fn soda_client(base_url: &str, page_size: u32) -> SodaClient {
    SodaClient::new(
        format!("{}/resource", base_url),
        None,
        page_size,
        Duration::from_secs(5),
    )
    .unwrap()
}

// ============================================================================
// Fixtures
// ============================================================================

pub fn trip(trip_id: &str) -> Value {
    serde_json::json!({
        "trip_id": trip_id,
        "trip_start_timestamp": "2024-01-31T23:45:00.000",
        "trip_end_timestamp": "2024-02-01T00:00:00.000",
        "pickup_centroid_latitude": "41.880994471",
        "pickup_centroid_longitude": "-87.632746489",
        "dropoff_centroid_latitude": "41.899602111",
        "dropoff_centroid_longitude": "-87.633308037"
    })
}

pub fn community_area(number: &str, name: &str) -> Value {
    serde_json::json!({
        "community_area": number,
        "community_area_name": name,
        "below_poverty_level": "23.6",
        "unemployment": "7.5"
    })
}

/// A building permit with every required field filled in.
pub fn permit(id: &str) -> Value {
    let mut permit = serde_json::Map::new();
    for field in cbi_server::ingest::datasets::building_permits::SCHEMA.fields {
        if field.required {
            permit.insert(field.source.to_string(), Value::from("1"));
        }
    }
    permit.insert("id".into(), Value::from(id));
    permit.insert("permit_".into(), Value::from(format!("100{}", id)));
    permit.insert("reported_cost".into(), Value::from("25000"));
    permit.insert("latitude".into(), Value::from("41.8781"));
    permit.insert("longitude".into(), Value::from("-87.6298"));
    Value::Object(permit)
}
