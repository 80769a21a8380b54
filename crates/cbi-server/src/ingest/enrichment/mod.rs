//! Enrichment stage
//!
//! Derives a postal code for every [`Enrichment`](super::schema::Enrichment)
//! a schema declares. All lookups for a record must succeed or the record is
//! rejected; there is no partially enriched row.

pub mod geocoder;

pub use geocoder::{
    Address, GeocodeError, GoogleGeocoder, Location, ReverseGeocoder, UnconfiguredGeocoder,
};

use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::debug;

use super::record::{EnrichedRecord, FieldValue, ValidatedRecord};
use super::schema::DatasetSchema;

/// Why a record was dropped during enrichment
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EnrichmentRejection {
    #[error("coordinate '{field}' is not a number")]
    MalformedCoordinate { field: &'static str },

    #[error("lookup for '{target}' failed: {message}")]
    LookupFailed {
        target: &'static str,
        message: String,
    },

    #[error("lookup for '{target}' returned no results")]
    NoResult { target: &'static str },

    #[error("first result for '{target}' has no postal code")]
    NoPostalCode { target: &'static str },
}

impl EnrichmentRejection {
    pub fn rule(&self) -> &'static str {
        match self {
            EnrichmentRejection::MalformedCoordinate { .. } => "malformed_coordinate",
            EnrichmentRejection::LookupFailed { .. } => "geocode_failed",
            EnrichmentRejection::NoResult { .. } => "no_geocode_result",
            EnrichmentRejection::NoPostalCode { .. } => "no_postal_code",
        }
    }
}

type MemoKey = (u64, u64);

/// Reverse-geocodes records for one run.
///
/// Successful postal codes are memoised by exact coordinate pair for the life
/// of the enricher. Failed lookups are not, so the next record with the same
/// coordinates asks again.
pub struct Enricher {
    geocoder: Arc<dyn ReverseGeocoder>,
    memo: Mutex<HashMap<MemoKey, String>>,
}

impl Enricher {
    pub fn new(geocoder: Arc<dyn ReverseGeocoder>) -> Self {
        Self {
            geocoder,
            memo: Mutex::new(HashMap::new()),
        }
    }

    pub async fn enrich(
        &self,
        schema: &DatasetSchema,
        record: ValidatedRecord,
    ) -> Result<EnrichedRecord, EnrichmentRejection> {
        let mut derived = Vec::with_capacity(schema.enrichments.len());

        for enrichment in schema.enrichments {
            let location = Location {
                latitude: coordinate(schema, &record, enrichment.latitude)?,
                longitude: coordinate(schema, &record, enrichment.longitude)?,
            };
            derived.push(self.postal_code(enrichment.target, location).await?);
        }

        Ok(record.into_enriched(derived))
    }

    async fn postal_code(
        &self,
        target: &'static str,
        location: Location,
    ) -> Result<String, EnrichmentRejection> {
        let key = (location.latitude.to_bits(), location.longitude.to_bits());
        if let Some(code) = self.memo.lock().await.get(&key) {
            return Ok(code.clone());
        }

        let addresses = self
            .geocoder
            .reverse(location)
            .await
            .map_err(|e| EnrichmentRejection::LookupFailed {
                target,
                message: e.to_string(),
            })?;

        let first = addresses
            .into_iter()
            .next()
            .ok_or(EnrichmentRejection::NoResult { target })?;
        let code = first
            .postal_code
            .ok_or(EnrichmentRejection::NoPostalCode { target })?;

        debug!(
            latitude = location.latitude,
            longitude = location.longitude,
            postal_code = %code,
            "Reverse geocoded"
        );
        self.memo.lock().await.insert(key, code.clone());
        Ok(code)
    }

    /// Distinct coordinate pairs resolved so far.
    pub async fn memoised(&self) -> usize {
        self.memo.lock().await.len()
    }
}

fn coordinate(
    schema: &DatasetSchema,
    record: &ValidatedRecord,
    field: &'static str,
) -> Result<f64, EnrichmentRejection> {
    record
        .get(schema, field)
        .and_then(FieldValue::as_f64)
        .filter(|v| v.is_finite())
        .ok_or(EnrichmentRejection::MalformedCoordinate { field })
}
