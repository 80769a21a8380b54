//! Records as they move through a run
//!
//! `SourceRecord` is the raw JSON object from the data source. Validation
//! turns it into a [`ValidatedRecord`] whose values line up with the schema's
//! declared fields, and enrichment appends derived columns to produce an
//! [`EnrichedRecord`] that lines up with [`DatasetSchema::columns`].

use chrono::NaiveDateTime;
use serde_json::{Map, Value};

use super::schema::DatasetSchema;

/// One item of a row-list response
pub type SourceRecord = Map<String, Value>;

/// A typed column value
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Null,
    Text(String),
    Float(f64),
    Timestamp(NaiveDateTime),
}

impl FieldValue {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            FieldValue::Float(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            FieldValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_timestamp(&self) -> Option<NaiveDateTime> {
        match self {
            FieldValue::Timestamp(ts) => Some(*ts),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, FieldValue::Null)
    }
}

impl std::fmt::Display for FieldValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FieldValue::Null => Ok(()),
            FieldValue::Text(s) => f.write_str(s),
            FieldValue::Float(v) => write!(f, "{}", v),
            FieldValue::Timestamp(ts) => write!(f, "{}", ts.format("%Y-%m-%dT%H:%M:%S%.3f")),
        }
    }
}

/// A record that passed every field rule.
///
/// `values[i]` belongs to `schema.fields[i]`.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedRecord {
    pub values: Vec<FieldValue>,
}

impl ValidatedRecord {
    pub fn get(&self, schema: &DatasetSchema, column: &str) -> Option<&FieldValue> {
        schema
            .fields
            .iter()
            .position(|f| f.column == column)
            .and_then(|i| self.values.get(i))
    }

    /// Append derived values, in `schema.enrichments` order.
    pub fn into_enriched(self, derived: Vec<String>) -> EnrichedRecord {
        let mut values = self.values;
        values.extend(derived.into_iter().map(FieldValue::Text));
        EnrichedRecord { values }
    }
}

/// A record ready to insert; `values[i]` belongs to `schema.columns()[i]`.
#[derive(Debug, Clone, PartialEq)]
pub struct EnrichedRecord {
    pub values: Vec<FieldValue>,
}

impl EnrichedRecord {
    pub fn get(&self, schema: &DatasetSchema, column: &str) -> Option<&FieldValue> {
        schema.column_index(column).and_then(|i| self.values.get(i))
    }

    /// Natural key values joined with `|`, for in-memory uniqueness checks
    /// and log fields.
    pub fn natural_key(&self, schema: &DatasetSchema) -> String {
        schema
            .natural_key
            .iter()
            .map(|column| self.get(schema, column).map(ToString::to_string).unwrap_or_default())
            .collect::<Vec<_>>()
            .join("|")
    }
}
