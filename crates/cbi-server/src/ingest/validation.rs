//! Field validation and normalization
//!
//! [`validate`] walks a schema's fields in declaration order and stops at the
//! first rule that fails. A record either comes out fully typed or is rejected
//! as a whole with a [`Rejection`] naming the field and the rule.
//!
//! Rules, per field:
//!
//! | rule               | applies to                  | rejects when                               |
//! |--------------------|-----------------------------|--------------------------------------------|
//! | `required`         | required fields             | absent, `null`, or blank after trimming    |
//! | `json_type`        | every field                 | value is an object or array                |
//! | `numeric`          | `Float` fields              | present but not a finite number            |
//! | `nonzero_sentinel` | `Float` with `zero_is_unset`| value is exactly zero                      |
//! | `timestamp_length` | `Timestamp` fields          | raw string shorter than the minimum length |
//! | `timestamp_format` | `Timestamp` fields          | long enough but not a timestamp            |
//!
//! Optional fields that are absent or blank become `NULL`.

use chrono::{DateTime, NaiveDateTime};
use serde_json::Value;
use thiserror::Error;

use super::record::{FieldValue, SourceRecord, ValidatedRecord};
use super::schema::{DatasetSchema, FieldKind, FieldSpec};

/// Floating timestamp format used by the row-list API
pub const SODA_TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.f";

/// Why a record was dropped during validation
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Rejection {
    #[error("required field '{field}' is missing or empty")]
    Missing { field: &'static str },

    #[error("field '{field}' is not a number: {value:?}")]
    NotANumber { field: &'static str, value: String },

    #[error("field '{field}' is shorter than {min_len} characters: {value:?}")]
    TimestampTooShort {
        field: &'static str,
        min_len: usize,
        value: String,
    },

    #[error("field '{field}' is not a timestamp: {value:?}")]
    BadTimestamp { field: &'static str, value: String },

    #[error("field '{field}' holds the zero sentinel")]
    SentinelZero { field: &'static str },

    #[error("field '{field}' has an unsupported JSON type")]
    UnsupportedType { field: &'static str },
}

impl Rejection {
    /// Stable reason code, used as the rejection counter key.
    pub fn rule(&self) -> &'static str {
        match self {
            Rejection::Missing { .. } => "required",
            Rejection::NotANumber { .. } => "numeric",
            Rejection::TimestampTooShort { .. } => "timestamp_length",
            Rejection::BadTimestamp { .. } => "timestamp_format",
            Rejection::SentinelZero { .. } => "nonzero_sentinel",
            Rejection::UnsupportedType { .. } => "json_type",
        }
    }

    pub fn field(&self) -> &'static str {
        match self {
            Rejection::Missing { field }
            | Rejection::NotANumber { field, .. }
            | Rejection::TimestampTooShort { field, .. }
            | Rejection::BadTimestamp { field, .. }
            | Rejection::SentinelZero { field }
            | Rejection::UnsupportedType { field } => field,
        }
    }
}

/// Validate and coerce one source record against `schema`.
pub fn validate(schema: &DatasetSchema, record: &SourceRecord) -> Result<ValidatedRecord, Rejection> {
    let values = schema
        .fields
        .iter()
        .map(|spec| validate_field(spec, record.get(spec.source)))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(ValidatedRecord { values })
}

fn validate_field(spec: &FieldSpec, raw: Option<&Value>) -> Result<FieldValue, Rejection> {
    let field = spec.source;

    let raw = match raw {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) if s.trim().is_empty() => None,
        Some(Value::Array(_)) | Some(Value::Object(_)) => {
            return Err(Rejection::UnsupportedType { field });
        },
        Some(value) => Some(value),
    };

    let Some(raw) = raw else {
        return if spec.required {
            Err(Rejection::Missing { field })
        } else {
            Ok(FieldValue::Null)
        };
    };

    match spec.kind {
        FieldKind::Text | FieldKind::LongText => Ok(FieldValue::Text(scalar_text(raw))),
        FieldKind::Float => {
            let value = parse_float(raw).ok_or_else(|| Rejection::NotANumber {
                field,
                value: scalar_text(raw),
            })?;
            if spec.zero_is_unset && value == 0.0 {
                return Err(Rejection::SentinelZero { field });
            }
            Ok(FieldValue::Float(value))
        },
        FieldKind::Timestamp { min_len } => {
            let text = scalar_text(raw);
            if text.chars().count() < min_len {
                return Err(Rejection::TimestampTooShort {
                    field,
                    min_len,
                    value: text,
                });
            }
            parse_timestamp(&text)
                .map(FieldValue::Timestamp)
                .ok_or(Rejection::BadTimestamp { field, value: text })
        },
    }
}

fn scalar_text(raw: &Value) -> String {
    match raw {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn parse_float(raw: &Value) -> Option<f64> {
    let value = match raw {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    value.is_finite().then_some(value)
}

fn parse_timestamp(text: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(text, SODA_TIMESTAMP_FORMAT)
        .ok()
        .or_else(|| DateTime::parse_from_rfc3339(text).ok().map(|dt| dt.naive_utc()))
}
