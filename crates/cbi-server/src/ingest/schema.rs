//! Record schema registry types
//!
//! A [`DatasetSchema`] is pure data: where a dataset comes from, which source
//! fields it reads and how they are typed, the destination table and its
//! natural key, and which columns are derived by reverse geocoding. Each
//! dataset declares one `static` schema in its own module under
//! `ingest::datasets`, so adding a dataset never touches another's definition.

use thiserror::Error;

/// Minimum length of a floating ISO-8601 timestamp with milliseconds,
/// e.g. `2024-01-31T23:45:00.000`.
pub const SODA_TIMESTAMP_MIN_LEN: usize = 23;

/// An inconsistency in a dataset declaration
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaError {
    #[error("{dataset}: no source endpoints")]
    NoSources { dataset: &'static str },

    #[error("{dataset}: empty natural key")]
    EmptyNaturalKey { dataset: &'static str },

    #[error("{dataset}: duplicate column '{column}'")]
    DuplicateColumn {
        dataset: &'static str,
        column: &'static str,
    },

    #[error("{dataset}: natural key '{column}' is optional")]
    OptionalNaturalKey {
        dataset: &'static str,
        column: &'static str,
    },

    #[error("{dataset}: natural key '{column}' is not a field")]
    UnknownNaturalKey {
        dataset: &'static str,
        column: &'static str,
    },

    #[error("{dataset}: enrichment '{target}' needs numeric field '{column}'")]
    NonNumericCoordinate {
        dataset: &'static str,
        target: &'static str,
        column: &'static str,
    },
}

/// Declared primitive of a field, shared by the source and destination sides
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// Short string, stored as `VARCHAR(255)`
    Text,
    /// Free-form string, stored as `TEXT`
    LongText,
    /// Number, stored as `DOUBLE PRECISION`
    Float,
    /// Floating timestamp string, stored as `TIMESTAMP`. Raw values shorter
    /// than `min_len` characters are rejected before parsing.
    Timestamp { min_len: usize },
}

impl FieldKind {
    pub fn sql_type(self) -> &'static str {
        match self {
            FieldKind::Text => "VARCHAR(255)",
            FieldKind::LongText => "TEXT",
            FieldKind::Float => "DOUBLE PRECISION",
            FieldKind::Timestamp { .. } => "TIMESTAMP",
        }
    }

    pub fn is_numeric(self) -> bool {
        matches!(self, FieldKind::Float)
    }
}

/// One source field and the column it lands in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    /// Key in the source JSON object
    pub source: &'static str,
    /// Destination column name
    pub column: &'static str,
    pub kind: FieldKind,
    /// Absent or empty rejects the whole record
    pub required: bool,
    /// The source writes `0` for "unset"; a zero value rejects the record
    pub zero_is_unset: bool,
}

impl FieldSpec {
    pub const fn required(source: &'static str, column: &'static str, kind: FieldKind) -> Self {
        Self {
            source,
            column,
            kind,
            required: true,
            zero_is_unset: false,
        }
    }

    pub const fn optional(source: &'static str, column: &'static str, kind: FieldKind) -> Self {
        Self {
            source,
            column,
            kind,
            required: false,
            zero_is_unset: false,
        }
    }

    /// Mark a numeric field whose zero value means "unset".
    pub const fn zero_is_unset(mut self) -> Self {
        self.zero_is_unset = true;
        self
    }
}

/// A postal code derived from a latitude/longitude column pair
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Enrichment {
    pub latitude: &'static str,
    pub longitude: &'static str,
    /// Derived column, stored as `VARCHAR(255)`
    pub target: &'static str,
}

/// One row-list resource feeding a dataset
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceEndpoint {
    /// Resource identifier appended to the data-source base URL
    pub resource: &'static str,
    /// Maximum number of rows requested per run
    pub limit: u32,
    pub label: &'static str,
}

/// A destination column, in insert order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Column {
    pub name: &'static str,
    pub kind: FieldKind,
}

#[derive(Debug, PartialEq, Eq)]
pub struct DatasetSchema {
    /// Stable identifier used by configuration, the CLI, and the HTTP trigger
    pub id: &'static str,
    pub table: &'static str,
    /// Concatenated in declaration order into one logical feed
    pub sources: &'static [SourceEndpoint],
    pub fields: &'static [FieldSpec],
    /// Destination columns forming the uniqueness constraint
    pub natural_key: &'static [&'static str],
    pub enrichments: &'static [Enrichment],
}

impl DatasetSchema {
    /// Table a run loads into before it is swapped over `table`.
    pub fn staging_table(&self) -> String {
        format!("{}__staging", self.table)
    }

    /// Declared fields followed by enrichment targets.
    pub fn columns(&self) -> Vec<Column> {
        self.fields
            .iter()
            .map(|f| Column {
                name: f.column,
                kind: f.kind,
            })
            .chain(self.enrichments.iter().map(|e| Column {
                name: e.target,
                kind: FieldKind::Text,
            }))
            .collect()
    }

    pub fn column_index(&self, column: &str) -> Option<usize> {
        self.columns().iter().position(|c| c.name == column)
    }

    pub fn field(&self, column: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|f| f.column == column)
    }

    /// Check the declaration is internally consistent.
    ///
    /// Every natural-key column must be a required field, every enrichment
    /// must read numeric fields, and column names must be unique.
    pub fn check(&self) -> Result<(), SchemaError> {
        let dataset = self.id;
        if self.sources.is_empty() {
            return Err(SchemaError::NoSources { dataset });
        }
        if self.natural_key.is_empty() {
            return Err(SchemaError::EmptyNaturalKey { dataset });
        }

        let columns = self.columns();
        for (i, column) in columns.iter().enumerate() {
            if columns[..i].iter().any(|c| c.name == column.name) {
                return Err(SchemaError::DuplicateColumn {
                    dataset,
                    column: column.name,
                });
            }
        }

        for &key in self.natural_key {
            match self.field(key) {
                Some(field) if field.required => {},
                Some(_) => return Err(SchemaError::OptionalNaturalKey { dataset, column: key }),
                None => return Err(SchemaError::UnknownNaturalKey { dataset, column: key }),
            }
        }

        for enrichment in self.enrichments {
            for coord in [enrichment.latitude, enrichment.longitude] {
                match self.field(coord) {
                    Some(field) if field.kind.is_numeric() => {},
                    _ => {
                        return Err(SchemaError::NonNumericCoordinate {
                            dataset,
                            target: enrichment.target,
                            column: coord,
                        });
                    },
                }
            }
        }

        Ok(())
    }
}
