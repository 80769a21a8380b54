//! Weekly COVID-19 cases, tests and positivity by ZIP code

use crate::ingest::schema::{
    DatasetSchema, FieldKind, FieldSpec, SourceEndpoint, SODA_TIMESTAMP_MIN_LEN,
};

const WEEK_BOUNDARY: FieldKind = FieldKind::Timestamp {
    min_len: SODA_TIMESTAMP_MIN_LEN,
};

pub static SCHEMA: DatasetSchema = DatasetSchema {
    id: "covid_cases",
    table: "covid_cases_by_zip",
    sources: &[SourceEndpoint {
        resource: "yhhz-zm2v",
        limit: 500,
        label: "COVID-19 Cases, Tests, and Deaths by ZIP Code",
    }],
    fields: &[
        FieldSpec::required("zip_code", "zip_code", FieldKind::Text),
        FieldSpec::required("week_number", "week_number", FieldKind::Text),
        FieldSpec::required("week_start", "week_start", WEEK_BOUNDARY),
        FieldSpec::required("week_end", "week_end", WEEK_BOUNDARY),
        FieldSpec::optional("cases_weekly", "cases_weekly", FieldKind::Float),
        FieldSpec::optional("cases_cumulative", "cases_cumulative", FieldKind::Float),
        FieldSpec::optional("case_rate_weekly", "case_rate_weekly", FieldKind::Float),
        FieldSpec::optional("case_rate_cumulative", "case_rate_cumulative", FieldKind::Float),
        FieldSpec::optional(
            "percent_tested_positive_weekly",
            "percent_tested_positive_weekly",
            FieldKind::Float,
        ),
        FieldSpec::optional(
            "percent_tested_positive_cumulative",
            "percent_tested_positive_cumulative",
            FieldKind::Float,
        ),
        FieldSpec::optional("population", "population", FieldKind::Float),
    ],
    natural_key: &["zip_code", "week_start"],
    enrichments: &[],
};
