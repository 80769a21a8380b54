//! Chicago COVID-19 Community Vulnerability Index

use crate::ingest::schema::{DatasetSchema, FieldKind, FieldSpec, SourceEndpoint};

pub static SCHEMA: DatasetSchema = DatasetSchema {
    id: "ccvi",
    table: "ccvi_details",
    sources: &[SourceEndpoint {
        resource: "xhc6-88s9",
        limit: 200,
        label: "Chicago COVID-19 Community Vulnerability Index",
    }],
    fields: &[
        FieldSpec::required("geography_type", "geography_type", FieldKind::Text),
        FieldSpec::required("community_area_or_zip", "community_area_or_zip", FieldKind::Text),
        FieldSpec::optional("community_area_name", "community_area_name", FieldKind::Text),
        FieldSpec::optional("ccvi_score", "ccvi_score", FieldKind::Float),
        FieldSpec::optional("ccvi_category", "ccvi_category", FieldKind::Text),
    ],
    natural_key: &["geography_type", "community_area_or_zip"],
    enrichments: &[],
};
