//! Building permits
//!
//! Nearly every descriptive field is mandatory. Coordinates arrive as numbers
//! where `0` stands for "not geocoded", so a zero latitude or longitude drops
//! the permit.

use crate::ingest::schema::{DatasetSchema, FieldKind, FieldSpec, SourceEndpoint};

use FieldKind::{Float, LongText, Text};

pub static SCHEMA: DatasetSchema = DatasetSchema {
    id: "building_permits",
    table: "building_permits",
    sources: &[SourceEndpoint {
        resource: "building-permits",
        limit: 500,
        label: "Building Permits",
    }],
    fields: &[
        FieldSpec::required("id", "permit_id", Text),
        FieldSpec::required("permit_", "permit_code", Text),
        FieldSpec::required("permit_type", "permit_type", Text),
        FieldSpec::required("review_type", "review_type", Text),
        FieldSpec::required("application_start_date", "application_start_date", Text),
        FieldSpec::required("issue_date", "issue_date", Text),
        FieldSpec::required("processing_time", "processing_time", Text),
        FieldSpec::required("street_number", "street_number", Text),
        FieldSpec::required("street_direction", "street_direction", Text),
        FieldSpec::required("street_name", "street_name", Text),
        FieldSpec::required("suffix", "suffix", Text),
        FieldSpec::required("work_description", "work_description", LongText),
        FieldSpec::required("building_fee_paid", "building_fee_paid", Text),
        FieldSpec::required("zoning_fee_paid", "zoning_fee_paid", Text),
        FieldSpec::required("other_fee_paid", "other_fee_paid", Text),
        FieldSpec::required("subtotal_paid", "subtotal_paid", Text),
        FieldSpec::required("building_fee_unpaid", "building_fee_unpaid", Text),
        FieldSpec::required("zoning_fee_unpaid", "zoning_fee_unpaid", Text),
        FieldSpec::required("other_fee_unpaid", "other_fee_unpaid", Text),
        FieldSpec::required("subtotal_unpaid", "subtotal_unpaid", Text),
        FieldSpec::required("building_fee_waived", "building_fee_waived", Text),
        FieldSpec::required("zoning_fee_waived", "zoning_fee_waived", Text),
        FieldSpec::required("other_fee_waived", "other_fee_waived", Text),
        FieldSpec::required("subtotal_waived", "subtotal_waived", Text),
        FieldSpec::required("total_fee", "total_fee", Text),
        FieldSpec::required("contact_1_type", "contact_1_type", Text),
        FieldSpec::required("contact_1_name", "contact_1_name", Text),
        FieldSpec::required("contact_1_city", "contact_1_city", Text),
        FieldSpec::required("contact_1_state", "contact_1_state", Text),
        FieldSpec::required("contact_1_zipcode", "contact_1_zipcode", Text),
        FieldSpec::required("reported_cost", "reported_cost", Float),
        FieldSpec::required("pin1", "pin1", Text),
        FieldSpec::optional("pin2", "pin2", Text),
        FieldSpec::optional("community_area", "community_area", Text),
        FieldSpec::required("census_tract", "census_tract", Text),
        FieldSpec::required("ward", "ward", Text),
        FieldSpec::optional("xcoordinate", "xcoordinate", Float),
        FieldSpec::optional("ycoordinate", "ycoordinate", Float),
        FieldSpec::required("latitude", "latitude", Float).zero_is_unset(),
        FieldSpec::required("longitude", "longitude", Float).zero_is_unset(),
    ],
    natural_key: &["permit_id"],
    enrichments: &[],
};
