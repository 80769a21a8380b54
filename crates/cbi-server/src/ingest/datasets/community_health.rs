//! Public health and economic indicators per community area
//!
//! Only the area number and name are mandatory. The indicator columns are
//! kept as the source's text so rates like "8.2" and suppressed values
//! survive unchanged.

use crate::ingest::schema::{DatasetSchema, FieldKind, FieldSpec, SourceEndpoint};

macro_rules! indicators {
    ($($name:literal),* $(,)?) => {
        &[
            FieldSpec::required("community_area", "community_area", FieldKind::Text),
            FieldSpec::required("community_area_name", "community_area_name", FieldKind::Text),
            $(FieldSpec::optional($name, $name, FieldKind::Text),)*
        ]
    };
}

pub static SCHEMA: DatasetSchema = DatasetSchema {
    id: "community_health",
    table: "community_area_unemployment",
    sources: &[SourceEndpoint {
        resource: "iqnk-2tcu",
        limit: 100,
        label: "Public Health Statistics by Community Area",
    }],
    fields: indicators![
        "birth_rate",
        "general_fertility_rate",
        "low_birth_weight",
        "prenatal_care_beginning_in_first_trimester",
        "preterm_births",
        "teen_birth_rate",
        "assault_homicide",
        "breast_cancer_in_females",
        "cancer_all_sites",
        "colorectal_cancer",
        "diabetes_related",
        "firearm_related",
        "infant_mortality_rate",
        "lung_cancer",
        "prostate_cancer_in_males",
        "stroke_cerebrovascular_disease",
        "childhood_blood_lead_level_screening",
        "childhood_lead_poisoning",
        "gonorrhea_in_females",
        "gonorrhea_in_males",
        "tuberculosis",
        "below_poverty_level",
        "crowded_housing",
        "dependency",
        "no_high_school_diploma",
        "unemployment",
        "per_capita_income",
    ],
    natural_key: &["community_area"],
    enrichments: &[],
};
