//! Registered datasets
//!
//! One module per dataset, each exporting a `static SCHEMA`. Register a new
//! dataset by adding its module and listing it in [`REGISTRY`].

pub mod building_permits;
pub mod ccvi;
pub mod community_health;
pub mod covid_cases;
pub mod taxi_trips;

use super::schema::DatasetSchema;

/// Every dataset this service knows how to load.
pub static REGISTRY: [&DatasetSchema; 5] = [
    &community_health::SCHEMA,
    &building_permits::SCHEMA,
    &taxi_trips::SCHEMA,
    &covid_cases::SCHEMA,
    &ccvi::SCHEMA,
];

/// Datasets the scheduler runs when none are configured.
pub const DEFAULT_SCHEDULED: &[&str] = &["community_health", "building_permits", "taxi_trips"];

pub fn all() -> &'static [&'static DatasetSchema] {
    &REGISTRY
}

pub fn find(id: &str) -> Option<&'static DatasetSchema> {
    REGISTRY.iter().copied().find(|schema| schema.id == id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::schema::FieldKind;

    #[test]
    fn test_every_registered_schema_is_consistent() {
        for schema in all() {
            assert_eq!(schema.check(), Ok(()), "schema {}", schema.id);
        }
    }

    #[test]
    fn test_ids_and_tables_are_unique() {
        for (i, schema) in all().iter().enumerate() {
            for other in &all()[i + 1..] {
                assert_ne!(schema.id, other.id);
                assert_ne!(schema.table, other.table);
            }
        }
    }

    #[test]
    fn test_default_schedule_is_registered() {
        for id in DEFAULT_SCHEDULED {
            assert!(find(id).is_some(), "{} not registered", id);
        }
    }

    #[test]
    fn test_find_unknown_dataset() {
        assert!(find("parking_tickets").is_none());
    }

    #[test]
    fn test_taxi_trips_concatenates_two_feeds() {
        let schema = find("taxi_trips").unwrap();
        assert_eq!(schema.sources.len(), 2);
        assert_eq!(schema.enrichments.len(), 2);
        assert_eq!(schema.column_index("dropoff_zip_code"), Some(schema.fields.len() + 1));
    }

    #[test]
    fn test_building_permits_coordinates_use_zero_sentinel() {
        let schema = find("building_permits").unwrap();
        for column in ["latitude", "longitude"] {
            let field = schema.field(column).unwrap();
            assert!(field.zero_is_unset);
            assert_eq!(field.kind, FieldKind::Float);
        }
        assert!(!schema.field("xcoordinate").unwrap().zero_is_unset);
        assert_eq!(schema.field("permit_id").unwrap().source, "id");
    }

    #[test]
    fn test_community_health_only_requires_area_and_name() {
        let schema = find("community_health").unwrap();
        let required: Vec<_> = schema
            .fields
            .iter()
            .filter(|f| f.required)
            .map(|f| f.column)
            .collect();
        assert_eq!(required, vec!["community_area", "community_area_name"]);
        assert_eq!(schema.fields.len(), 29);
    }
}
