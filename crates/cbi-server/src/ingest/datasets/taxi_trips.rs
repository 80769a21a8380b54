//! Taxi and rideshare trips
//!
//! Two feeds (licensed taxis and transportation-network providers) share one
//! shape and are loaded into a single table. Both trip ends are reverse
//! geocoded to a ZIP code; a trip whose pickup or dropoff cannot be resolved
//! is dropped.

use crate::ingest::schema::{
    DatasetSchema, Enrichment, FieldKind, FieldSpec, SourceEndpoint, SODA_TIMESTAMP_MIN_LEN,
};

const TIMESTAMP: FieldKind = FieldKind::Timestamp {
    min_len: SODA_TIMESTAMP_MIN_LEN,
};

pub static SCHEMA: DatasetSchema = DatasetSchema {
    id: "taxi_trips",
    table: "taxi_trips",
    sources: &[
        SourceEndpoint {
            resource: "wrvz-psew",
            limit: 500,
            label: "Taxi Trips",
        },
        SourceEndpoint {
            resource: "m6dm-c72p",
            limit: 500,
            label: "Transportation Network Providers - Trips",
        },
    ],
    fields: &[
        FieldSpec::required("trip_id", "trip_id", FieldKind::Text),
        FieldSpec::required("trip_start_timestamp", "trip_start_timestamp", TIMESTAMP),
        FieldSpec::required("trip_end_timestamp", "trip_end_timestamp", TIMESTAMP),
        FieldSpec::required("pickup_centroid_latitude", "pickup_centroid_latitude", FieldKind::Float),
        FieldSpec::required("pickup_centroid_longitude", "pickup_centroid_longitude", FieldKind::Float),
        FieldSpec::required("dropoff_centroid_latitude", "dropoff_centroid_latitude", FieldKind::Float),
        FieldSpec::required("dropoff_centroid_longitude", "dropoff_centroid_longitude", FieldKind::Float),
    ],
    natural_key: &["trip_id"],
    enrichments: &[
        Enrichment {
            latitude: "pickup_centroid_latitude",
            longitude: "pickup_centroid_longitude",
            target: "pickup_zip_code",
        },
        Enrichment {
            latitude: "dropoff_centroid_latitude",
            longitude: "dropoff_centroid_longitude",
            target: "dropoff_zip_code",
        },
    ],
};
