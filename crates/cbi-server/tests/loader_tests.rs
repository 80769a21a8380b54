//! Full-refresh loader tests against in-memory collaborators

mod helpers;

use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

use cbi_server::ingest::datasets::{building_permits, community_health, taxi_trips};
use cbi_server::ingest::enrichment::UnconfiguredGeocoder;
use cbi_server::ingest::error::IngestError;
use cbi_server::ingest::loader::INSERT_REJECTED;
use cbi_server::ingest::{DatasetLoader, LoadStage, LoaderSettings};
use helpers::{
    address, community_area, denied, loader, permit, trip, MemorySink, ScriptedGeocoder,
    StaticSource,
};

const TAXI: &str = "wrvz-psew";
const TNP: &str = "m6dm-c72p";

#[tokio::test]
async fn test_taxi_trips_are_enriched_and_published() {
    let sink = MemorySink::new();
    let geocoder = ScriptedGeocoder::always("60606");
    let source = StaticSource::new()
        .with_rows(TAXI, vec![trip("a"), trip("b")])
        .with_rows(TNP, vec![trip("c")]);

    let outcome = loader(source, geocoder, sink.clone())
        .run(&taxi_trips::SCHEMA)
        .await;

    assert!(outcome.is_success(), "{:?}", outcome.error);
    assert_eq!(outcome.records_fetched, 3);
    assert_eq!(outcome.records_loaded, 3);
    assert_eq!(outcome.rejections.total(), 0);
    assert_eq!(outcome.failed_stage, None);

    assert_eq!(
        sink.column(&taxi_trips::SCHEMA, "taxi_trips", "pickup_zip_code"),
        vec!["60606"; 3]
    );
    assert_eq!(
        sink.column(&taxi_trips::SCHEMA, "taxi_trips", "dropoff_zip_code"),
        vec!["60606"; 3]
    );
    assert!(!sink.has_table("taxi_trips__staging"));
}

#[tokio::test]
async fn test_blank_required_field_drops_only_that_record() {
    let sink = MemorySink::new();
    let source = StaticSource::new().with_rows(TAXI, vec![trip("a"), trip(""), trip("  "), trip("d")]);

    let outcome = loader(source, ScriptedGeocoder::always("60606"), sink.clone())
        .run(&taxi_trips::SCHEMA)
        .await;

    assert!(outcome.is_success());
    assert_eq!(outcome.records_fetched, 4);
    assert_eq!(outcome.records_loaded, 2);
    assert_eq!(outcome.rejections.get("required"), 2);
    assert_eq!(
        sink.column(&taxi_trips::SCHEMA, "taxi_trips", "trip_id"),
        vec!["a", "d"]
    );
}

#[tokio::test]
async fn test_short_timestamp_is_rejected() {
    let mut short = trip("short");
    short["trip_start_timestamp"] = Value::from("2024-01-31T23:45:00");

    let sink = MemorySink::new();
    let source = StaticSource::new().with_rows(TAXI, vec![short, trip("ok")]);

    let outcome = loader(source, ScriptedGeocoder::always("60606"), sink.clone())
        .run(&taxi_trips::SCHEMA)
        .await;

    assert_eq!(outcome.records_loaded, 1);
    assert_eq!(outcome.rejections.get("timestamp_length"), 1);
}

#[tokio::test]
async fn test_zero_permit_coordinate_is_rejected() {
    let mut unmapped = permit("2");
    unmapped["latitude"] = Value::from(0);

    let sink = MemorySink::new();
    let source = StaticSource::new().with_rows("building-permits", vec![permit("1"), unmapped]);

    let outcome = loader(source, Arc::new(UnconfiguredGeocoder), sink.clone())
        .run(&building_permits::SCHEMA)
        .await;

    assert!(outcome.is_success());
    assert_eq!(outcome.records_loaded, 1);
    assert_eq!(outcome.rejections.get("nonzero_sentinel"), 1);
    assert_eq!(
        sink.column(&building_permits::SCHEMA, "building_permits", "permit_id"),
        vec!["1"]
    );
    assert_eq!(
        sink.column(&building_permits::SCHEMA, "building_permits", "permit_code"),
        vec!["1001"]
    );
}

#[tokio::test]
async fn test_failed_dropoff_lookup_drops_the_trip() {
    let sink = MemorySink::new();
    // Pickups sit south of 41.89, dropoffs north of it.
    let geocoder = ScriptedGeocoder::new(|location| {
        if location.latitude > 41.89 {
            Err(denied())
        } else {
            Ok(vec![address(Some("60606"))])
        }
    });
    let source = StaticSource::new().with_rows(TAXI, vec![trip("a")]);

    let outcome = loader(source, geocoder, sink.clone())
        .run(&taxi_trips::SCHEMA)
        .await;

    assert!(outcome.is_success());
    assert_eq!(outcome.records_loaded, 0);
    assert_eq!(outcome.rejections.get("geocode_failed"), 1);
    // An empty refresh still publishes an empty table.
    assert_eq!(sink.table("taxi_trips").map(|t| t.rows.len()), Some(0));
}

#[tokio::test]
async fn test_geocoder_without_postal_code_or_results() {
    let sink = MemorySink::new();
    let geocoder = ScriptedGeocoder::new(|location| {
        if location.latitude < 41.89 {
            Ok(Vec::new())
        } else {
            Ok(vec![address(None)])
        }
    });
    let mut no_code = trip("b");
    no_code["pickup_centroid_latitude"] = Value::from("41.95");

    let source = StaticSource::new().with_rows(TAXI, vec![trip("a"), no_code]);
    let outcome = loader(source, geocoder, sink.clone())
        .run(&taxi_trips::SCHEMA)
        .await;

    assert_eq!(outcome.records_loaded, 0);
    assert_eq!(outcome.rejections.get("no_geocode_result"), 1);
    assert_eq!(outcome.rejections.get("no_postal_code"), 1);
}

#[tokio::test]
async fn test_unenriched_dataset_never_calls_geocoder() {
    let sink = MemorySink::new();
    let geocoder = ScriptedGeocoder::always("60606");
    let source = StaticSource::new().with_rows(
        "iqnk-2tcu",
        vec![community_area("1", "Rogers Park"), community_area("2", "West Ridge")],
    );

    let outcome = loader(source, geocoder.clone(), sink.clone())
        .run(&community_health::SCHEMA)
        .await;

    assert!(outcome.is_success());
    assert_eq!(outcome.records_loaded, 2);
    assert_eq!(geocoder.calls(), 0);
    assert!(sink.has_table("community_area_unemployment"));
}

#[tokio::test]
async fn test_rerun_replaces_table_contents() {
    let sink = MemorySink::new();
    let rows = vec![trip("a"), trip("b")];

    for _ in 0..2 {
        let source = StaticSource::new().with_rows(TAXI, rows.clone());
        let outcome = loader(source, ScriptedGeocoder::always("60606"), sink.clone())
            .run(&taxi_trips::SCHEMA)
            .await;
        assert!(outcome.is_success());
    }

    assert_eq!(sink.publishes(), 2);
    assert_eq!(
        sink.column(&taxi_trips::SCHEMA, "taxi_trips", "trip_id"),
        vec!["a", "b"]
    );

    let source = StaticSource::new().with_rows(TAXI, vec![trip("z")]);
    loader(source, ScriptedGeocoder::always("60606"), sink.clone())
        .run(&taxi_trips::SCHEMA)
        .await;

    assert_eq!(
        sink.column(&taxi_trips::SCHEMA, "taxi_trips", "trip_id"),
        vec!["z"]
    );
}

#[tokio::test]
async fn test_duplicate_natural_key_across_feeds() {
    let sink = MemorySink::new();
    let source = StaticSource::new()
        .with_rows(TAXI, vec![trip("a"), trip("b")])
        .with_rows(TNP, vec![trip("a")]);

    let outcome = loader(source, ScriptedGeocoder::always("60606"), sink.clone())
        .run(&taxi_trips::SCHEMA)
        .await;

    assert!(outcome.is_success());
    assert_eq!(outcome.records_fetched, 3);
    assert_eq!(outcome.records_loaded, 2);
    assert_eq!(outcome.rejections.get(INSERT_REJECTED), 1);
}

#[tokio::test]
async fn test_fatal_insert_keeps_previous_table() {
    let sink = MemorySink::new();
    let source = || StaticSource::new().with_rows(TAXI, vec![trip("a")]);

    let first = loader(source(), ScriptedGeocoder::always("60606"), sink.clone())
        .run(&taxi_trips::SCHEMA)
        .await;
    assert!(first.is_success());

    sink.fail_inserts(true);
    let second = loader(source(), ScriptedGeocoder::always("60606"), sink.clone())
        .run(&taxi_trips::SCHEMA)
        .await;

    assert!(!second.is_success());
    assert_eq!(second.failed_stage, Some(LoadStage::Load));
    assert_eq!(second.error.as_ref().map(IngestError::kind), Some("load"));
    assert_eq!(sink.publishes(), 1);
    assert!(!sink.has_table("taxi_trips__staging"));
    assert_eq!(
        sink.column(&taxi_trips::SCHEMA, "taxi_trips", "trip_id"),
        vec!["a"]
    );
}

#[tokio::test]
async fn test_schema_reset_failure() {
    let sink = MemorySink::new();
    sink.fail_reset(true);
    let source = StaticSource::new().with_rows(TAXI, vec![trip("a")]);

    let outcome = loader(source, ScriptedGeocoder::always("60606"), sink.clone())
        .run(&taxi_trips::SCHEMA)
        .await;

    assert_eq!(outcome.failed_stage, Some(LoadStage::SchemaReset));
    assert_eq!(outcome.error.as_ref().map(IngestError::kind), Some("schema"));
    assert_eq!(outcome.records_fetched, 0);
    assert!(!sink.has_table("taxi_trips"));
}

#[tokio::test]
async fn test_fetch_failure_discards_staging() {
    let sink = MemorySink::new();
    let source = StaticSource::new()
        .with_rows(TAXI, vec![trip("a")])
        .broken(TNP);

    let outcome = loader(source, ScriptedGeocoder::always("60606"), sink.clone())
        .run(&taxi_trips::SCHEMA)
        .await;

    assert_eq!(outcome.failed_stage, Some(LoadStage::Fetch));
    assert!(matches!(outcome.error, Some(IngestError::MalformedBody { .. })));
    assert!(!sink.has_table("taxi_trips__staging"));
    assert!(!sink.has_table("taxi_trips"));

    let summary = outcome.summary();
    assert!(!summary.succeeded);
    assert!(summary.error.is_some());
}

#[tokio::test(start_paused = true)]
async fn test_run_timeout_aborts_in_current_stage() {
    let sink = MemorySink::new();
    let source = StaticSource::new()
        .with_rows(TAXI, vec![trip("a")])
        .with_delay(Duration::from_secs(60));
    let settings = LoaderSettings {
        run_timeout: Some(Duration::from_secs(5)),
        ..LoaderSettings::default()
    };

    let loader = DatasetLoader::new(
        Arc::new(source),
        ScriptedGeocoder::always("60606"),
        sink.clone(),
        settings,
    );
    let outcome = loader.run(&taxi_trips::SCHEMA).await;

    assert_eq!(outcome.failed_stage, Some(LoadStage::Fetch));
    assert!(matches!(outcome.error, Some(IngestError::Timeout(d)) if d == Duration::from_secs(5)));
    assert!(!sink.has_table("taxi_trips__staging"));
}

#[tokio::test]
async fn test_source_order_and_memoised_lookups() {
    let sink = MemorySink::new();
    let geocoder = ScriptedGeocoder::always("60611");
    let ids = ["q", "c", "x", "a", "m", "b"];
    let source = StaticSource::new().with_rows(TAXI, ids.iter().map(|id| trip(id)).collect());
    let settings = LoaderSettings {
        enrichment_concurrency: 1,
        ..LoaderSettings::default()
    };

    let outcome = DatasetLoader::new(Arc::new(source), geocoder.clone(), sink.clone(), settings)
        .run(&taxi_trips::SCHEMA)
        .await;

    assert_eq!(outcome.records_loaded, ids.len());
    assert_eq!(sink.column(&taxi_trips::SCHEMA, "taxi_trips", "trip_id"), ids);
    // One pickup and one dropoff location shared by every trip.
    assert_eq!(geocoder.calls(), 2);
}

#[tokio::test]
async fn test_concurrent_enrichment_keeps_source_order() {
    let sink = MemorySink::new();
    let ids: Vec<String> = (0..40).map(|i| format!("trip-{:02}", 39 - i)).collect();
    let rows = ids
        .iter()
        .enumerate()
        .map(|(i, id)| {
            let mut row = trip(id);
            row["pickup_centroid_latitude"] = Value::from(format!("41.{:03}", 700 + i));
            row
        })
        .collect();
    let settings = LoaderSettings {
        enrichment_concurrency: 8,
        ..LoaderSettings::default()
    };

    let outcome = DatasetLoader::new(
        Arc::new(StaticSource::new().with_rows(TAXI, rows)),
        ScriptedGeocoder::always("60611"),
        sink.clone(),
        settings,
    )
    .run(&taxi_trips::SCHEMA)
    .await;

    assert_eq!(outcome.records_loaded, 40);
    assert_eq!(sink.column(&taxi_trips::SCHEMA, "taxi_trips", "trip_id"), ids);
}
