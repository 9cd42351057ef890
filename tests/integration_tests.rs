use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use gtfs_rt_producer::aggregator::{AggregatorConfig, TripAggregator};
use gtfs_rt_producer::config::ProducerConfig;
use gtfs_rt_producer::errors::Diagnostic;
use gtfs_rt_producer::feed::{EntityIdScheme, FeedListener, FeedSnapshot, IncrementalFeedStore};
use gtfs_rt_producer::gtfs_rt::FeedEntity;
use gtfs_rt_producer::gtfs_rt::vehicle_position::OccupancyStatus;
use gtfs_rt_producer::ids::{RouteId, ServiceId, StopId, TripId, VehicleId};
use gtfs_rt_producer::output::FeedFileWriter;
use gtfs_rt_producer::parser::read_feed_file;
use gtfs_rt_producer::producer::Producer;
use gtfs_rt_producer::schedule::ScheduleIndex;
use gtfs_rt_producer::stats::FeedSummary;
use gtfs_rt_producer::telemetry::{ArrivalPrediction, FileTelemetrySource};

// 2014-04-07 07:00:00 America/New_York
const SEVEN_AM: i64 = 1396868400;

fn fixture(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests/fixtures")
        .join(name)
}

fn producer(config: &ProducerConfig) -> Producer {
    let index = ScheduleIndex::load_dir(&fixture("gtfs")).expect("fixture schedule loads");
    let source = FileTelemetrySource::new(fixture("predictions.json"));
    Producer::new(Arc::new(index), Box::new(source), config).unwrap()
}

#[test]
fn test_fixture_schedule_lookups() {
    let index = ScheduleIndex::load_dir(&fixture("gtfs")).unwrap();

    assert_eq!(
        index.trip_for(&RouteId::from("A"), &ServiceId::from("WK")),
        Some(&TripId::from("A1"))
    );
    assert_eq!(
        index.trip_for(&RouteId::from("A"), &ServiceId::from("SAT")),
        Some(&TripId::from("A2"))
    );
    assert_eq!(index.trip_for(&RouteId::from("B"), &ServiceId::from("SAT")), None);
    assert_eq!(
        index.stop_sequence_for(&TripId::from("A1"), &StopId::from("403")),
        Some(3)
    );
    assert_eq!(
        index.start_time_for(&TripId::from("B1")).map(|t| t.to_string()),
        Some("06:00:00".to_string())
    );
    assert_eq!(index.service_calendar().len(), 2);
}

#[tokio::test]
async fn test_full_pipeline() {
    let mut producer = producer(&ProducerConfig::default());

    let report = producer.run_cycle().await.unwrap();

    assert_eq!(report.trip_updates, 2);
    assert_eq!(report.vehicle_positions, 2);
    assert_eq!(report.trip_updates_index, 1);
    assert_eq!(report.diagnostics.len(), 2);
    assert!(report.diagnostics.iter().any(|d| matches!(
        d,
        Diagnostic::UnknownStop { stop, .. } if stop.as_str() == "599"
    )));
    assert!(report.diagnostics.iter().any(|d| matches!(
        d,
        Diagnostic::ScheduleMismatch { route, service: Some(_), .. } if route.as_str() == "C"
    )));

    let trip_updates = producer.trip_updates().current_snapshot();
    let ids: Vec<&str> = trip_updates.entities().iter().map(|e| e.id.as_str()).collect();
    assert_eq!(ids, vec!["1", "2"]);

    let a = trip_updates.entities()[0].trip_update.as_ref().unwrap();
    assert_eq!(a.trip.trip_id.as_deref(), Some("A1"));
    assert_eq!(a.trip.start_time.as_deref(), Some("07:00:00"));
    let sequences: Vec<Option<u32>> = a.stop_time_update.iter().map(|s| s.stop_sequence).collect();
    assert_eq!(sequences, vec![Some(1), Some(2)]);

    let b = trip_updates.entities()[1].trip_update.as_ref().unwrap();
    assert_eq!(b.trip.trip_id.as_deref(), Some("B1"));
    assert_eq!(b.trip.start_time.as_deref(), Some("07:01:00"));
    assert_eq!(b.stop_time_update[0].stop_id.as_deref(), Some("599"));
    assert_eq!(b.stop_time_update[0].stop_sequence, Some(0));

    let positions = producer.vehicle_positions().current_snapshot();
    let first = positions.entities()[0].vehicle.as_ref().unwrap();
    assert_eq!(first.occupancy_status(), OccupancyStatus::ManySeatsAvailable);
    assert_eq!(first.timestamp, Some(1396868385));
    // the vendor's internal trip number is not a GTFS trip id
    assert_eq!(first.trip.as_ref().unwrap().trip_id, None);
    assert!(positions.entities()[1].vehicle.as_ref().unwrap().occupancy_status.is_none());
}

#[tokio::test]
async fn test_natural_key_ids_are_stable_across_cycles() {
    let config = ProducerConfig {
        entity_ids: EntityIdScheme::NaturalKey,
        ..Default::default()
    };
    let mut producer = producer(&config);

    producer.run_cycle().await.unwrap();
    let first: Vec<String> = producer
        .trip_updates()
        .current_snapshot()
        .entities()
        .iter()
        .map(|e| e.id.clone())
        .collect();
    let report = producer.run_cycle().await.unwrap();
    let second: Vec<String> = producer
        .trip_updates()
        .current_snapshot()
        .entities()
        .iter()
        .map(|e| e.id.clone())
        .collect();

    assert_eq!(first, vec!["A:12:0", "B:20:0"]);
    assert_eq!(first, second);
    assert_eq!(report.trip_updates_index, 2);
}

#[tokio::test]
async fn test_written_feeds_decode() {
    let dir = tempfile::tempdir().unwrap();
    let config = ProducerConfig {
        // gzip content under the default .pb name still reads back
        trip_updates_path: dir.path().join("trip_updates.pb"),
        vehicle_positions_path: dir.path().join("vehicle_positions.pb"),
        gzip: true,
        feed_version: Some("fixture".to_string()),
        ..Default::default()
    };
    let mut producer = producer(&config);
    producer
        .trip_updates()
        .add_listener(Arc::new(FeedFileWriter::new(&config.trip_updates_path, true)));
    producer
        .vehicle_positions()
        .add_listener(Arc::new(FeedFileWriter::new(&config.vehicle_positions_path, false)));

    producer.run_cycle().await.unwrap();

    let feed = read_feed_file(&config.trip_updates_path).unwrap();
    let summary = FeedSummary::from_feed(&feed);
    assert!(summary.full_dataset);
    assert_eq!(summary.incremental_index, Some(1));
    assert_eq!(summary.heartbeat_interval, Some(60));
    assert_eq!(summary.trip_updates, 2);
    assert_eq!(summary.stop_time_updates, 4);
    assert_eq!(summary.unknown_stop_sequences, 1);
    assert_eq!(feed.header.feed_version.as_deref(), Some("fixture"));

    let feed = read_feed_file(&config.vehicle_positions_path).unwrap();
    let summary = FeedSummary::from_feed(&feed);
    assert_eq!(summary.vehicles, 2);
    assert_eq!(summary.with_occupancy, 1);
}

#[test]
fn test_backwards_arrivals_split_into_trip_instances() {
    let index = ScheduleIndex::load_dir(&fixture("gtfs")).unwrap();
    let mut aggregator = TripAggregator::new(AggregatorConfig::default());
    let prediction = |stop: &str, arrival: i64| ArrivalPrediction {
        route: RouteId::from("A"),
        vehicle: VehicleId::from("12"),
        stop: StopId::from(stop),
        arrival,
    };

    // 403 arrives before 402 and close to the response time: a new trip
    let output = aggregator.aggregate(
        &index,
        Some(&ServiceId::from("WK")),
        &[
            prediction("401", SEVEN_AM + 100),
            prediction("402", SEVEN_AM + 200),
            prediction("403", SEVEN_AM + 50),
        ],
        SEVEN_AM + 40,
    );

    let arrivals: Vec<Vec<i64>> = output
        .aggregates
        .iter()
        .map(|a| a.stop_times.iter().map(|s| s.arrival - SEVEN_AM).collect())
        .collect();
    assert_eq!(arrivals, vec![vec![100, 200], vec![50]]);
    assert_eq!(output.aggregates[0].start_time, "07:01:40");
    assert_eq!(output.aggregates[1].start_time, "0");
    assert_eq!(output.aggregates[1].segment, 1);
}

#[derive(Default)]
struct Recorder {
    full: Mutex<Vec<Vec<String>>>,
    differential: Mutex<Vec<Vec<String>>>,
}

fn ids(snapshot: &FeedSnapshot) -> Vec<String> {
    snapshot.entities().iter().map(|e| e.id.clone()).collect()
}

impl FeedListener for Recorder {
    fn on_full_update(&self, snapshot: &FeedSnapshot) {
        self.full.lock().unwrap().push(ids(snapshot));
    }

    fn on_differential_update(&self, delta: &FeedSnapshot) {
        self.differential.lock().unwrap().push(ids(delta));
    }
}

fn entity(id: &str) -> FeedEntity {
    FeedEntity {
        id: id.to_string(),
        ..Default::default()
    }
}

#[test]
fn test_listeners_follow_full_and_differential_updates() {
    let store = IncrementalFeedStore::new(30);
    let early = Arc::new(Recorder::default());
    store.add_listener(early.clone());

    let first = store.apply_full_update(vec![entity("A"), entity("B")]);
    let second = store.apply_differential_update(vec![entity("C")], vec!["A".to_string()]);
    assert!(second > first);

    let late = Arc::new(Recorder::default());
    store.add_listener(late.clone());

    assert_eq!(
        *early.full.lock().unwrap(),
        vec![Vec::<String>::new(), vec!["A".to_string(), "B".to_string()]]
    );
    assert_eq!(
        *early.differential.lock().unwrap(),
        vec![vec!["C".to_string(), "A".to_string()]]
    );
    assert_eq!(
        *late.full.lock().unwrap(),
        vec![vec!["B".to_string(), "C".to_string()]]
    );

    let snapshot = store.current_snapshot();
    assert_eq!(snapshot.incremental_index(), second);
    assert_eq!(snapshot.heartbeat_interval(), 30);
}
