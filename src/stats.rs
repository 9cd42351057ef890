use serde::Serialize;

use crate::gtfs_rt::FeedMessage;
use crate::gtfs_rt::feed_header::Incrementality;

/// Entity counts and header state of one feed message.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct FeedSummary {
    pub full_dataset: bool,
    pub incremental_index: Option<u64>,
    pub heartbeat_interval: Option<u32>,
    pub timestamp: Option<u64>,
    pub total_entities: usize,

    // entity types
    pub trip_updates: usize,
    pub vehicles: usize,
    pub deleted: usize,

    // trip update detail
    pub stop_time_updates: usize,
    pub unknown_stop_sequences: usize,
    pub with_start_time: usize,

    // vehicle detail
    pub with_occupancy: usize,
}

impl FeedSummary {
    pub fn from_feed(feed: &FeedMessage) -> Self {
        let oba = feed.header.oba_feed_header.as_ref();
        let mut s = FeedSummary {
            full_dataset: feed.header.incrementality() == Incrementality::FullDataset,
            incremental_index: oba.and_then(|h| h.incremental_index),
            heartbeat_interval: oba.and_then(|h| h.incremental_heartbeat_interval),
            timestamp: feed.header.timestamp,
            total_entities: feed.entity.len(),
            ..Default::default()
        };

        for e in &feed.entity {
            if e.is_deleted == Some(true) {
                s.deleted += 1;
            }

            if let Some(tu) = &e.trip_update {
                s.trip_updates += 1;
                s.stop_time_updates += tu.stop_time_update.len();
                s.unknown_stop_sequences += tu
                    .stop_time_update
                    .iter()
                    .filter(|st| st.stop_sequence == Some(0))
                    .count();

                if tu.trip.start_time.is_some() {
                    s.with_start_time += 1;
                }
            }

            if let Some(v) = &e.vehicle {
                s.vehicles += 1;

                if v.occupancy_status.is_some() {
                    s.with_occupancy += 1;
                }
            }
        }

        s
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gtfs_rt::trip_update::StopTimeUpdate;
    use crate::gtfs_rt::{FeedEntity, FeedHeader, OneBusAwayFeedHeader, TripUpdate, VehiclePosition};

    #[test]
    fn test_from_feed_empty() {
        let feed = FeedMessage {
            header: create_header(),
            entity: vec![],
        };
        let summary = FeedSummary::from_feed(&feed);

        assert_eq!(summary.total_entities, 0);
        assert!(summary.full_dataset);
        assert_eq!(summary.incremental_index, Some(4));
    }

    #[test]
    fn test_from_feed_counts_entities() {
        let feed = FeedMessage {
            header: create_header(),
            entity: vec![
                FeedEntity {
                    id: "1".to_string(),
                    trip_update: Some(TripUpdate {
                        stop_time_update: vec![
                            StopTimeUpdate {
                                stop_sequence: Some(0),
                                ..Default::default()
                            },
                            StopTimeUpdate {
                                stop_sequence: Some(3),
                                ..Default::default()
                            },
                        ],
                        ..Default::default()
                    }),
                    ..Default::default()
                },
                FeedEntity {
                    id: "2".to_string(),
                    vehicle: Some(VehiclePosition::default()),
                    ..Default::default()
                },
                FeedEntity {
                    id: "3".to_string(),
                    is_deleted: Some(true),
                    ..Default::default()
                },
            ],
        };

        let summary = FeedSummary::from_feed(&feed);

        assert_eq!(summary.total_entities, 3);
        assert_eq!(summary.trip_updates, 1);
        assert_eq!(summary.stop_time_updates, 2);
        assert_eq!(summary.unknown_stop_sequences, 1);
        assert_eq!(summary.with_start_time, 0);
        assert_eq!(summary.vehicles, 1);
        assert_eq!(summary.with_occupancy, 0);
        assert_eq!(summary.deleted, 1);
    }

    fn create_header() -> FeedHeader {
        FeedHeader {
            gtfs_realtime_version: "2.0".to_string(),
            timestamp: Some(1234567890),
            incrementality: None,
            feed_version: None,
            oba_feed_header: Some(OneBusAwayFeedHeader {
                incremental_index: Some(4),
                incremental_heartbeat_interval: Some(60),
            }),
        }
    }
}
