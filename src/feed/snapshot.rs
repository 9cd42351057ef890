use prost::Message;

use crate::gtfs_rt::feed_header::Incrementality;
use crate::gtfs_rt::{FeedEntity, FeedHeader, FeedMessage, OneBusAwayFeedHeader};

pub const GTFS_REALTIME_VERSION: &str = "2.0";

/// Header fields merged into every published message.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FeedHeaderDefaults {
    pub feed_version: Option<String>,
}

/// A published feed message: either the full dataset or a differential.
#[derive(Debug, Clone, PartialEq)]
pub struct FeedSnapshot {
    message: FeedMessage,
}

impl FeedSnapshot {
    pub(crate) fn build(
        incrementality: Incrementality,
        incremental_index: u64,
        heartbeat_interval: u32,
        timestamp: u64,
        defaults: &FeedHeaderDefaults,
        entity: Vec<FeedEntity>,
    ) -> Self {
        let mut header = FeedHeader {
            gtfs_realtime_version: GTFS_REALTIME_VERSION.to_string(),
            incrementality: None,
            timestamp: Some(timestamp),
            feed_version: defaults.feed_version.clone(),
            oba_feed_header: Some(OneBusAwayFeedHeader {
                incremental_index: Some(incremental_index),
                incremental_heartbeat_interval: Some(heartbeat_interval),
            }),
        };
        header.set_incrementality(incrementality);

        Self {
            message: FeedMessage { header, entity },
        }
    }

    pub fn message(&self) -> &FeedMessage {
        &self.message
    }

    pub fn entities(&self) -> &[FeedEntity] {
        &self.message.entity
    }

    pub fn is_full_dataset(&self) -> bool {
        self.message.header.incrementality() == Incrementality::FullDataset
    }

    pub fn incremental_index(&self) -> u64 {
        self.message
            .header
            .oba_feed_header
            .as_ref()
            .and_then(|h| h.incremental_index)
            .unwrap_or_default()
    }

    pub fn heartbeat_interval(&self) -> u32 {
        self.message
            .header
            .oba_feed_header
            .as_ref()
            .and_then(|h| h.incremental_heartbeat_interval)
            .unwrap_or_default()
    }

    /// Protobuf encoding of the message.
    pub fn to_bytes(&self) -> Vec<u8> {
        self.message.encode_to_vec()
    }
}
