use anyhow::{Context, Result};
use chrono_tz::Tz;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::aggregator::AggregatorConfig;
use crate::feed::{EntityIdScheme, FeedHeaderDefaults};

/// Runtime settings of the producer.
///
/// Stored as a JSON object on disk; every field is optional:
/// ```json
/// {
///   "source": "https://example.syncromatics.com/predictions",
///   "gtfs_dir": "gtfs",
///   "refresh_interval_secs": 30,
///   "entity_ids": "natural_key",
///   "gzip": true
/// }
/// ```
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ProducerConfig {
    /// Prediction endpoint URL or path to a local JSON document.
    pub source: Option<String>,
    pub api_key: Option<String>,
    pub gtfs_dir: PathBuf,
    pub refresh_interval_secs: u64,
    pub heartbeat_interval_secs: u32,
    pub late_correction_threshold_secs: i64,
    pub fetch_timeout_secs: u64,
    /// IANA zone of the agency.
    pub timezone: String,
    pub entity_ids: EntityIdScheme,
    pub trip_updates_path: PathBuf,
    pub vehicle_positions_path: PathBuf,
    /// When set, the trip updates feed is also served at this URL.
    pub trip_updates_url: Option<String>,
    pub vehicle_positions_url: Option<String>,
    pub gzip: bool,
    pub feed_version: Option<String>,
}

impl Default for ProducerConfig {
    fn default() -> Self {
        Self {
            source: None,
            api_key: None,
            gtfs_dir: PathBuf::from("gtfs"),
            refresh_interval_secs: 30,
            heartbeat_interval_secs: 60,
            late_correction_threshold_secs: 60,
            fetch_timeout_secs: 15,
            timezone: "America/New_York".to_string(),
            entity_ids: EntityIdScheme::Sequential,
            trip_updates_path: PathBuf::from("feeds/trip_updates.pb"),
            vehicle_positions_path: PathBuf::from("feeds/vehicle_positions.pb"),
            trip_updates_url: None,
            vehicle_positions_url: None,
            gzip: false,
            feed_version: None,
        }
    }
}

impl ProducerConfig {
    /// Loads the config from a JSON file at `path`.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        let config = serde_json::from_str(&content)
            .with_context(|| format!("parsing config {}", path.display()))?;
        Ok(config)
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_secs)
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }

    pub fn tz(&self) -> Result<Tz> {
        self.timezone
            .parse::<Tz>()
            .map_err(|e| anyhow::anyhow!("invalid timezone {:?}: {e}", self.timezone))
    }

    pub fn aggregator(&self) -> Result<AggregatorConfig> {
        Ok(AggregatorConfig {
            late_correction_threshold_secs: self.late_correction_threshold_secs,
            timezone: self.tz()?,
        })
    }

    pub fn header_defaults(&self) -> FeedHeaderDefaults {
        FeedHeaderDefaults {
            feed_version: self.feed_version.clone(),
        }
    }
}
