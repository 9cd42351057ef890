//! The published GTFS-realtime feed: entity construction, the incremental
//! store that owns the current dataset, and the listener interface through
//! which it is handed out.

mod entity;
mod listener;
mod snapshot;
mod store;

pub use entity::{EntityIdScheme, trip_update_entities, vehicle_position_entities};
pub use listener::{FeedListener, ListenerId};
pub use snapshot::{FeedHeaderDefaults, FeedSnapshot, GTFS_REALTIME_VERSION};
pub use store::IncrementalFeedStore;
