pub mod aggregator;
pub mod config;
pub mod errors;
pub mod feed;
pub mod fetch;
pub mod ids;
pub mod output;
pub mod parser;
pub mod positions;
pub mod producer;
pub mod schedule;
pub mod server;
pub mod stats;
pub mod telemetry;

pub mod gtfs_rt {
    include!(concat!(env!("OUT_DIR"), "/transit_realtime.rs"));
}
