use serde::Deserialize;

use crate::aggregator::TripUpdateAggregate;
use crate::gtfs_rt::trip_update::{StopTimeEvent, StopTimeUpdate};
use crate::gtfs_rt::{FeedEntity, TripDescriptor, TripUpdate, VehicleDescriptor, VehiclePosition};

/// How entity ids are assigned when a cycle's output is published.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum EntityIdScheme {
    /// `1`, `2`, `3`, ... in emission order, renumbered every cycle.
    #[default]
    Sequential,
    /// Route, vehicle and trip segment, so the same vehicle keeps its id
    /// from one cycle to the next.
    NaturalKey,
}

impl EntityIdScheme {
    fn id(self, position: usize, natural: impl FnOnce() -> String) -> String {
        match self {
            EntityIdScheme::Sequential => (position + 1).to_string(),
            EntityIdScheme::NaturalKey => natural(),
        }
    }
}

pub fn trip_update_entities(
    aggregates: &[TripUpdateAggregate],
    scheme: EntityIdScheme,
) -> Vec<FeedEntity> {
    aggregates
        .iter()
        .enumerate()
        .map(|(i, agg)| FeedEntity {
            id: scheme.id(i, || format!("{}:{}:{}", agg.route, agg.vehicle, agg.segment)),
            trip_update: Some(trip_update(agg)),
            ..Default::default()
        })
        .collect()
}

fn trip_update(agg: &TripUpdateAggregate) -> TripUpdate {
    TripUpdate {
        trip: TripDescriptor {
            trip_id: Some(agg.trip.to_string()),
            route_id: Some(agg.route.to_string()),
            start_time: Some(agg.start_time.clone()),
            ..Default::default()
        },
        vehicle: Some(VehicleDescriptor {
            id: Some(agg.vehicle.to_string()),
            ..Default::default()
        }),
        stop_time_update: agg
            .stop_times
            .iter()
            .map(|st| StopTimeUpdate {
                stop_sequence: Some(st.sequence),
                stop_id: Some(st.stop.to_string()),
                arrival: Some(StopTimeEvent {
                    time: Some(st.arrival),
                    ..Default::default()
                }),
                ..Default::default()
            })
            .collect(),
        ..Default::default()
    }
}

pub fn vehicle_position_entities(
    positions: Vec<VehiclePosition>,
    scheme: EntityIdScheme,
) -> Vec<FeedEntity> {
    positions
        .into_iter()
        .enumerate()
        .map(|(i, vp)| FeedEntity {
            id: scheme.id(i, || {
                let route = vp.trip.as_ref().and_then(|t| t.route_id.as_deref());
                let vehicle = vp.vehicle.as_ref().and_then(|v| v.id.as_deref());
                format!("{}:{}", route.unwrap_or_default(), vehicle.unwrap_or_default())
            }),
            vehicle: Some(vp),
            ..Default::default()
        })
        .collect()
}
