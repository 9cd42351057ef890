//! Maps vehicle locations to GTFS-realtime vehicle positions.

use crate::gtfs_rt::vehicle_position::OccupancyStatus;
use crate::gtfs_rt::{Position, TripDescriptor, VehicleDescriptor, VehiclePosition};
use crate::telemetry::VehicleLocation;

/// Buckets a load ratio (passengers / capacity) into an occupancy status.
///
/// | Load ratio  | Status                     |
/// |-------------|----------------------------|
/// | <= 0        | EMPTY                      |
/// | <= 0.50     | MANY_SEATS_AVAILABLE       |
/// | <= 0.70     | FEW_SEATS_AVAILABLE        |
/// | <= 0.90     | STANDING_ROOM_ONLY         |
/// | <= 0.95     | CRUSHED_STANDING_ROOM_ONLY |
/// | > 0.95      | FULL                       |
pub fn occupancy_for(load_ratio: f64) -> OccupancyStatus {
    match load_ratio {
        r if r <= 0.0 => OccupancyStatus::Empty,
        r if r <= 0.50 => OccupancyStatus::ManySeatsAvailable,
        r if r <= 0.70 => OccupancyStatus::FewSeatsAvailable,
        r if r <= 0.90 => OccupancyStatus::StandingRoomOnly,
        r if r <= 0.95 => OccupancyStatus::CrushedStandingRoomOnly,
        _ => OccupancyStatus::Full,
    }
}

/// Stateless translation of one cycle's locations, in input order.
#[derive(Debug, Default, Clone, Copy)]
pub struct PositionTranslator;

impl PositionTranslator {
    pub fn translate(&self, locations: &[VehicleLocation]) -> Vec<VehiclePosition> {
        locations.iter().map(translate_one).collect()
    }
}

fn translate_one(loc: &VehicleLocation) -> VehiclePosition {
    let mut position = VehiclePosition {
        trip: Some(TripDescriptor {
            route_id: Some(loc.route.to_string()),
            ..Default::default()
        }),
        vehicle: Some(VehicleDescriptor {
            id: Some(loc.vehicle.to_string()),
            ..Default::default()
        }),
        position: Some(Position {
            latitude: loc.latitude as f32,
            longitude: loc.longitude as f32,
            bearing: loc.bearing,
            speed: loc.speed,
            odometer: None,
        }),
        timestamp: u64::try_from(loc.timestamp).ok(),
        ..Default::default()
    };

    if let Some(ratio) = loc.load_ratio {
        position.set_occupancy_status(occupancy_for(ratio));
    }
    position
}

#[cfg(test)]
mod tests {
    use super::*;

    fn location(load_ratio: Option<f64>) -> VehicleLocation {
        VehicleLocation {
            route: "A".into(),
            vehicle: "12".into(),
            latitude: 28.0587,
            longitude: -82.4139,
            bearing: Some(270.0),
            speed: Some(8.0),
            timestamp: 1396868400,
            load_ratio,
        }
    }

    #[test]
    fn test_occupancy_boundaries() {
        assert_eq!(occupancy_for(-0.1), OccupancyStatus::Empty);
        assert_eq!(occupancy_for(0.0), OccupancyStatus::Empty);
        assert_eq!(occupancy_for(0.01), OccupancyStatus::ManySeatsAvailable);
        assert_eq!(occupancy_for(0.50), OccupancyStatus::ManySeatsAvailable);
        assert_eq!(occupancy_for(0.51), OccupancyStatus::FewSeatsAvailable);
        assert_eq!(occupancy_for(0.70), OccupancyStatus::FewSeatsAvailable);
        assert_eq!(occupancy_for(0.90), OccupancyStatus::StandingRoomOnly);
        assert_eq!(occupancy_for(0.95), OccupancyStatus::CrushedStandingRoomOnly);
        assert_eq!(occupancy_for(0.96), OccupancyStatus::Full);
        assert_eq!(occupancy_for(1.4), OccupancyStatus::Full);
    }

    #[test]
    fn test_translate_fills_descriptors() {
        let positions = PositionTranslator.translate(&[location(Some(0.4))]);

        let vp = &positions[0];
        let trip = vp.trip.as_ref().unwrap();
        assert_eq!(trip.route_id.as_deref(), Some("A"));
        assert_eq!(trip.trip_id, None);
        assert_eq!(vp.vehicle.as_ref().unwrap().id.as_deref(), Some("12"));
        assert_eq!(vp.position.as_ref().unwrap().bearing, Some(270.0));
        assert_eq!(vp.timestamp, Some(1396868400));
        assert_eq!(vp.occupancy_status(), OccupancyStatus::ManySeatsAvailable);
    }

    #[test]
    fn test_missing_load_leaves_occupancy_unset() {
        let positions = PositionTranslator.translate(&[location(None)]);
        assert!(positions[0].occupancy_status.is_none());
    }
}
