//! Turns a cycle of raw arrival predictions into per-vehicle trip updates.
//!
//! Predictions are grouped by route and vehicle, placed on the scheduled trip
//! for the active service, ordered by stop sequence, and cut into separate
//! trip instances wherever the predicted arrivals run backwards.

mod split;
mod start_time;

pub use start_time::{RouteVehicleKey, StartTimeMemory};

use chrono_tz::Tz;
use std::collections::HashMap;
use tracing::{debug, info, warn};

use crate::errors::Diagnostic;
use crate::ids::{RouteId, ServiceId, StopId, TripId, VehicleId};
use crate::schedule::{ScheduleIndex, local_clock_time};
use crate::telemetry::ArrivalPrediction;
use split::split_segments;

/// Start time published for a vehicle that has never reported its first stop.
pub const COLD_START_TIME: &str = "0";

/// Stop sequence used when a stop is not found in the resolved trip.
pub const UNKNOWN_STOP_SEQUENCE: u32 = 0;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StopTimeEntry {
    pub stop: StopId,
    pub sequence: u32,
    /// Predicted arrival, epoch seconds.
    pub arrival: i64,
}

/// One trip instance of one vehicle, ready to become a trip update entity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TripUpdateAggregate {
    pub route: RouteId,
    pub vehicle: VehicleId,
    pub trip: TripId,
    pub start_time: String,
    /// Position of this instance among those split from the same vehicle's
    /// predictions this cycle, starting at 0.
    pub segment: usize,
    pub stop_times: Vec<StopTimeEntry>,
}

#[derive(Debug, Clone)]
pub struct AggregatorConfig {
    /// How far past the response timestamp a backwards arrival must lie to be
    /// taken as a correction instead of a new trip. Compared with `>`.
    pub late_correction_threshold_secs: i64,
    /// Zone used to render start times as local wall-clock time.
    pub timezone: Tz,
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        Self {
            late_correction_threshold_secs: 60,
            timezone: chrono_tz::America::New_York,
        }
    }
}

#[derive(Debug, Default)]
pub struct AggregationOutput {
    pub aggregates: Vec<TripUpdateAggregate>,
    pub diagnostics: Vec<Diagnostic>,
}

pub struct TripAggregator {
    config: AggregatorConfig,
    memory: StartTimeMemory,
}

impl TripAggregator {
    pub fn new(config: AggregatorConfig) -> Self {
        Self {
            config,
            memory: StartTimeMemory::new(),
        }
    }

    pub fn start_times(&self) -> &StartTimeMemory {
        &self.memory
    }

    /// Aggregates one cycle.
    ///
    /// `service` is the service running today; `None` means nothing is
    /// scheduled and every group is reported as a mismatch. An empty
    /// prediction list is a service gap and clears the start-time memory.
    pub fn aggregate(
        &mut self,
        index: &ScheduleIndex,
        service: Option<&ServiceId>,
        predictions: &[ArrivalPrediction],
        response_timestamp: i64,
    ) -> AggregationOutput {
        let mut output = AggregationOutput::default();

        if predictions.is_empty() {
            if !self.memory.is_empty() {
                info!(
                    forgotten = self.memory.len(),
                    "No predictions this cycle, clearing start times"
                );
            }
            self.memory.clear();
            return output;
        }

        for (key, group) in group_by_vehicle(predictions) {
            let Some(trip) = service.and_then(|s| index.trip_for(&key.route, s)) else {
                let diagnostic = Diagnostic::ScheduleMismatch {
                    route: key.route.clone(),
                    vehicle: key.vehicle.clone(),
                    service: service.cloned(),
                };
                warn!(route = %key.route, vehicle = %key.vehicle, "{diagnostic}");
                output.diagnostics.push(diagnostic);
                continue;
            };

            let mut entries: Vec<StopTimeEntry> = group
                .iter()
                .map(|p| {
                    let sequence = index.stop_sequence_for(trip, &p.stop).unwrap_or_else(|| {
                        let diagnostic = Diagnostic::UnknownStop {
                            route: key.route.clone(),
                            vehicle: key.vehicle.clone(),
                            trip: trip.clone(),
                            stop: p.stop.clone(),
                        };
                        warn!(trip = %trip, stop = %p.stop, "{diagnostic}");
                        output.diagnostics.push(diagnostic);
                        UNKNOWN_STOP_SEQUENCE
                    });
                    StopTimeEntry {
                        stop: p.stop.clone(),
                        sequence,
                        arrival: p.arrival,
                    }
                })
                .collect();

            // stable, so equal sequences stay in discovery order
            entries.sort_by_key(|e| e.sequence);

            let start_time = self.resolve_start_time(&key, &entries);
            let previous_start_time = self
                .memory
                .previous(&key)
                .unwrap_or(COLD_START_TIME)
                .to_string();

            let segments = split_segments(
                entries,
                response_timestamp,
                self.config.late_correction_threshold_secs,
            );
            if segments.len() > 1 {
                debug!(
                    route = %key.route,
                    vehicle = %key.vehicle,
                    segments = segments.len(),
                    "Predictions split into several trip instances"
                );
            }

            for (segment, stop_times) in segments.into_iter().enumerate() {
                output.aggregates.push(TripUpdateAggregate {
                    route: key.route.clone(),
                    vehicle: key.vehicle.clone(),
                    trip: trip.clone(),
                    start_time: if segment == 0 {
                        start_time.clone()
                    } else {
                        previous_start_time.clone()
                    },
                    segment,
                    stop_times,
                });
            }
        }

        info!(
            predictions = predictions.len(),
            aggregates = output.aggregates.len(),
            diagnostics = output.diagnostics.len(),
            "Trip updates aggregated"
        );
        output
    }

    /// The first stop's predicted arrival is the start time; without one the
    /// remembered start time stands in.
    fn resolve_start_time(&mut self, key: &RouteVehicleKey, entries: &[StopTimeEntry]) -> String {
        let observed = entries
            .iter()
            .find(|e| e.sequence == 1)
            .and_then(|e| local_clock_time(e.arrival, self.config.timezone));

        match observed {
            Some(start_time) => {
                self.memory.record(key, start_time.clone());
                start_time
            }
            None => self
                .memory
                .current(key)
                .unwrap_or(COLD_START_TIME)
                .to_string(),
        }
    }
}

/// Groups predictions by route and vehicle, keeping first-seen order for both
/// the groups and the predictions inside them.
fn group_by_vehicle(
    predictions: &[ArrivalPrediction],
) -> Vec<(RouteVehicleKey, Vec<&ArrivalPrediction>)> {
    let mut groups: Vec<(RouteVehicleKey, Vec<&ArrivalPrediction>)> = Vec::new();
    let mut positions: HashMap<RouteVehicleKey, usize> = HashMap::new();

    for p in predictions {
        let key = RouteVehicleKey {
            route: p.route.clone(),
            vehicle: p.vehicle.clone(),
        };
        let slot = *positions.entry(key.clone()).or_insert_with(|| {
            groups.push((key, Vec::new()));
            groups.len() - 1
        });
        groups[slot].1.push(p);
    }

    groups
}
