use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::path::Path;
use tracing::{debug, info, warn};

use crate::errors::ProducerError;
use crate::ids::{RouteId, ServiceId, StopId, TripId};
use crate::schedule::calendar::ServiceCalendar;
use crate::schedule::table::StaticTable;
use crate::schedule::time::ScheduleTime;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RouteServiceKey {
    pub route: RouteId,
    pub service: ServiceId,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TripStopKey {
    pub trip: TripId,
    pub stop: StopId,
}

/// Lookup tables built once from the static GTFS and shared read-only.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScheduleIndex {
    trips: HashMap<RouteServiceKey, TripId>,
    stop_sequences: HashMap<TripStopKey, u32>,
    start_times: HashMap<TripId, ScheduleTime>,
    calendar: ServiceCalendar,
}

impl ScheduleIndex {
    /// Builds the index from the four GTFS tables.
    ///
    /// Trips per route/service and start times per trip take the last row
    /// for a key. Stop sequences keep the first row; a repeated
    /// `(trip, stop)` pair is reported since well-formed schedules never
    /// contain one.
    ///
    /// # Errors
    ///
    /// [`ProducerError::MalformedSchedule`] if a required column is absent or
    /// a row cannot be parsed.
    pub fn build_from_static_tables(
        trips: &StaticTable,
        calendar: &StaticTable,
        stop_times: &StaticTable,
        frequencies: &StaticTable,
    ) -> Result<Self, ProducerError> {
        let calendar = ServiceCalendar::from_table(calendar)?;

        let route_col = trips.column("route_id")?;
        let service_col = trips.column("service_id")?;
        let trip_col = trips.column("trip_id")?;

        let mut trip_map = HashMap::with_capacity(trips.len());
        for row in trips.rows() {
            let key = RouteServiceKey {
                route: RouteId::from(row.get(route_col)?),
                service: ServiceId::from(row.get(service_col)?),
            };
            let trip = TripId::from(row.get(trip_col)?);
            if let Some(replaced) = trip_map.insert(key, trip) {
                debug!(replaced = %replaced, "Later trip for route/service takes precedence");
            }
        }

        let trip_col = stop_times.column("trip_id")?;
        let stop_col = stop_times.column("stop_id")?;
        let seq_col = stop_times.column("stop_sequence")?;

        let mut stop_sequences = HashMap::with_capacity(stop_times.len());
        let mut conflicts = 0usize;
        for row in stop_times.rows() {
            let raw = row.get(seq_col)?;
            let sequence: u32 = raw
                .parse()
                .ok()
                .filter(|s| *s > 0)
                .ok_or_else(|| row.error(format!("stop_sequence must be a positive integer, got {raw:?}")))?;

            let key = TripStopKey {
                trip: TripId::from(row.get(trip_col)?),
                stop: StopId::from(row.get(stop_col)?),
            };
            match stop_sequences.entry(key) {
                Entry::Vacant(slot) => {
                    slot.insert(sequence);
                }
                Entry::Occupied(existing) => {
                    conflicts += 1;
                    warn!(
                        trip = %existing.key().trip,
                        stop = %existing.key().stop,
                        kept = *existing.get(),
                        ignored = sequence,
                        "Stop appears twice in trip"
                    );
                }
            }
        }

        let trip_col = frequencies.column("trip_id")?;
        let start_col = frequencies.column("start_time")?;

        let mut start_times = HashMap::with_capacity(frequencies.len());
        for row in frequencies.rows() {
            let raw = row.get(start_col)?;
            let start: ScheduleTime = raw.parse().map_err(|e: String| row.error(e))?;
            start_times.insert(TripId::from(row.get(trip_col)?), start);
        }

        info!(
            trips = trip_map.len(),
            stop_sequences = stop_sequences.len(),
            start_times = start_times.len(),
            services = calendar.len(),
            conflicts,
            "Schedule index built"
        );

        Ok(Self {
            trips: trip_map,
            stop_sequences,
            start_times,
            calendar,
        })
    }

    /// Loads `trips.txt`, `calendar.txt`, `stop_times.txt` and
    /// `frequencies.txt` from a GTFS directory.
    pub fn load_dir(dir: &Path) -> Result<Self, ProducerError> {
        let table = |file: &str| StaticTable::from_path(&dir.join(file));
        Self::build_from_static_tables(
            &table("trips.txt")?,
            &table("calendar.txt")?,
            &table("stop_times.txt")?,
            &table("frequencies.txt")?,
        )
    }

    pub fn trip_for(&self, route: &RouteId, service: &ServiceId) -> Option<&TripId> {
        self.trips.get(&RouteServiceKey {
            route: route.clone(),
            service: service.clone(),
        })
    }

    pub fn stop_sequence_for(&self, trip: &TripId, stop: &StopId) -> Option<u32> {
        self.stop_sequences
            .get(&TripStopKey {
                trip: trip.clone(),
                stop: stop.clone(),
            })
            .copied()
    }

    pub fn start_time_for(&self, trip: &TripId) -> Option<ScheduleTime> {
        self.start_times.get(trip).copied()
    }

    pub fn service_calendar(&self) -> &ServiceCalendar {
        &self.calendar
    }
}
