use std::collections::HashMap;

use crate::ids::{RouteId, VehicleId};

/// Identifies one vehicle operating one route.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RouteVehicleKey {
    pub route: RouteId,
    pub vehicle: VehicleId,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct StartTimes {
    current: String,
    previous: Option<String>,
}

/// Start times remembered across cycles for each route/vehicle pair.
///
/// A vehicle that has not reported its first stop this cycle keeps the start
/// time it was last seen with. A segment split off the end of a trip belongs
/// to the trip before that, hence the second slot.
#[derive(Debug, Clone, Default)]
pub struct StartTimeMemory {
    entries: HashMap<RouteVehicleKey, StartTimes>,
}

impl StartTimeMemory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a freshly observed start time; the old current value moves to
    /// previous on every observation.
    pub fn record(&mut self, key: &RouteVehicleKey, start_time: String) {
        match self.entries.get_mut(key) {
            Some(times) => {
                let old = std::mem::replace(&mut times.current, start_time);
                times.previous = Some(old);
            }
            None => {
                self.entries.insert(
                    key.clone(),
                    StartTimes {
                        current: start_time,
                        previous: None,
                    },
                );
            }
        }
    }

    pub fn current(&self, key: &RouteVehicleKey) -> Option<&str> {
        self.entries.get(key).map(|t| t.current.as_str())
    }

    pub fn previous(&self, key: &RouteVehicleKey) -> Option<&str> {
        self.entries.get(key).and_then(|t| t.previous.as_deref())
    }

    /// Forgets everything; every vehicle is cold again.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
