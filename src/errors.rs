//! Error and diagnostic types.
//!
//! [`ProducerError`] covers failures that stop a cycle or the process.
//! [`Diagnostic`] covers per-vehicle findings that are logged and skipped.

use std::fmt;
use thiserror::Error;

use crate::ids::{RouteId, ServiceId, StopId, TripId, VehicleId};

#[derive(Debug, Error)]
pub enum ProducerError {
    /// Static reference data is missing a column or has an unparseable row.
    #[error("malformed schedule table {table}: {reason}")]
    MalformedSchedule { table: String, reason: String },

    /// Telemetry could not be retrieved this cycle.
    #[error("telemetry fetch failed: {0}")]
    FetchFailure(String),

    /// The vendor API returned something this producer cannot interpret.
    #[error("unexpected upstream shape: {0}")]
    UnexpectedUpstreamShape(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl ProducerError {
    pub(crate) fn malformed(table: &str, reason: impl Into<String>) -> Self {
        ProducerError::MalformedSchedule {
            table: table.to_string(),
            reason: reason.into(),
        }
    }

    /// True for errors that only invalidate the current refresh cycle.
    pub fn is_cycle_scoped(&self) -> bool {
        matches!(self, ProducerError::FetchFailure(_))
    }
}

impl From<reqwest::Error> for ProducerError {
    fn from(e: reqwest::Error) -> Self {
        ProducerError::FetchFailure(e.to_string())
    }
}

/// A recoverable finding raised while aggregating one cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Diagnostic {
    /// No trip is scheduled for the route under the active service.
    ScheduleMismatch {
        route: RouteId,
        vehicle: VehicleId,
        service: Option<ServiceId>,
    },
    /// The stop is not part of the resolved trip; sequence 0 was used.
    UnknownStop {
        route: RouteId,
        vehicle: VehicleId,
        trip: TripId,
        stop: StopId,
    },
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Diagnostic::ScheduleMismatch {
                route,
                vehicle,
                service,
            } => match service {
                Some(service) => write!(
                    f,
                    "no trip for route {route} under service {service} (vehicle {vehicle})"
                ),
                None => write!(f, "no active service for route {route} (vehicle {vehicle})"),
            },
            Diagnostic::UnknownStop {
                route,
                vehicle,
                trip,
                stop,
            } => write!(
                f,
                "stop {stop} not in trip {trip} (route {route}, vehicle {vehicle})"
            ),
        }
    }
}
