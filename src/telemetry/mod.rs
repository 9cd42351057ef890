//! Live telemetry: the per-cycle records the producer consumes and the
//! sources that supply them.

mod source;
pub mod syncromatics;

pub use source::{FileTelemetrySource, HttpTelemetrySource, source_from};

use async_trait::async_trait;

use crate::errors::ProducerError;
use crate::ids::{RouteId, StopId, VehicleId};

/// A predicted arrival of one vehicle at one stop.
#[derive(Debug, Clone, PartialEq)]
pub struct ArrivalPrediction {
    pub route: RouteId,
    pub vehicle: VehicleId,
    pub stop: StopId,
    /// Predicted arrival, epoch seconds.
    pub arrival: i64,
}

/// A reported vehicle location.
#[derive(Debug, Clone, PartialEq)]
pub struct VehicleLocation {
    pub route: RouteId,
    pub vehicle: VehicleId,
    pub latitude: f64,
    pub longitude: f64,
    pub bearing: Option<f32>,
    pub speed: Option<f32>,
    /// Epoch seconds of the fix.
    pub timestamp: i64,
    /// Passenger load as a fraction of capacity.
    pub load_ratio: Option<f64>,
}

/// Everything one poll of the vendor API returned.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TelemetryCycle {
    /// Server-side timestamp of the response, epoch seconds.
    pub response_timestamp: i64,
    pub predictions: Vec<ArrivalPrediction>,
    pub locations: Vec<VehicleLocation>,
}

/// Produces one [`TelemetryCycle`] per call.
#[async_trait]
pub trait TelemetrySource: Send + Sync {
    async fn poll(&self) -> Result<TelemetryCycle, ProducerError>;
}
