//! Decoder for the Syncromatics prediction document.
//!
//! ```json
//! { "PredictionData": {
//!     "TimeStamp": "2014-04-07T07:00:00-04:00",
//!     "StopPredictions": [ { "route": "Route A", "stop": 401,
//!         "Ptimes": [ { "PredictionTime": "...", "VehicleId": "12" } ] } ],
//!     "VehicleLocationData": [ { "route": "Route A",
//!         "VehicleLocation": [ { "VehicleId": "12",
//!             "vehicleLat": 28.06, "vehicleLong": -82.41 } ] } ] } }
//! ```
//!
//! `PredictionData` is sometimes delivered as a JSON-encoded string rather
//! than an object; both are accepted.

use chrono::DateTime;
use serde::Deserialize;

use crate::errors::ProducerError;
use crate::ids::{RouteId, StopId, VehicleId};
use crate::telemetry::{ArrivalPrediction, TelemetryCycle, VehicleLocation};

const ROUTE_TITLE_PREFIX: &str = "Route ";

#[derive(Deserialize)]
struct Envelope {
    #[serde(rename = "PredictionData")]
    prediction_data: PredictionDataField,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum PredictionDataField {
    Inline(PredictionData),
    Encoded(String),
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct PredictionData {
    time_stamp: String,
    #[serde(default)]
    stop_predictions: Vec<StopPrediction>,
    #[serde(default)]
    vehicle_location_data: Vec<RouteVehicles>,
}

#[derive(Deserialize)]
struct StopPrediction {
    route: String,
    stop: StopId,
    #[serde(rename = "Ptimes", default)]
    ptimes: Vec<PredictedTime>,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct PredictedTime {
    prediction_time: String,
    vehicle_id: VehicleId,
}

#[derive(Deserialize)]
struct RouteVehicles {
    route: String,
    #[serde(rename = "VehicleLocation", default)]
    vehicle_location: Vec<RawLocation>,
}

#[derive(Deserialize)]
struct RawLocation {
    #[serde(rename = "VehicleId")]
    vehicle_id: VehicleId,
    #[serde(rename = "vehicleLat")]
    latitude: f64,
    #[serde(rename = "vehicleLong")]
    longitude: f64,
    #[serde(default)]
    heading: Option<f32>,
    #[serde(default)]
    speed: Option<f32>,
    #[serde(default)]
    updated: Option<String>,
    #[serde(rename = "APCPercentage", default)]
    apc_percentage: Option<f64>,
}

/// Decodes a prediction document into a [`TelemetryCycle`].
///
/// # Errors
///
/// [`ProducerError::UnexpectedUpstreamShape`] when the document does not have
/// the expected structure or carries values that cannot be interpreted.
pub fn parse_prediction_document(bytes: &[u8]) -> Result<TelemetryCycle, ProducerError> {
    let envelope: Envelope = serde_json::from_slice(bytes).map_err(shape)?;
    let data = match envelope.prediction_data {
        PredictionDataField::Inline(data) => data,
        PredictionDataField::Encoded(text) => serde_json::from_str(&text).map_err(shape)?,
    };

    let response_timestamp = parse_timestamp(&data.time_stamp)?;

    let mut predictions = Vec::new();
    for sp in data.stop_predictions {
        let route = route_from_title(&sp.route)?;
        for pt in sp.ptimes {
            predictions.push(ArrivalPrediction {
                route: route.clone(),
                vehicle: pt.vehicle_id,
                stop: sp.stop.clone(),
                arrival: parse_timestamp(&pt.prediction_time)?,
            });
        }
    }

    let mut locations = Vec::new();
    for rv in data.vehicle_location_data {
        let route = route_from_title(&rv.route)?;
        for raw in rv.vehicle_location {
            if !raw.latitude.is_finite() || !raw.longitude.is_finite() {
                return Err(ProducerError::UnexpectedUpstreamShape(format!(
                    "non-finite coordinates for vehicle {}",
                    raw.vehicle_id
                )));
            }
            let load_ratio = match raw.apc_percentage {
                Some(p) if !p.is_finite() || p < 0.0 => {
                    return Err(ProducerError::UnexpectedUpstreamShape(format!(
                        "APCPercentage {p} for vehicle {}",
                        raw.vehicle_id
                    )));
                }
                Some(p) => Some(p / 100.0),
                None => None,
            };
            let timestamp = match raw.updated.as_deref() {
                Some(ts) => parse_timestamp(ts)?,
                None => response_timestamp,
            };

            locations.push(VehicleLocation {
                route: route.clone(),
                vehicle: raw.vehicle_id,
                latitude: raw.latitude,
                longitude: raw.longitude,
                bearing: raw.heading,
                speed: raw.speed,
                timestamp,
                load_ratio,
            });
        }
    }

    Ok(TelemetryCycle {
        response_timestamp,
        predictions,
        locations,
    })
}

/// Parses the vendor's ISO-8601 timestamps into epoch seconds. The offset may
/// be written with or without a colon.
pub fn parse_timestamp(value: &str) -> Result<i64, ProducerError> {
    DateTime::parse_from_rfc3339(value)
        .or_else(|_| DateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%z"))
        .map(|dt| dt.timestamp())
        .map_err(|e| ProducerError::UnexpectedUpstreamShape(format!("timestamp {value:?}: {e}")))
}

fn route_from_title(title: &str) -> Result<RouteId, ProducerError> {
    let route = title.strip_prefix(ROUTE_TITLE_PREFIX).unwrap_or(title).trim();
    if route.is_empty() {
        return Err(ProducerError::UnexpectedUpstreamShape(format!(
            "route title {title:?}"
        )));
    }
    Ok(RouteId::from(route))
}

fn shape(e: serde_json::Error) -> ProducerError {
    ProducerError::UnexpectedUpstreamShape(e.to_string())
}
