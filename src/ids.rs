//! Opaque identifiers shared by the static schedule and live telemetry.
//!
//! Upstream systems are inconsistent about whether an id is a JSON number or
//! a string, so every id is stored as a string and deserializes from either.

use serde::de::{self, Deserializer, Visitor};
use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                deserializer.deserialize_any(LenientIdVisitor).map(Self)
            }
        }
    };
}

string_id!(
    /// A GTFS `route_id`.
    RouteId
);
string_id!(
    /// A GTFS `service_id` from `calendar.txt`.
    ServiceId
);
string_id!(
    /// A GTFS `trip_id`.
    TripId
);
string_id!(
    /// A GTFS `stop_id`.
    StopId
);
string_id!(
    /// The vendor's vehicle identifier.
    VehicleId
);

/// Accepts a string or an integer and yields its string form.
struct LenientIdVisitor;

impl<'de> Visitor<'de> for LenientIdVisitor {
    type Value = String;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("a string or integer identifier")
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<String, E> {
        Ok(v.trim().to_string())
    }

    fn visit_string<E: de::Error>(self, v: String) -> Result<String, E> {
        Ok(v.trim().to_string())
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<String, E> {
        Ok(v.to_string())
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<String, E> {
        Ok(v.to_string())
    }
}
