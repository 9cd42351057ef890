use chrono::{DateTime, TimeZone};
use chrono_tz::Tz;
use std::fmt;
use std::str::FromStr;

/// A GTFS service time, seconds past the start of the service day.
///
/// Values of 24:00:00 and beyond are legal for trips running past midnight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ScheduleTime(u32);

impl ScheduleTime {
    pub fn seconds(&self) -> u32 {
        self.0
    }
}

impl FromStr for ScheduleTime {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.trim().split(':').collect();
        let [h, m, sec] = parts.as_slice() else {
            return Err(format!("expected HH:MM:SS, got {s:?}"));
        };

        let parse = |v: &str| v.parse::<u32>().map_err(|_| format!("invalid time {s:?}"));
        let (h, m, sec) = (parse(h)?, parse(m)?, parse(sec)?);
        if m > 59 || sec > 59 {
            return Err(format!("invalid time {s:?}"));
        }

        h.checked_mul(3600)
            .and_then(|secs| secs.checked_add(m * 60 + sec))
            .map(Self)
            .ok_or_else(|| format!("time out of range {s:?}"))
    }
}

impl fmt::Display for ScheduleTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (h, m, s) = (self.0 / 3600, (self.0 / 60) % 60, self.0 % 60);
        write!(f, "{h:02}:{m:02}:{s:02}")
    }
}

/// Renders an epoch timestamp as local wall-clock "HH:MM:SS".
pub fn local_clock_time(epoch_seconds: i64, tz: Tz) -> Option<String> {
    let utc = DateTime::from_timestamp(epoch_seconds, 0)?;
    Some(tz.from_utc_datetime(&utc.naive_utc()).format("%H:%M:%S").to_string())
}
