//! Static schedule lookups.
//!
//! [`ScheduleIndex`] answers the three questions the aggregator asks of the
//! GTFS: which trip a route runs under a service, where a stop falls in that
//! trip, and when the trip starts. [`ServiceCalendar`] resolves the service
//! running on a given date.

mod calendar;
mod index;
mod table;
mod time;

pub use calendar::ServiceCalendar;
pub use index::{RouteServiceKey, ScheduleIndex, TripStopKey};
pub use table::{Row, StaticTable};
pub use time::{ScheduleTime, local_clock_time};
