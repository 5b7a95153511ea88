//! Domain types for the transit clock.
//!
//! Identifiers and clock-time arithmetic shared by the schedule index, the
//! real-time feeds and the leg estimator.

mod ids;
mod time;

pub use ids::{RouteId, StopId, TripId};
pub use time::{ClockTime, SERVICE_DAY_START_HOUR, TimeError, localize, service_day};
