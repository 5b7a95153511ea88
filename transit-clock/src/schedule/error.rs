//! Schedule error types.

use chrono::NaiveDate;

use crate::domain::{StopId, TimeError};

/// Errors raised while loading or querying the static schedule.
///
/// Timezone and stop lookup failures are configuration errors: they are
/// raised at startup and abort it.
#[derive(Debug, thiserror::Error)]
pub enum ScheduleError {
    /// The GTFS archive could not be read
    #[error("failed to read static feed: {0}")]
    Gtfs(#[from] gtfs_structures::Error),

    /// More than one distinct agency timezone is declared
    #[error("static feed declares several timezones ({}), only one is supported", .0.join(", "))]
    MultipleTimezones(Vec<String>),

    /// No agency declares a timezone
    #[error("static feed declares no agency timezone")]
    NoTimezone,

    /// The declared timezone is not a known IANA name
    #[error("unknown timezone: {0}")]
    UnknownTimezone(String),

    /// The stop id does not exist in the static feed
    #[error("stop {0} not found in static feed")]
    StopNotFound(StopId),

    /// The stop exists but no trip calls there on the service day
    #[error("stop {stop} is not served by any trip on {date}")]
    StopNotServed { stop: StopId, date: NaiveDate },

    /// A stop time column other than departure or arrival was requested
    #[error("unknown stop time column: {0} (expected departure_time or arrival_time)")]
    UnknownColumn(String),

    /// A clock time could not be parsed or resolved
    #[error(transparent)]
    Time(#[from] TimeError),
}
