//! Static timetable loading and querying.
//!
//! The GTFS feed is read once at startup. Queries resolve stop times against
//! a service date, so trips running past midnight keep their "25:10:00"
//! style times and resolve onto the following calendar date.

mod error;
mod feed;
mod index;
mod table;

#[cfg(test)]
pub(crate) mod fixtures;

pub use error::ScheduleError;
pub use feed::{
    Route, ServiceCalendar, ServiceException, StaticFeed, Stop, StopTime, Trip, weekday_index,
};
pub use index::{MAX_CACHED_DATES, ScheduleIndex, StopEvent, StopInfo};
pub use table::{StopTimeColumn, StopTimeRow, StopTimesTable};
