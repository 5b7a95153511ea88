//! Static feed tables.
//!
//! The GTFS archive is read once with `gtfs-structures` and converted into
//! the subset of tables the schedule index needs. Keeping our own shapes
//! means the index can be built from in-memory data in tests.

use std::collections::{BTreeSet, HashMap};

use chrono::{Datelike, NaiveDate, Weekday};
use chrono_tz::Tz;
use gtfs_structures::{Exception, Gtfs};

use crate::domain::{ClockTime, RouteId, StopId, TripId};

use super::error::ScheduleError;

/// A stop from `stops.txt`.
#[derive(Debug, Clone)]
pub struct Stop {
    pub id: StopId,
    pub name: String,
}

/// A route from `routes.txt`.
#[derive(Debug, Clone)]
pub struct Route {
    pub id: RouteId,
    pub short_name: String,
    pub long_name: String,
}

/// One row of `stop_times.txt`.
#[derive(Debug, Clone)]
pub struct StopTime {
    pub stop_id: StopId,
    pub stop_sequence: u32,
    pub arrival: Option<ClockTime>,
    pub departure: Option<ClockTime>,
}

/// A trip from `trips.txt` with its stop times.
#[derive(Debug, Clone)]
pub struct Trip {
    pub id: TripId,
    pub route_id: RouteId,
    pub service_id: String,
    pub headsign: String,
    pub stop_times: Vec<StopTime>,
}

/// Weekly pattern and validity range from `calendar.txt`.
#[derive(Debug, Clone)]
pub struct ServiceCalendar {
    /// Monday first.
    pub weekdays: [bool; 7],
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

impl ServiceCalendar {
    /// Runs every day within the date range.
    pub fn daily(start_date: NaiveDate, end_date: NaiveDate) -> Self {
        Self {
            weekdays: [true; 7],
            start_date,
            end_date,
        }
    }

    pub fn runs_on(&self, date: NaiveDate) -> bool {
        date >= self.start_date
            && date <= self.end_date
            && self.weekdays[weekday_index(date.weekday())]
    }
}

/// An exception from `calendar_dates.txt`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceException {
    Added,
    Removed,
}

/// The static timetable tables used by the schedule index.
#[derive(Debug, Clone, Default)]
pub struct StaticFeed {
    /// `agency_timezone` of every agency, in file order.
    pub agency_timezones: Vec<String>,
    pub stops: HashMap<StopId, Stop>,
    pub routes: HashMap<RouteId, Route>,
    pub trips: HashMap<TripId, Trip>,
    pub calendars: HashMap<String, ServiceCalendar>,
    pub calendar_dates: HashMap<String, HashMap<NaiveDate, ServiceException>>,
}

impl StaticFeed {
    /// Read a GTFS archive (zip file or directory).
    pub fn read(path: &str) -> Result<Self, ScheduleError> {
        let gtfs = Gtfs::new(path)?;
        Ok(Self::from(&gtfs))
    }

    /// The single timezone declared by the feed's agencies.
    ///
    /// Feeds declaring several distinct timezones are rejected rather than
    /// guessed at.
    pub fn timezone(&self) -> Result<Tz, ScheduleError> {
        let distinct: BTreeSet<&str> = self
            .agency_timezones
            .iter()
            .map(|tz| tz.trim())
            .filter(|tz| !tz.is_empty())
            .collect();

        let mut iter = distinct.iter();
        match (iter.next(), iter.next()) {
            (None, _) => Err(ScheduleError::NoTimezone),
            (Some(name), None) => name
                .parse::<Tz>()
                .map_err(|_| ScheduleError::UnknownTimezone(name.to_string())),
            (Some(_), Some(_)) => Err(ScheduleError::MultipleTimezones(
                distinct.iter().map(|tz| tz.to_string()).collect(),
            )),
        }
    }

    /// Whether trips of `service_id` run on `date`.
    ///
    /// `calendar_dates.txt` exceptions take precedence over the weekly
    /// pattern of `calendar.txt`.
    pub fn runs_on(&self, service_id: &str, date: NaiveDate) -> bool {
        let exception = self
            .calendar_dates
            .get(service_id)
            .and_then(|dates| dates.get(&date));

        match exception {
            Some(ServiceException::Added) => true,
            Some(ServiceException::Removed) => false,
            None => self
                .calendars
                .get(service_id)
                .is_some_and(|c| c.runs_on(date)),
        }
    }
}

impl From<&Gtfs> for StaticFeed {
    fn from(gtfs: &Gtfs) -> Self {
        let agency_timezones = gtfs.agencies.iter().map(|a| a.timezone.clone()).collect();

        let stops = gtfs
            .stops
            .values()
            .map(|s| {
                let id = StopId::new(s.id.clone());
                let stop = Stop {
                    id: id.clone(),
                    name: s.name.clone().unwrap_or_default(),
                };
                (id, stop)
            })
            .collect();

        let routes = gtfs
            .routes
            .values()
            .map(|r| {
                let id = RouteId::new(r.id.clone());
                let route = Route {
                    id: id.clone(),
                    short_name: r.short_name.clone().unwrap_or_default(),
                    long_name: r.long_name.clone().unwrap_or_default(),
                };
                (id, route)
            })
            .collect();

        let trips = gtfs
            .trips
            .values()
            .map(|t| {
                let id = TripId::new(t.id.clone());
                let trip = Trip {
                    id: id.clone(),
                    route_id: RouteId::new(t.route_id.clone()),
                    service_id: t.service_id.clone(),
                    headsign: t.trip_headsign.clone().unwrap_or_default(),
                    stop_times: t
                        .stop_times
                        .iter()
                        .map(|st| StopTime {
                            stop_id: StopId::new(st.stop.id.clone()),
                            stop_sequence: u32::from(st.stop_sequence),
                            arrival: st.arrival_time.map(ClockTime::from_secs),
                            departure: st.departure_time.map(ClockTime::from_secs),
                        })
                        .collect(),
                };
                (id, trip)
            })
            .collect();

        let calendars = gtfs
            .calendar
            .values()
            .map(|c| {
                let calendar = ServiceCalendar {
                    weekdays: [
                        c.monday,
                        c.tuesday,
                        c.wednesday,
                        c.thursday,
                        c.friday,
                        c.saturday,
                        c.sunday,
                    ],
                    start_date: c.start_date,
                    end_date: c.end_date,
                };
                (c.id.clone(), calendar)
            })
            .collect();

        let calendar_dates = gtfs
            .calendar_dates
            .iter()
            .map(|(service_id, dates)| {
                let exceptions = dates
                    .iter()
                    .map(|cd| {
                        let kind = match cd.exception_type {
                            Exception::Added => ServiceException::Added,
                            Exception::Deleted => ServiceException::Removed,
                        };
                        (cd.date, kind)
                    })
                    .collect();
                (service_id.clone(), exceptions)
            })
            .collect();

        Self {
            agency_timezones,
            stops,
            routes,
            trips,
            calendars,
            calendar_dates,
        }
    }
}

/// Weekday index used by [`ServiceCalendar::weekdays`].
pub fn weekday_index(day: Weekday) -> usize {
    day.num_days_from_monday() as usize
}
