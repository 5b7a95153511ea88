//! In-memory static feeds for tests.

use chrono::NaiveDate;

use crate::domain::{ClockTime, RouteId, StopId, TripId};

use super::feed::{Route, ServiceCalendar, StaticFeed, Stop, StopTime, Trip};

/// Builds a [`StaticFeed`] without touching the filesystem.
pub struct FeedBuilder {
    feed: StaticFeed,
}

impl FeedBuilder {
    pub fn new(timezone: &str) -> Self {
        Self {
            feed: StaticFeed {
                agency_timezones: vec![timezone.to_string()],
                ..StaticFeed::default()
            },
        }
    }

    pub fn stop(mut self, id: &str, name: &str) -> Self {
        self.feed.stops.insert(
            StopId::new(id),
            Stop {
                id: StopId::new(id),
                name: name.to_string(),
            },
        );
        self
    }

    pub fn route(mut self, id: &str, short_name: &str, long_name: &str) -> Self {
        self.feed.routes.insert(
            RouteId::new(id),
            Route {
                id: RouteId::new(id),
                short_name: short_name.to_string(),
                long_name: long_name.to_string(),
            },
        );
        self
    }

    /// A service running every day from 2020 to 2030.
    pub fn daily_service(self, service_id: &str) -> Self {
        self.service(service_id, [true; 7])
    }

    /// A service running Monday to Friday.
    pub fn weekday_service(self, service_id: &str) -> Self {
        self.service(service_id, [true, true, true, true, true, false, false])
    }

    /// A service running Saturday and Sunday.
    pub fn weekend_service(self, service_id: &str) -> Self {
        self.service(service_id, [false, false, false, false, false, true, true])
    }

    fn service(mut self, service_id: &str, weekdays: [bool; 7]) -> Self {
        self.feed.calendars.insert(
            service_id.to_string(),
            ServiceCalendar {
                weekdays,
                start_date: NaiveDate::from_ymd_opt(2020, 1, 1).unwrap(),
                end_date: NaiveDate::from_ymd_opt(2030, 12, 31).unwrap(),
            },
        );
        self
    }

    /// Add a trip whose arrival and departure times are equal at each stop.
    ///
    /// Stop sequences are assigned in slice order starting at 1.
    pub fn trip(
        mut self,
        id: &str,
        route_id: &str,
        service_id: &str,
        headsign: &str,
        calls: &[(&str, &str)],
    ) -> Self {
        let stop_times = calls
            .iter()
            .enumerate()
            .map(|(i, (stop, time))| {
                let time = ClockTime::parse(time).unwrap();
                StopTime {
                    stop_id: StopId::new(*stop),
                    stop_sequence: i as u32 + 1,
                    arrival: Some(time),
                    departure: Some(time),
                }
            })
            .collect();

        self.feed.trips.insert(
            TripId::new(id),
            Trip {
                id: TripId::new(id),
                route_id: RouteId::new(route_id),
                service_id: service_id.to_string(),
                headsign: headsign.to_string(),
                stop_times,
            },
        );
        self
    }

    pub fn build(self) -> StaticFeed {
        self.feed
    }
}
