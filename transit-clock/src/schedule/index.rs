//! Service-day aware index over the static schedule.

use std::sync::Arc;

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use chrono_tz::Tz;
use moka::sync::Cache;
use serde::Serialize;
use tracing::{debug, info};

use crate::domain::{ClockTime, StopId, TripId, service_day};

use super::error::ScheduleError;
use super::feed::StaticFeed;
use super::table::{StopTimeColumn, StopTimesTable};

/// Maximum number of service dates kept materialized at once.
pub const MAX_CACHED_DATES: u64 = 50;

/// One scheduled visit of a trip at a stop, resolved to an instant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StopEvent {
    pub trip_id: TripId,
    pub stop_id: StopId,
    pub stop_sequence: u32,
    /// The service date the trip belongs to.
    pub service_date: NaiveDate,
    /// Scheduled time relative to the service date; may exceed 24h.
    pub scheduled: ClockTime,
    /// `service_date + scheduled`, in the feed timezone.
    pub at: DateTime<Tz>,
}

/// Descriptive attributes of a stop.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StopInfo {
    pub stop_name: String,
    pub route_long_name: String,
    pub trip_headsign: String,
    pub route_short_name: String,
}

/// Answers "what is the next scheduled event at this stop" questions.
///
/// Built once from the static feed. The service day active at load time is
/// materialized eagerly; other dates are built on first use and kept in a
/// bounded cache.
pub struct ScheduleIndex {
    feed: StaticFeed,
    tz: Tz,
    service_day: NaiveDate,
    active: Arc<StopTimesTable>,
    tables: Cache<NaiveDate, Arc<StopTimesTable>>,
}

impl ScheduleIndex {
    /// Load the GTFS archive at `path` and index it as of now.
    pub fn load(path: &str) -> Result<Self, ScheduleError> {
        let feed = StaticFeed::read(path)?;
        Self::new(feed, Utc::now())
    }

    /// Index `feed`, taking the active service day from `now`.
    pub fn new(feed: StaticFeed, now: DateTime<Utc>) -> Result<Self, ScheduleError> {
        let tz = feed.timezone()?;
        let service_day = service_day(&now.with_timezone(&tz));

        let active = Arc::new(StopTimesTable::build(&feed, service_day));
        let tables = Cache::builder().max_capacity(MAX_CACHED_DATES).build();
        tables.insert(service_day, active.clone());

        info!(
            timezone = %tz,
            service_day = %service_day,
            stops = feed.stops.len(),
            trips = feed.trips.len(),
            stop_times = active.len(),
            "static schedule indexed"
        );

        Ok(Self {
            feed,
            tz,
            service_day,
            active,
            tables,
        })
    }

    /// The feed's timezone.
    pub fn timezone(&self) -> Tz {
        self.tz
    }

    /// The service day that was active when the index was built.
    pub fn service_day(&self) -> NaiveDate {
        self.service_day
    }

    /// Number of dates currently materialized.
    pub fn cached_dates(&self) -> u64 {
        self.tables.run_pending_tasks();
        self.tables.entry_count()
    }

    fn table(&self, date: NaiveDate) -> Arc<StopTimesTable> {
        self.tables.get_with(date, || {
            debug!(%date, "materializing stop times");
            Arc::new(StopTimesTable::build(&self.feed, date))
        })
    }

    /// Whether some trip on the active service day calls at both stops.
    pub fn share_transit_line(&self, stop_a: &StopId, stop_b: &StopId) -> bool {
        let trips_a = self.active.trips_at(stop_a);
        self.active
            .rows_at(stop_b)
            .iter()
            .any(|row| trips_a.contains(&row.trip_id))
    }

    /// Stop name plus line and direction of a trip serving it.
    ///
    /// Tracked stops are assumed to belong to a single line. When a stop is
    /// served by several routes, the one with the lowest route id wins.
    pub fn stop_info(&self, stop_id: &StopId) -> Result<StopInfo, ScheduleError> {
        let stop = self
            .feed
            .stops
            .get(stop_id)
            .ok_or_else(|| ScheduleError::StopNotFound(stop_id.clone()))?;

        let (route, trip) = self
            .active
            .rows_at(stop_id)
            .iter()
            .filter_map(|row| self.feed.trips.get(&row.trip_id))
            .filter_map(|trip| Some((self.feed.routes.get(&trip.route_id)?, trip)))
            .min_by(|(ra, ta), (rb, tb)| (&ra.id, &ta.id).cmp(&(&rb.id, &tb.id)))
            .ok_or_else(|| ScheduleError::StopNotServed {
                stop: stop_id.clone(),
                date: self.service_day,
            })?;

        Ok(StopInfo {
            stop_name: stop.name.clone(),
            route_long_name: route.long_name.clone(),
            trip_headsign: trip.headsign.clone(),
            route_short_name: route.short_name.clone(),
        })
    }

    /// The next events at `stop_id` strictly after `timestamp`.
    ///
    /// The timestamp is converted to the feed timezone; its date selects the
    /// service day and its time of day is the lower bound. Results are
    /// ordered by scheduled time and truncated to `count` when given. An
    /// empty result means no more events on that service day.
    pub fn next_events<Z: TimeZone>(
        &self,
        stop_id: &StopId,
        column: StopTimeColumn,
        timestamp: &DateTime<Z>,
        trip_id: Option<&TripId>,
        count: Option<usize>,
    ) -> Result<Vec<StopEvent>, ScheduleError> {
        let local = timestamp.with_timezone(&self.tz);
        let date = local.date_naive();
        let after = ClockTime::of_day(local.time());
        let table = self.table(date);

        let mut rows: Vec<_> = table
            .rows_at(stop_id)
            .iter()
            .filter(|row| trip_id.is_none_or(|t| &row.trip_id == t))
            .filter_map(|row| Some((row, row.time(column)?)))
            .filter(|(_, time)| *time > after)
            .collect();
        rows.sort_by(|(ra, ta), (rb, tb)| (ta, &ra.trip_id).cmp(&(tb, &rb.trip_id)));

        let mut events = Vec::with_capacity(rows.len());
        for (row, time) in rows {
            if count.is_some_and(|n| events.len() >= n) {
                break;
            }
            let at = time.resolve(date, &self.tz)?;
            // DST fall-back can resolve an hour earlier than the raw clock
            if at <= local {
                continue;
            }
            events.push(StopEvent {
                trip_id: row.trip_id.clone(),
                stop_id: stop_id.clone(),
                stop_sequence: row.stop_sequence,
                service_date: date,
                scheduled: time,
                at,
            });
        }

        Ok(events)
    }

    /// The arrival at `stop_id` of the trip of `event`, later in the trip.
    ///
    /// Looks at the same service date as `event`, so trips running past
    /// midnight are followed correctly.
    pub fn arrival_after(
        &self,
        event: &StopEvent,
        stop_id: &StopId,
    ) -> Result<Option<StopEvent>, ScheduleError> {
        let table = self.table(event.service_date);

        let next = table
            .rows_at(stop_id)
            .iter()
            .filter(|row| row.trip_id == event.trip_id && row.stop_sequence > event.stop_sequence)
            .filter_map(|row| Some((row, row.arrival?)))
            .min_by_key(|(row, _)| row.stop_sequence);

        let Some((row, time)) = next else {
            return Ok(None);
        };

        Ok(Some(StopEvent {
            trip_id: row.trip_id.clone(),
            stop_id: stop_id.clone(),
            stop_sequence: row.stop_sequence,
            service_date: event.service_date,
            scheduled: time,
            at: time.resolve(event.service_date, &self.tz)?,
        }))
    }

    /// Resolve a GTFS "HH:MM:SS" time on `date` to an instant in the feed
    /// timezone. Hours of 24 and above land on following dates.
    pub fn resolve_clock_time(
        &self,
        date: NaiveDate,
        time: &str,
    ) -> Result<DateTime<Tz>, ScheduleError> {
        Ok(ClockTime::parse(time)?.resolve(date, &self.tz)?)
    }
}


#[cfg(test)]
mod proptests {
    use super::*;
    use crate::schedule::fixtures::FeedBuilder;
    use chrono::Duration;
    use proptest::prelude::*;

    fn dense_feed() -> StaticFeed {
        let calls: Vec<(String, String)> = (0..40)
            .map(|i| {
                let secs = 4 * 3600 + i * 37 * 60;
                ("1".to_string(), ClockTime::from_secs(secs).to_string())
            })
            .collect();

        let mut builder = FeedBuilder::new("Europe/Paris")
            .stop("1", "Only stop")
            .route("R", "L1", "Line 1")
            .daily_service("ALL");
        for (i, (stop, time)) in calls.iter().enumerate() {
            builder = builder.trip(&format!("T{i}"), "R", "ALL", "End", &[(stop.as_str(), time.as_str())]);
        }
        builder.build()
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        /// No event is ever at or before the query instant.
        #[test]
        fn events_are_strictly_after_query(minutes in 0i64..(60 * 24 * 3)) {
            let now = Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap();
            let index = ScheduleIndex::new(dense_feed(), now).unwrap();
            let query = now + Duration::minutes(minutes);

            let events = index
                .next_events(&StopId::new("1"), StopTimeColumn::Departure, &query, None, None)
                .unwrap();
            for event in events {
                prop_assert!(event.at > query);
            }
        }
    }
}
