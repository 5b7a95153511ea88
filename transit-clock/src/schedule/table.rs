//! Per-date stop time tables.

use std::collections::{HashMap, HashSet};
use std::str::FromStr;

use chrono::NaiveDate;

use crate::domain::{ClockTime, StopId, TripId};

use super::error::ScheduleError;
use super::feed::StaticFeed;

/// Which scheduled time of a stop time row to query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StopTimeColumn {
    Departure,
    Arrival,
}

impl StopTimeColumn {
    pub fn as_str(&self) -> &'static str {
        match self {
            StopTimeColumn::Departure => "departure_time",
            StopTimeColumn::Arrival => "arrival_time",
        }
    }
}

impl FromStr for StopTimeColumn {
    type Err = ScheduleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "departure_time" => Ok(StopTimeColumn::Departure),
            "arrival_time" => Ok(StopTimeColumn::Arrival),
            other => Err(ScheduleError::UnknownColumn(other.to_string())),
        }
    }
}

/// A stop time row of a trip running on the table's date.
#[derive(Debug, Clone)]
pub struct StopTimeRow {
    pub trip_id: TripId,
    pub stop_sequence: u32,
    pub arrival: Option<ClockTime>,
    pub departure: Option<ClockTime>,
}

impl StopTimeRow {
    pub fn time(&self, column: StopTimeColumn) -> Option<ClockTime> {
        match column {
            StopTimeColumn::Departure => self.departure,
            StopTimeColumn::Arrival => self.arrival,
        }
    }
}

/// The stop times of every trip running on one service date, grouped by
/// stop.
#[derive(Debug)]
pub struct StopTimesTable {
    date: NaiveDate,
    by_stop: HashMap<StopId, Vec<StopTimeRow>>,
}

impl StopTimesTable {
    /// Materialize the table for `date`.
    pub fn build(feed: &StaticFeed, date: NaiveDate) -> Self {
        let mut by_stop: HashMap<StopId, Vec<StopTimeRow>> = HashMap::new();

        for trip in feed.trips.values() {
            if !feed.runs_on(&trip.service_id, date) {
                continue;
            }
            for st in &trip.stop_times {
                by_stop
                    .entry(st.stop_id.clone())
                    .or_default()
                    .push(StopTimeRow {
                        trip_id: trip.id.clone(),
                        stop_sequence: st.stop_sequence,
                        arrival: st.arrival,
                        departure: st.departure,
                    });
            }
        }

        Self { date, by_stop }
    }

    pub fn date(&self) -> NaiveDate {
        self.date
    }

    /// All rows at `stop`, in no particular order.
    pub fn rows_at(&self, stop: &StopId) -> &[StopTimeRow] {
        self.by_stop.get(stop).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Ids of the trips calling at `stop`.
    pub fn trips_at(&self, stop: &StopId) -> HashSet<&TripId> {
        self.rows_at(stop).iter().map(|row| &row.trip_id).collect()
    }

    /// Number of rows in the table.
    pub fn len(&self) -> usize {
        self.by_stop.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.by_stop.is_empty()
    }
}
