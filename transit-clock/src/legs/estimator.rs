//! Estimates for one origin/destination pair.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use serde::Serialize;
use tracing::debug;

use crate::domain::{StopId, TripId, localize};
use crate::realtime::{
    DelayFeed, DelayQuery, Feeds, FieldMatcher, Incident, IncidentFeed, NextPassage,
};
use crate::schedule::{ScheduleIndex, StopTimeColumn};

use super::error::LegError;

/// Number of estimates returned when the caller does not say.
pub const DEFAULT_ESTIMATE_COUNT: usize = 3;

/// A tracked origin/destination pair on one line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Leg {
    pub id: u32,
    pub from_stop: StopId,
    pub to_stop: StopId,
    pub from_stop_name: String,
    pub to_stop_name: String,
    pub line_name: String,
    pub trip_direction: String,
    pub line_short_name: String,
}

/// A scheduled departure from the origin and the matching arrival at the
/// destination, both in the schedule's timezone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Estimate {
    pub trip_id: TripId,
    pub departure: DateTime<Tz>,
    pub arrival: DateTime<Tz>,
}

/// Joins the schedule with live delays and incidents for one [`Leg`].
pub struct LegEstimator {
    leg: Leg,
    schedule: Arc<ScheduleIndex>,
    delays: Arc<DelayFeed>,
    incidents: Arc<IncidentFeed>,
}

impl LegEstimator {
    /// Build the estimator for `from_stop` to `to_stop`.
    ///
    /// Fails if no trip calls at both stops on the schedule's service day,
    /// or if either stop is unknown.
    pub fn new(
        id: u32,
        from_stop: StopId,
        to_stop: StopId,
        schedule: Arc<ScheduleIndex>,
        feeds: &Feeds,
    ) -> Result<Self, LegError> {
        if !schedule.share_transit_line(&from_stop, &to_stop) {
            return Err(LegError::NotOnSameLine {
                from: from_stop,
                to: to_stop,
            });
        }

        let from_info = schedule.stop_info(&from_stop)?;
        let to_info = schedule.stop_info(&to_stop)?;

        let leg = Leg {
            id,
            from_stop,
            to_stop,
            from_stop_name: from_info.stop_name,
            to_stop_name: to_info.stop_name,
            line_name: from_info.route_long_name,
            trip_direction: from_info.trip_headsign,
            line_short_name: from_info.route_short_name,
        };

        Ok(Self {
            leg,
            schedule,
            delays: feeds.delays.clone(),
            incidents: feeds.incidents.clone(),
        })
    }

    pub fn leg(&self) -> &Leg {
        &self.leg
    }

    /// The next `count` departures after `from` (default now) with their
    /// arrival at the destination. `None` returns every remaining departure.
    ///
    /// When nothing is left on the current day, the first departures after
    /// the next local midnight are returned instead.
    pub fn get_estimates(
        &self,
        from: Option<DateTime<Utc>>,
        count: Option<usize>,
    ) -> Result<Vec<Estimate>, LegError> {
        let tz = self.schedule.timezone();
        let local = from.unwrap_or_else(Utc::now).with_timezone(&tz);

        let mut departures = self.schedule.next_events(
            &self.leg.from_stop,
            StopTimeColumn::Departure,
            &local,
            None,
            count,
        )?;

        if departures.is_empty() {
            let midnight = local
                .date_naive()
                .succ_opt()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
                .and_then(|dt| localize(dt, &tz))
                .ok_or_else(|| {
                    LegError::DataInconsistency(format!("no local midnight after {local}"))
                })?;
            debug!(leg = self.leg.id, %midnight, "no departures left today, rolling over");

            departures = self.schedule.next_events(
                &self.leg.from_stop,
                StopTimeColumn::Departure,
                &midnight,
                None,
                count,
            )?;
        }

        departures
            .into_iter()
            .map(|departure| {
                let arrival = self
                    .schedule
                    .arrival_after(&departure, &self.leg.to_stop)?
                    .ok_or_else(|| {
                        LegError::DataInconsistency(format!(
                            "trip {} leaves {} at {} but never reaches {}",
                            departure.trip_id, self.leg.from_stop, departure.at, self.leg.to_stop
                        ))
                    })?;

                Ok(Estimate {
                    trip_id: departure.trip_id,
                    departure: departure.at,
                    arrival: arrival.at,
                })
            })
            .collect()
    }

    /// The live delay report for `trip_id`, if there is one.
    pub async fn get_delay(
        &self,
        trip_id: &TripId,
        force_refetch: bool,
    ) -> Result<Option<NextPassage>, LegError> {
        let mut found = self
            .delays
            .get(&DelayQuery::trip(trip_id.as_str()), force_refetch)
            .await?;

        if found.len() > 1 {
            return Err(LegError::DataInconsistency(format!(
                "{} delay reports for trip {trip_id}",
                found.len()
            )));
        }
        Ok(found.pop())
    }

    /// Current incidents on the leg's line.
    pub async fn get_incidents(&self) -> Result<Vec<Incident>, LegError> {
        let matcher = FieldMatcher::exact(self.leg.line_short_name.as_str());
        Ok(self.incidents.get(&matcher, false).await?)
    }

    /// When live delays were last refreshed.
    pub async fn refreshed_at(&self) -> Option<DateTime<Utc>> {
        self.delays.refreshed_at().await
    }
}

#[cfg(test)]
#[path = "estimator_tests.rs"]
mod tests;
