//! Response types for the HTTP API.

use chrono::{DateTime, TimeZone};
use serde::Serialize;

use crate::legs::{Estimate, Leg};
use crate::realtime::Incident;

/// Response for `/`.
#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub status: &'static str,
}

/// Response for listing tracked legs.
#[derive(Debug, Serialize)]
pub struct LegListResponse {
    pub legs: Vec<Leg>,
}

/// Response for a forced feed refresh.
#[derive(Debug, Serialize)]
pub struct RefreshResponse {
    /// When the delay feed was last refreshed
    pub updated_at: Option<String>,
}

/// One scheduled departure/arrival pair.
#[derive(Debug, Serialize)]
pub struct EstimateResult {
    pub transporter_trip_id: String,
    pub departure_time: String,
    pub arrival_time: String,
}

/// An estimate joined with its live delay.
#[derive(Debug, Serialize)]
pub struct LiveEstimateResult {
    #[serde(flatten)]
    pub estimate: EstimateResult,

    /// Live delay in seconds, if the trip has a report
    pub delay: Option<i64>,
}

/// A traffic alert on the leg's line.
#[derive(Debug, Serialize)]
pub struct IncidentResult {
    pub title: String,
    pub message: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub severity: String,
}

/// Response for `/trips/{leg_id}/next`.
#[derive(Debug, Serialize)]
pub struct NextResponse {
    pub leg: Leg,
    pub estimates: Vec<LiveEstimateResult>,
    pub incidents: Vec<IncidentResult>,
    /// When live delays were last refreshed
    pub sot_updated_at: Option<String>,
}

/// Response for `/trips/{leg_id}/{utc_timestamp}/{count}`.
#[derive(Debug, Serialize)]
pub struct EstimatesResponse {
    pub leg: Leg,
    pub estimates: Vec<EstimateResult>,
    pub sot_updated_at: Option<String>,
}

/// Error response.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Error message
    pub error: String,
}

impl From<&Estimate> for EstimateResult {
    fn from(estimate: &Estimate) -> Self {
        Self {
            transporter_trip_id: estimate.trip_id.to_string(),
            departure_time: format_timestamp(&estimate.departure),
            arrival_time: format_timestamp(&estimate.arrival),
        }
    }
}

impl From<&Incident> for IncidentResult {
    fn from(incident: &Incident) -> Self {
        Self {
            title: incident.title.clone(),
            message: incident.message.clone(),
            kind: incident.severity_type.clone(),
            severity: incident.severity_level.clone(),
        }
    }
}

/// Format a timestamp as RFC 3339 with its offset.
pub fn format_timestamp<Tz: TimeZone>(t: &DateTime<Tz>) -> String
where
    Tz::Offset: std::fmt::Display,
{
    t.to_rfc3339()
}
