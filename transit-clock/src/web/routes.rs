//! HTTP route handlers.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    middleware,
    response::IntoResponse,
    routing::{get, post},
};
use chrono::{DateTime, Utc};
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use crate::legs::{DEFAULT_ESTIMATE_COUNT, LegError, LegEstimator};
use crate::realtime::FeedError;
use crate::schedule::ScheduleError;

use super::auth::require_basic_auth;
use super::dto::*;
use super::state::AppState;

/// Create the application router.
///
/// Everything except `/health` requires Basic authentication.
pub fn create_router(state: AppState) -> Router {
    let trips = Router::new()
        .route("/", get(list_legs))
        .route("/force_refresh", post(force_refresh))
        .route("/:leg_id", get(get_leg))
        .route("/:leg_id/next", get(next_estimates))
        .route("/:leg_id/:utc_timestamp/:count", get(estimates_at));

    let protected = Router::new()
        .route("/", get(root))
        .nest("/trips", trips)
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            require_basic_auth,
        ));

    Router::new()
        .route("/health", get(health))
        .merge(protected)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Health check endpoint.
async fn health() -> &'static str {
    "ok"
}

async fn root() -> Json<StatusResponse> {
    Json(StatusResponse { status: "ok" })
}

/// List tracked legs.
async fn list_legs(State(state): State<AppState>) -> Json<LegListResponse> {
    let legs = state.legs.iter().map(|l| l.leg().clone()).collect();
    Json(LegListResponse { legs })
}

/// Refresh both live feeds now.
async fn force_refresh(State(state): State<AppState>) -> Result<Json<RefreshResponse>, AppError> {
    let updated_at = state.feeds.refresh_all().await?;
    info!("feeds refreshed on request");
    Ok(Json(RefreshResponse {
        updated_at: updated_at.as_ref().map(format_timestamp),
    }))
}

fn find_leg(state: &AppState, leg_id: u32) -> Result<Arc<LegEstimator>, AppError> {
    state.legs.get(leg_id).cloned().ok_or_else(|| AppError::NotFound {
        message: format!("Leg {leg_id} not found"),
    })
}

async fn get_leg(
    State(state): State<AppState>,
    Path(leg_id): Path<u32>,
) -> Result<Json<crate::legs::Leg>, AppError> {
    let leg = find_leg(&state, leg_id)?;
    Ok(Json(leg.leg().clone()))
}

/// Upcoming departures with live delays and the line's incidents.
async fn next_estimates(
    State(state): State<AppState>,
    Path(leg_id): Path<u32>,
) -> Result<Json<NextResponse>, AppError> {
    let leg = find_leg(&state, leg_id)?;

    let incidents = leg.get_incidents().await?;
    let estimates = leg.get_estimates(None, Some(DEFAULT_ESTIMATE_COUNT))?;

    let mut results = Vec::with_capacity(estimates.len());
    for estimate in &estimates {
        let delay = leg.get_delay(&estimate.trip_id, false).await?;
        results.push(LiveEstimateResult {
            estimate: EstimateResult::from(estimate),
            delay: delay.map(|d| d.delay.num_seconds()),
        });
    }

    Ok(Json(NextResponse {
        leg: leg.leg().clone(),
        estimates: results,
        incidents: incidents.iter().map(IncidentResult::from).collect(),
        sot_updated_at: leg.refreshed_at().await.as_ref().map(format_timestamp),
    }))
}

/// Departures after a given instant. A negative `count` asks for all of
/// the day's remaining departures.
async fn estimates_at(
    State(state): State<AppState>,
    Path((leg_id, utc_timestamp, count)): Path<(u32, String, i64)>,
) -> Result<Json<EstimatesResponse>, AppError> {
    let leg = find_leg(&state, leg_id)?;
    let from = parse_unix_seconds(&utc_timestamp)?;

    let estimates = leg.get_estimates(Some(from), usize::try_from(count).ok())?;

    Ok(Json(EstimatesResponse {
        leg: leg.leg().clone(),
        estimates: estimates.iter().map(EstimateResult::from).collect(),
        sot_updated_at: leg.refreshed_at().await.as_ref().map(format_timestamp),
    }))
}

/// Parse Unix seconds, possibly fractional.
fn parse_unix_seconds(s: &str) -> Result<DateTime<Utc>, AppError> {
    let invalid = || AppError::BadRequest {
        message: format!("Invalid UTC timestamp: {s}"),
    };

    let value: f64 = s.trim().parse().map_err(|_| invalid())?;
    if !value.is_finite() {
        return Err(invalid());
    }
    let secs = value.floor();
    let nanos = ((value - secs) * 1e9).round().min(999_999_999.0) as u32;
    DateTime::from_timestamp(secs as i64, nanos).ok_or_else(invalid)
}

/// Application error type.
#[derive(Debug)]
pub enum AppError {
    BadRequest { message: String },
    NotFound { message: String },
    BadGateway { message: String },
    Internal { message: String },
}

impl From<FeedError> for AppError {
    fn from(e: FeedError) -> Self {
        match e {
            FeedError::InvalidQuery(_) => AppError::BadRequest {
                message: e.to_string(),
            },
            _ => AppError::BadGateway {
                message: e.to_string(),
            },
        }
    }
}

impl From<ScheduleError> for AppError {
    fn from(e: ScheduleError) -> Self {
        match e {
            ScheduleError::StopNotFound(_) | ScheduleError::StopNotServed { .. } => {
                AppError::NotFound {
                    message: e.to_string(),
                }
            }
            ScheduleError::UnknownColumn(_) | ScheduleError::Time(_) => AppError::BadRequest {
                message: e.to_string(),
            },
            _ => AppError::Internal {
                message: e.to_string(),
            },
        }
    }
}

impl From<LegError> for AppError {
    fn from(e: LegError) -> Self {
        match e {
            LegError::Schedule(e) => e.into(),
            LegError::Feed(e) => e.into(),
            LegError::NotOnSameLine { .. } => AppError::BadRequest {
                message: e.to_string(),
            },
            LegError::DataInconsistency(_) => AppError::Internal {
                message: e.to_string(),
            },
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let (status, message) = match self {
            AppError::BadRequest { message } => (StatusCode::BAD_REQUEST, message),
            AppError::NotFound { message } => (StatusCode::NOT_FOUND, message),
            AppError::BadGateway { message } => (StatusCode::BAD_GATEWAY, message),
            AppError::Internal { message } => (StatusCode::INTERNAL_SERVER_ERROR, message),
        };

        if status.is_server_error() {
            error!(%status, "{message}");
        } else {
            warn!(%status, "{message}");
        }

        let body = Json(ErrorResponse { error: message });
        (status, body).into_response()
    }
}
