//! HTTP Basic authentication.

use axum::{
    Json,
    extract::{Request, State},
    http::{HeaderValue, StatusCode, header},
    middleware::Next,
    response::{IntoResponse, Response},
};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use tracing::warn;

use crate::config::Credentials;

use super::dto::ErrorResponse;
use super::state::AppState;

/// Reject requests that do not carry the configured Basic credentials.
pub async fn require_basic_auth(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let supplied = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(decode_basic);

    match supplied {
        Some(credentials) if credentials_match(&credentials, &state.auth) => {
            next.run(request).await
        }
        _ => {
            warn!(path = %request.uri().path(), "rejected request with invalid credentials");
            unauthorized()
        }
    }
}

fn unauthorized() -> Response {
    let mut response = (
        StatusCode::UNAUTHORIZED,
        Json(ErrorResponse {
            error: "Invalid credentials".to_string(),
        }),
    )
        .into_response();
    response.headers_mut().insert(
        header::WWW_AUTHENTICATE,
        HeaderValue::from_static("Basic"),
    );
    response
}

/// Decode an `Authorization: Basic ...` header value.
pub fn decode_basic(value: &str) -> Option<Credentials> {
    let (scheme, token) = value.trim().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("basic") {
        return None;
    }
    let decoded = STANDARD.decode(token.trim()).ok()?;
    let decoded = String::from_utf8(decoded).ok()?;
    let (username, password) = decoded.split_once(':')?;
    Some(Credentials {
        username: username.to_string(),
        password: password.to_string(),
    })
}

fn credentials_match(supplied: &Credentials, expected: &Credentials) -> bool {
    // Both halves are always compared
    let username = constant_time_eq(supplied.username.as_bytes(), expected.username.as_bytes());
    let password = constant_time_eq(supplied.password.as_bytes(), expected.password.as_bytes());
    username & password
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
