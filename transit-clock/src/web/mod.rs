//! Web layer for the transit clock.
//!
//! Exposes the tracked legs, their estimates and a forced feed refresh as a
//! JSON API behind HTTP Basic authentication.

mod auth;
mod dto;
mod routes;
mod state;

pub use auth::decode_basic;
pub use dto::*;
pub use routes::{AppError, create_router};
pub use state::AppState;
