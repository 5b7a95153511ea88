//! Application state for the web layer.

use std::sync::Arc;

use crate::config::Credentials;
use crate::legs::LegRegistry;
use crate::realtime::Feeds;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    /// Tracked legs
    pub legs: Arc<LegRegistry>,

    /// Live delay and incident feeds
    pub feeds: Feeds,

    /// Expected Basic credentials
    pub auth: Arc<Credentials>,
}

impl AppState {
    /// Create a new app state.
    pub fn new(legs: LegRegistry, feeds: Feeds, auth: Credentials) -> Self {
        Self {
            legs: Arc::new(legs),
            feeds,
            auth: Arc::new(auth),
        }
    }
}
