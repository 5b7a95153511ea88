//! The pair of live feeds the process works with.

use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures::future::try_join;
use tracing::info;

use super::client::{Dataset, FeedClient, FeedConfig, PageSource};
use super::delay::DelayFeed;
use super::error::FeedError;
use super::incident::IncidentFeed;
use super::mock::MockSource;

/// Handles to the delay and incident feeds.
///
/// Built once at startup and cloned into whatever needs them.
#[derive(Clone)]
pub struct Feeds {
    pub delays: Arc<DelayFeed>,
    pub incidents: Arc<IncidentFeed>,
}

impl Feeds {
    /// Feeds backed by the live platform.
    pub fn init(config: &FeedConfig) -> Result<Self, FeedError> {
        let delays = FeedClient::new(config, Dataset::DELAYS)?;
        let incidents = FeedClient::new(config, Dataset::INCIDENTS)?;
        info!(base_url = %config.base_url, page_size = config.page_size, "using live feeds");
        Ok(Self::from_sources(
            Arc::new(delays),
            Arc::new(incidents),
            config.page_size,
        ))
    }

    /// Feeds served from `delays.json` and `incidents.json` in `dir`.
    pub fn mock(dir: impl AsRef<Path>, page_size: usize) -> Result<Self, FeedError> {
        let dir = dir.as_ref();
        let delays = MockSource::from_file(dir.join("delays.json"))?;
        let incidents = MockSource::from_file(dir.join("incidents.json"))?;
        info!(dir = %dir.display(), "using mock feeds");
        Ok(Self::from_sources(
            Arc::new(delays),
            Arc::new(incidents),
            page_size,
        ))
    }

    pub fn from_sources(
        delays: Arc<dyn PageSource>,
        incidents: Arc<dyn PageSource>,
        page_size: usize,
    ) -> Self {
        Self {
            delays: Arc::new(DelayFeed::new(delays, page_size)),
            incidents: Arc::new(IncidentFeed::new(incidents, page_size)),
        }
    }

    /// Refresh both feeds concurrently.
    ///
    /// Returns the delay feed's new refresh time. The first failure is
    /// returned and the other refresh is abandoned.
    pub async fn refresh_all(&self) -> Result<Option<DateTime<Utc>>, FeedError> {
        try_join(self.delays.refresh(), self.incidents.refresh()).await?;
        Ok(self.delays.refreshed_at().await)
    }
}
