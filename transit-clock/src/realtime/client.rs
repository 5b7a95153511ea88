//! Paginated open-data HTTP client.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use futures::future::BoxFuture;
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use serde::Deserialize;
use tracing::debug;

use super::error::FeedError;
use super::record::RawRecord;

/// Default base URL of the open-data platform.
pub const DEFAULT_BASE_URL: &str = "https://data.grandlyon.com/fr/datapusher/ws/rdata";

/// Default number of rows requested per page.
pub const DEFAULT_PAGE_SIZE: usize = 1000;

/// One dataset published by the platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dataset {
    /// Short name used in logs and errors.
    pub name: &'static str,
    /// Path below the base URL.
    pub route: &'static str,
    /// Value of the `filename` query parameter.
    pub filename: &'static str,
}

impl Dataset {
    /// Next passages with live delays.
    pub const DELAYS: Dataset = Dataset {
        name: "delays",
        route: "tcl_sytral.tclpassagearret/all.json",
        filename: "prochains-passages-reseau-transports-commun-lyonnais-rhonexpress-disponibilites-temps-reel",
    };

    /// Traffic alerts.
    pub const INCIDENTS: Dataset = Dataset {
        name: "incidents",
        route: "tcl_sytral.tclalertetrafic_2/all.json",
        filename: "alertes-trafic-reseau-transports-commun-lyonnais-v2",
    };
}

/// Something that can serve pages of a dataset.
///
/// `start` is 1-based. An empty page means there are no more rows.
pub trait PageSource: Send + Sync {
    fn fetch_page(
        &self,
        start: usize,
        page_size: usize,
    ) -> BoxFuture<'_, Result<Vec<RawRecord>, FeedError>>;
}

/// Configuration for the feed client.
#[derive(Debug, Clone)]
pub struct FeedConfig {
    pub username: String,
    pub password: String,
    /// Base URL for the API (defaults to the production platform)
    pub base_url: String,
    /// Rows per page
    pub page_size: usize,
    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl FeedConfig {
    /// Create a new config with the given credentials.
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            page_size: DEFAULT_PAGE_SIZE,
            timeout_secs: 30,
        }
    }

    /// Set a custom base URL (for testing).
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    pub fn with_page_size(mut self, n: usize) -> Self {
        self.page_size = n;
        self
    }

    /// Set request timeout.
    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }
}

impl Default for FeedConfig {
    /// The platform's public demo credentials.
    fn default() -> Self {
        Self::new("demo", "demo4dev")
    }
}

#[derive(Debug, Deserialize)]
struct PageResponse {
    #[serde(default)]
    values: Vec<RawRecord>,
}

/// HTTP client for one dataset.
#[derive(Debug, Clone)]
pub struct FeedClient {
    http: reqwest::Client,
    base_url: String,
    dataset: Dataset,
}

impl FeedClient {
    /// Create a client for `dataset`, authenticating with Basic credentials.
    pub fn new(config: &FeedConfig, dataset: Dataset) -> Result<Self, FeedError> {
        let mut headers = HeaderMap::new();

        let token = STANDARD.encode(format!("{}:{}", config.username, config.password));
        let auth = HeaderValue::from_str(&format!("Basic {token}")).map_err(|_| FeedError::Api {
            status: 0,
            message: "Invalid credentials format".to_string(),
        })?;
        headers.insert(AUTHORIZATION, auth);

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            dataset,
        })
    }

    pub fn dataset(&self) -> Dataset {
        self.dataset
    }

    fn url(&self) -> String {
        format!("{}/{}", self.base_url, self.dataset.route)
    }

    async fn get_page(&self, start: usize, page_size: usize) -> Result<Vec<RawRecord>, FeedError> {
        debug!(dataset = self.dataset.name, start, page_size, "fetching page");

        let response = self
            .http
            .get(self.url())
            .query(&[
                ("maxfeatures", page_size.to_string()),
                ("start", start.to_string()),
                ("filename", self.dataset.filename.to_string()),
            ])
            .send()
            .await?;
        let status = response.status();

        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
            return Err(FeedError::Unauthorized);
        }

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(FeedError::Api {
                status: status.as_u16(),
                message: body,
            });
        }

        let body = response.text().await?;
        let page: PageResponse = serde_json::from_str(&body).map_err(|e| FeedError::Json {
            message: e.to_string(),
        })?;

        Ok(page.values)
    }
}

impl PageSource for FeedClient {
    fn fetch_page(
        &self,
        start: usize,
        page_size: usize,
    ) -> BoxFuture<'_, Result<Vec<RawRecord>, FeedError>> {
        Box::pin(self.get_page(start, page_size))
    }
}
