//! In-memory page source for development and tests.
//!
//! Serves rows loaded from a JSON file (or given directly) as if they came
//! from the live platform, paginated the same way.

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use futures::future::BoxFuture;
use serde::Deserialize;
use tokio::sync::RwLock;

use super::client::PageSource;
use super::error::FeedError;
use super::record::RawRecord;

#[derive(Default)]
struct MockState {
    rows: Vec<RawRecord>,
    /// 1-based page number that fails, if any.
    failing_page: Option<usize>,
}

/// Page source serving a fixed set of rows.
#[derive(Clone, Default)]
pub struct MockSource {
    state: Arc<RwLock<MockState>>,
    requests: Arc<AtomicUsize>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum MockFile {
    Page { values: Vec<RawRecord> },
    Rows(Vec<RawRecord>),
}

impl MockSource {
    pub fn new(rows: Vec<RawRecord>) -> Self {
        Self {
            state: Arc::new(RwLock::new(MockState {
                rows,
                failing_page: None,
            })),
            requests: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Load rows from a JSON file.
    ///
    /// Accepts either a bare array of rows or a saved API response
    /// (`{"values": [...]}`).
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, FeedError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|e| FeedError::Api {
            status: 0,
            message: format!("Failed to read {}: {}", path.display(), e),
        })?;

        let rows = match serde_json::from_str(&json).map_err(|e| FeedError::Json {
            message: format!("Failed to parse {}: {}", path.display(), e),
        })? {
            MockFile::Page { values } => values,
            MockFile::Rows(rows) => rows,
        };

        Ok(Self::new(rows))
    }

    /// Replace the served rows.
    pub async fn set_rows(&self, rows: Vec<RawRecord>) {
        self.state.write().await.rows = rows;
    }

    /// Make requests for the given 1-based page fail with a 503.
    ///
    /// `None` clears the failure.
    pub async fn fail_on_page(&self, page: Option<usize>) {
        self.state.write().await.failing_page = page;
    }

    /// Number of pages requested so far.
    pub fn requests(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }

    async fn page(&self, start: usize, page_size: usize) -> Result<Vec<RawRecord>, FeedError> {
        self.requests.fetch_add(1, Ordering::SeqCst);
        let state = self.state.read().await;

        let page_size = page_size.max(1);
        let page = start.saturating_sub(1) / page_size + 1;
        if state.failing_page == Some(page) {
            return Err(FeedError::Api {
                status: 503,
                message: format!("mock failure on page {page}"),
            });
        }

        Ok(state
            .rows
            .iter()
            .skip(start.saturating_sub(1))
            .take(page_size)
            .cloned()
            .collect())
    }
}

impl PageSource for MockSource {
    fn fetch_page(
        &self,
        start: usize,
        page_size: usize,
    ) -> BoxFuture<'_, Result<Vec<RawRecord>, FeedError>> {
        Box::pin(self.page(start, page_size))
    }
}
