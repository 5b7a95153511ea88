//! In-memory snapshot of a paginated remote dataset.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info};

use super::client::{Dataset, PageSource};
use super::error::{FeedError, RecordError};
use super::record::{FieldMatcher, RawRecord, RealtimeRecord};

/// A typed view of one dataset row.
pub trait FeedRecord: Clone + Send + Sync + 'static {
    fn parse(record: &RealtimeRecord) -> Result<Self, RecordError>;
}

struct Snapshot<T> {
    entries: HashMap<RealtimeRecord, T>,
    refreshed_at: Option<DateTime<Utc>>,
}

impl<T> Snapshot<T> {
    fn empty() -> Self {
        Self {
            entries: HashMap::new(),
            refreshed_at: None,
        }
    }
}

/// De-duplicated, searchable copy of a remote dataset.
///
/// Empty until the first successful [`refresh`](Self::refresh). A refresh
/// replaces the whole snapshot at once; a failed one leaves the previous
/// snapshot and its timestamp in place.
pub struct RemoteRecordCache<T> {
    dataset: Dataset,
    source: Arc<dyn PageSource>,
    page_size: usize,
    snapshot: RwLock<Arc<Snapshot<T>>>,
    refreshing: Mutex<()>,
}

impl<T: FeedRecord> RemoteRecordCache<T> {
    pub fn new(dataset: Dataset, source: Arc<dyn PageSource>, page_size: usize) -> Self {
        Self {
            dataset,
            source,
            page_size: page_size.max(1),
            snapshot: RwLock::new(Arc::new(Snapshot::empty())),
            refreshing: Mutex::new(()),
        }
    }

    pub fn dataset(&self) -> Dataset {
        self.dataset
    }

    /// Fetch one page starting at the 1-based row `start`.
    pub async fn fetch_page(&self, start: usize) -> Result<Vec<RawRecord>, FeedError> {
        self.source.fetch_page(start, self.page_size).await
    }

    /// Fetch every row, page by page, until an empty page comes back.
    pub async fn fetch_all(&self) -> Result<Vec<RawRecord>, FeedError> {
        let mut start = 1;
        let mut rows = Vec::new();

        loop {
            let page = self.fetch_page(start).await?;
            if page.is_empty() {
                break;
            }
            start += page.len();
            rows.extend(page);
        }

        debug!(dataset = self.dataset.name, rows = rows.len(), "fetched all pages");
        Ok(rows)
    }

    /// Replace the snapshot with a freshly fetched one.
    ///
    /// Returns the number of distinct records. Concurrent calls are
    /// serialized.
    pub async fn refresh(&self) -> Result<usize, FeedError> {
        let _guard = self.refreshing.lock().await;

        let rows = self.fetch_all().await?;
        let fetched = rows.len();

        let mut entries = HashMap::with_capacity(fetched);
        for raw in rows {
            let record = RealtimeRecord::new(raw);
            if entries.contains_key(&record) {
                continue;
            }
            let parsed = T::parse(&record)?;
            entries.insert(record, parsed);
        }
        let count = entries.len();

        let snapshot = Arc::new(Snapshot {
            entries,
            refreshed_at: Some(Utc::now()),
        });
        *self.snapshot.write().await = snapshot;

        info!(
            dataset = self.dataset.name,
            fetched,
            distinct = count,
            "feed refreshed"
        );
        Ok(count)
    }

    async fn current(&self) -> Arc<Snapshot<T>> {
        self.snapshot.read().await.clone()
    }

    /// Records whose `field` satisfies `matcher`. Records without the field
    /// never match.
    pub async fn find_by_field(&self, field: &str, matcher: &FieldMatcher) -> Vec<T> {
        self.find_where(|record| record.get(field).is_some_and(|v| matcher.matches(v)))
            .await
    }

    /// Records for which `predicate` holds.
    pub async fn find_where(&self, predicate: impl Fn(&RealtimeRecord) -> bool) -> Vec<T> {
        self.current()
            .await
            .entries
            .iter()
            .filter(|(record, _)| predicate(record))
            .map(|(_, parsed)| parsed.clone())
            .collect()
    }

    /// When the last successful refresh completed.
    pub async fn refreshed_at(&self) -> Option<DateTime<Utc>> {
        self.current().await.refreshed_at
    }

    pub async fn len(&self) -> usize {
        self.current().await.entries.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.current().await.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::realtime::mock::MockSource;
    use futures::future::BoxFuture;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::Notify;

    #[derive(Debug, Clone, PartialEq, Eq)]
    struct Line(String);

    impl FeedRecord for Line {
        fn parse(record: &RealtimeRecord) -> Result<Self, RecordError> {
            match record.get("ligne") {
                Some(serde_json::Value::String(s)) => Ok(Line(s.clone())),
                _ => Err(RecordError {
                    dataset: "test",
                    field: "ligne",
                    reason: "missing".into(),
                }),
            }
        }
    }

    fn row(line: &str, trip: &str) -> RawRecord {
        let mut row = RawRecord::new();
        row.insert("ligne".into(), json!(line));
        row.insert("coursetheorique".into(), json!(trip));
        row
    }

    fn cache(source: &MockSource, page_size: usize) -> RemoteRecordCache<Line> {
        RemoteRecordCache::new(Dataset::DELAYS, Arc::new(source.clone()), page_size)
    }

    #[tokio::test]
    async fn empty_until_refreshed() {
        let source = MockSource::new(vec![row("C8", "1")]);
        let cache = cache(&source, 10);

        assert!(cache.is_empty().await);
        assert_eq!(cache.refreshed_at().await, None);
        assert!(
            cache
                .find_by_field("ligne", &FieldMatcher::exact("C8"))
                .await
                .is_empty()
        );
    }

    #[tokio::test]
    async fn fetch_all_walks_pages_until_empty() {
        let rows: Vec<_> = (0..5).map(|i| row("C8", &i.to_string())).collect();
        let source = MockSource::new(rows);
        let cache = cache(&source, 2);

        let all = cache.fetch_all().await.unwrap();
        assert_eq!(all.len(), 5);
        // Pages starting at 1, 3, 5, then the empty one at 6
        assert_eq!(source.requests(), 4);
    }

    #[tokio::test]
    async fn refresh_deduplicates() {
        let source = MockSource::new(vec![row("C8", "1"), row("C8", "1"), row("C9", "2")]);
        let cache = cache(&source, 2);

        let before = Utc::now();
        assert_eq!(cache.refresh().await.unwrap(), 2);
        assert_eq!(cache.len().await, 2);
        assert!(cache.refreshed_at().await.unwrap() >= before);
    }

    #[tokio::test]
    async fn find_by_field() {
        let source = MockSource::new(vec![row("C8", "1"), row("C8", "2"), row("C9", "3")]);
        let cache = cache(&source, 10);
        cache.refresh().await.unwrap();

        let c8 = cache.find_by_field("ligne", &FieldMatcher::exact("C8")).await;
        assert_eq!(c8, vec![Line("C8".into()), Line("C8".into())]);

        let any = cache
            .find_by_field("ligne", &FieldMatcher::pattern("^C").unwrap())
            .await;
        assert_eq!(any.len(), 3);

        let missing = cache
            .find_by_field("direction", &FieldMatcher::pattern(".*").unwrap())
            .await;
        assert!(missing.is_empty());
    }

    #[tokio::test]
    async fn failed_page_keeps_previous_snapshot() {
        let rows: Vec<_> = (0..5).map(|i| row("C8", &i.to_string())).collect();
        let source = MockSource::new(rows);
        let cache = cache(&source, 2);

        cache.refresh().await.unwrap();
        let refreshed_at = cache.refreshed_at().await;

        source
            .set_rows((0..6).map(|i| row("C9", &i.to_string())).collect())
            .await;
        source.fail_on_page(Some(3)).await;

        let result = cache.refresh().await;
        assert!(matches!(result, Err(FeedError::Api { status: 503, .. })));
        assert_eq!(cache.len().await, 5);
        assert_eq!(cache.refreshed_at().await, refreshed_at);
        assert!(
            cache
                .find_by_field("ligne", &FieldMatcher::exact("C9"))
                .await
                .is_empty()
        );
    }

    #[tokio::test]
    async fn malformed_row_keeps_previous_snapshot() {
        let source = MockSource::new(vec![row("C8", "1")]);
        let cache = cache(&source, 10);
        cache.refresh().await.unwrap();

        let mut bad = RawRecord::new();
        bad.insert("ligne".into(), json!(null));
        source.set_rows(vec![row("C9", "2"), bad]).await;

        assert!(matches!(cache.refresh().await, Err(FeedError::Record(_))));
        assert_eq!(
            cache.find_by_field("ligne", &FieldMatcher::exact("C8")).await,
            vec![Line("C8".into())]
        );
    }

    /// Serves rows slowly, tracking how many full page walks overlap.
    #[derive(Default)]
    struct SlowSource {
        rows: std::sync::Mutex<Vec<RawRecord>>,
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
        stall_at: std::sync::Mutex<Option<usize>>,
        stalled: Notify,
        resume: Notify,
    }

    impl SlowSource {
        fn new(rows: Vec<RawRecord>) -> Arc<Self> {
            Arc::new(Self {
                rows: std::sync::Mutex::new(rows),
                ..Self::default()
            })
        }
    }

    impl PageSource for SlowSource {
        fn fetch_page(
            &self,
            start: usize,
            page_size: usize,
        ) -> BoxFuture<'_, Result<Vec<RawRecord>, FeedError>> {
            Box::pin(async move {
                if start == 1 {
                    let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                    self.max_in_flight.fetch_max(now, Ordering::SeqCst);
                }
                let stall = *self.stall_at.lock().unwrap() == Some(start);
                if stall {
                    self.stalled.notify_one();
                    self.resume.notified().await;
                }
                tokio::time::sleep(std::time::Duration::from_millis(5)).await;

                let page: Vec<_> = self
                    .rows
                    .lock()
                    .unwrap()
                    .iter()
                    .skip(start - 1)
                    .take(page_size)
                    .cloned()
                    .collect();
                if page.is_empty() {
                    self.in_flight.fetch_sub(1, Ordering::SeqCst);
                }
                Ok(page)
            })
        }
    }

    #[tokio::test]
    async fn concurrent_refreshes_both_complete() {
        let source = MockSource::new(vec![row("C8", "1"), row("C9", "2")]);
        let cache = cache(&source, 1);

        let (a, b) = tokio::join!(cache.refresh(), cache.refresh());
        assert_eq!(a.unwrap(), 2);
        assert_eq!(b.unwrap(), 2);
        assert_eq!(cache.len().await, 2);
    }

    #[tokio::test]
    async fn refreshes_never_overlap() {
        let source = SlowSource::new(vec![row("C8", "1"), row("C9", "2"), row("C8", "3")]);
        let cache: RemoteRecordCache<Line> =
            RemoteRecordCache::new(Dataset::DELAYS, source.clone(), 1);

        let (a, b, c) = tokio::join!(cache.refresh(), cache.refresh(), cache.refresh());
        assert_eq!(a.unwrap(), 3);
        assert_eq!(b.unwrap(), 3);
        assert_eq!(c.unwrap(), 3);

        assert_eq!(source.max_in_flight.load(Ordering::SeqCst), 1);
        assert_eq!(source.in_flight.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn readers_see_old_snapshot_during_refresh() {
        let source = SlowSource::new(vec![row("C8", "1"), row("C8", "2")]);
        let cache: RemoteRecordCache<Line> =
            RemoteRecordCache::new(Dataset::DELAYS, source.clone(), 1);
        cache.refresh().await.unwrap();
        let refreshed_at = cache.refreshed_at().await;

        *source.rows.lock().unwrap() = vec![row("C9", "1"), row("C9", "2"), row("C9", "3")];
        *source.stall_at.lock().unwrap() = Some(2);

        let reader = async {
            source.stalled.notified().await;
            assert_eq!(cache.len().await, 2);
            assert_eq!(cache.refreshed_at().await, refreshed_at);
            assert!(
                cache
                    .find_by_field("ligne", &FieldMatcher::exact("C9"))
                    .await
                    .is_empty()
            );
            source.resume.notify_one();
        };
        let (refreshed, ()) = tokio::join!(cache.refresh(), reader);

        assert_eq!(refreshed.unwrap(), 3);
        assert_eq!(
            cache.find_by_field("ligne", &FieldMatcher::exact("C9")).await.len(),
            3
        );
        assert!(cache.refreshed_at().await > refreshed_at);
    }
}
