//! Live next-passage reports.

use std::sync::Arc;

use chrono::{DateTime, Duration, NaiveDateTime, Utc};

use super::cache::{FeedRecord, RemoteRecordCache};
use super::client::{Dataset, PageSource};
use super::error::{FeedError, RecordError};
use super::record::{FieldMatcher, Fields, RealtimeRecord};

/// Field holding the scheduled trip reference.
pub const TRIP_FIELD: &str = "coursetheorique";
/// Field holding the line reference.
pub const LINE_FIELD: &str = "ligne";
/// Field holding the direction name.
pub const DIRECTION_FIELD: &str = "direction";

/// One upcoming passage of a vehicle at a stop, with its live delay.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NextPassage {
    pub id: i64,
    pub kind: String,
    pub line: String,
    pub trip_ref: String,
    pub direction: Option<String>,
    pub destination_stop: Option<i64>,
    pub last_update: NaiveDateTime,
    pub delay: Duration,
    pub passage_time: NaiveDateTime,
}

impl FeedRecord for NextPassage {
    fn parse(record: &RealtimeRecord) -> Result<Self, RecordError> {
        let fields = Fields::new(record, Dataset::DELAYS.name);

        let delay_text = fields.text("delaipassage")?;
        let delay = parse_delay(&delay_text)
            .ok_or_else(|| fields.error("delaipassage", format!("unrecognized delay {delay_text:?}")))?;

        Ok(NextPassage {
            id: fields.int("id")?,
            kind: fields.text("type")?,
            line: fields.text(LINE_FIELD)?,
            trip_ref: fields.text(TRIP_FIELD)?,
            direction: fields.optional_text(DIRECTION_FIELD)?,
            destination_stop: fields.optional_int("idtarretdestination")?,
            last_update: fields.timestamp("last_update_fme")?,
            delay,
            passage_time: fields.timestamp("heurepassage")?,
        })
    }
}

/// Parse a delay as the feed spells it.
///
/// ```
/// use chrono::Duration;
/// use transit_clock::realtime::parse_delay;
///
/// assert_eq!(parse_delay("Proche"), Some(Duration::zero()));
/// assert_eq!(parse_delay("2 min"), Some(Duration::minutes(2)));
/// assert_eq!(parse_delay("06h03"), Some(Duration::minutes(6 * 60 + 3)));
/// assert_eq!(parse_delay("soon"), None);
/// ```
pub fn parse_delay(s: &str) -> Option<Duration> {
    if s == "Proche" {
        return Some(Duration::zero());
    }
    if let Some(minutes) = s.strip_suffix(" min") {
        let minutes = digits(minutes)?;
        return Some(Duration::minutes(minutes.into()));
    }

    let (hours, minutes) = s.split_once(':').or_else(|| s.split_once('h'))?;
    if hours.len() != 2 || minutes.len() != 2 {
        return None;
    }
    let hours = digits(hours)?;
    let minutes = digits(minutes)?;
    if minutes >= 60 {
        return None;
    }
    Some(Duration::minutes((hours * 60 + minutes).into()))
}

/// A non-empty run of ASCII digits, without sign or padding.
fn digits(s: &str) -> Option<u32> {
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    s.parse().ok()
}

/// Filters for [`DelayFeed::get`]. At least one must be set.
#[derive(Debug, Clone, Default)]
pub struct DelayQuery {
    pub line_ref: Option<FieldMatcher>,
    pub destination: Option<FieldMatcher>,
    /// Takes precedence over the other filters.
    pub trip_id: Option<String>,
}

impl DelayQuery {
    pub fn trip(trip_id: impl Into<String>) -> Self {
        Self {
            trip_id: Some(trip_id.into()),
            ..Self::default()
        }
    }

    pub fn line(line_ref: FieldMatcher) -> Self {
        Self {
            line_ref: Some(line_ref),
            ..Self::default()
        }
    }

    pub fn with_destination(mut self, destination: FieldMatcher) -> Self {
        self.destination = Some(destination);
        self
    }
}

/// Cache of the next-passage dataset.
pub struct DelayFeed {
    cache: RemoteRecordCache<NextPassage>,
}

impl DelayFeed {
    pub fn new(source: Arc<dyn PageSource>, page_size: usize) -> Self {
        Self {
            cache: RemoteRecordCache::new(Dataset::DELAYS, source, page_size),
        }
    }

    /// Passages matching `query`, refreshing first when `force_refetch`.
    pub async fn get(
        &self,
        query: &DelayQuery,
        force_refetch: bool,
    ) -> Result<Vec<NextPassage>, FeedError> {
        if query.trip_id.is_none() && query.line_ref.is_none() && query.destination.is_none() {
            return Err(FeedError::InvalidQuery(
                "at least one of line_ref, destination or trip_id must be provided".to_string(),
            ));
        }

        if force_refetch {
            self.cache.refresh().await?;
        }

        if let Some(trip_id) = &query.trip_id {
            let matcher = FieldMatcher::exact(trip_id.as_str());
            return Ok(self.cache.find_by_field(TRIP_FIELD, &matcher).await);
        }

        let satisfies = |record: &RealtimeRecord, field: &str, matcher: &Option<FieldMatcher>| {
            matcher
                .as_ref()
                .is_none_or(|m| record.get(field).is_some_and(|v| m.matches(v)))
        };
        Ok(self
            .cache
            .find_where(|record| {
                satisfies(record, LINE_FIELD, &query.line_ref)
                    && satisfies(record, DIRECTION_FIELD, &query.destination)
            })
            .await)
    }

    pub async fn refresh(&self) -> Result<usize, FeedError> {
        self.cache.refresh().await
    }

    pub async fn refreshed_at(&self) -> Option<DateTime<Utc>> {
        self.cache.refreshed_at().await
    }

    pub fn cache(&self) -> &RemoteRecordCache<NextPassage> {
        &self.cache
    }
}
