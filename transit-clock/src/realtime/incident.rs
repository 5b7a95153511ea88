//! Network traffic alerts.

use std::sync::Arc;

use chrono::{DateTime, NaiveDateTime, Utc};

use super::cache::{FeedRecord, RemoteRecordCache};
use super::client::{Dataset, PageSource};
use super::error::{FeedError, RecordError};
use super::record::{FieldMatcher, Fields, RealtimeRecord};

/// Field holding the commercial line name an alert applies to.
pub const LINE_FIELD: &str = "ligne_com";

/// A traffic alert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Incident {
    pub kind: String,
    pub cause: String,
    pub starts_at: NaiveDateTime,
    pub ends_at: Option<NaiveDateTime>,
    pub mode: String,
    pub line_commercial: String,
    pub line_client: String,
    pub title: String,
    pub message: String,
    pub last_update: NaiveDateTime,
    pub number: String,
    pub severity_type: String,
    pub severity_level: String,
    pub object_type: String,
    pub object_list: String,
}

impl FeedRecord for Incident {
    fn parse(record: &RealtimeRecord) -> Result<Self, RecordError> {
        let fields = Fields::new(record, Dataset::INCIDENTS.name);

        Ok(Incident {
            kind: fields.text("type")?,
            cause: fields.text("cause")?,
            starts_at: fields.timestamp("debut")?,
            ends_at: fields.optional_timestamp("fin")?,
            mode: fields.text("mode")?,
            line_commercial: fields.text(LINE_FIELD)?,
            line_client: fields.text("ligne_cli")?,
            title: fields.text("titre")?,
            message: fields.text("message")?,
            last_update: fields.timestamp("last_update_fme")?,
            number: fields.text("n")?,
            severity_type: fields.text("typeseverite")?,
            severity_level: fields.text("niveauseverite")?,
            object_type: fields.text("typeobjet")?,
            object_list: fields.text("listeobjet")?,
        })
    }
}

/// Cache of the traffic alert dataset.
pub struct IncidentFeed {
    cache: RemoteRecordCache<Incident>,
}

impl IncidentFeed {
    pub fn new(source: Arc<dyn PageSource>, page_size: usize) -> Self {
        Self {
            cache: RemoteRecordCache::new(Dataset::INCIDENTS, source, page_size),
        }
    }

    /// Alerts whose commercial line matches `line_ref`.
    pub async fn get(
        &self,
        line_ref: &FieldMatcher,
        force_refetch: bool,
    ) -> Result<Vec<Incident>, FeedError> {
        if force_refetch {
            self.cache.refresh().await?;
        }
        Ok(self.cache.find_by_field(LINE_FIELD, line_ref).await)
    }

    pub async fn refresh(&self) -> Result<usize, FeedError> {
        self.cache.refresh().await
    }

    pub async fn refreshed_at(&self) -> Option<DateTime<Utc>> {
        self.cache.refreshed_at().await
    }

    pub fn cache(&self) -> &RemoteRecordCache<Incident> {
        &self.cache
    }
}
