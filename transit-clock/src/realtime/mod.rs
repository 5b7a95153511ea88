//! Live delay and incident feeds from the open-data platform.
//!
//! Each dataset is fetched page by page into an in-memory snapshot that is
//! replaced wholesale on refresh. Rows are parsed into typed records as
//! they are fetched, so a malformed row fails the refresh instead of a
//! later query.

mod cache;
mod client;
mod delay;
mod error;
mod feeds;
mod incident;
mod mock;
mod record;

pub use cache::{FeedRecord, RemoteRecordCache};
pub use client::{DEFAULT_BASE_URL, DEFAULT_PAGE_SIZE, Dataset, FeedClient, FeedConfig, PageSource};
pub use delay::{DelayFeed, DelayQuery, NextPassage, parse_delay};
pub use error::{FeedError, RecordError};
pub use feeds::Feeds;
pub use incident::{Incident, IncidentFeed};
pub use mock::MockSource;
pub use record::{FieldMatcher, RawRecord, RealtimeRecord};
