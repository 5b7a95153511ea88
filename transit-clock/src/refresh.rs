//! Background refresh of the live feeds.

use std::time::Duration;

use chrono::{DateTime, Timelike, Utc};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{info, warn};

use crate::realtime::Feeds;

/// Interval between scheduled refreshes.
pub const REFRESH_INTERVAL: Duration = Duration::from_secs(60 * 60);

/// Time from `now` to the start of the next hour.
///
/// ```
/// use chrono::{TimeZone, Utc};
/// use std::time::Duration;
/// use transit_clock::refresh::until_next_hour;
///
/// let now = Utc.with_ymd_and_hms(2024, 3, 15, 8, 45, 0).unwrap();
/// assert_eq!(until_next_hour(now), Duration::from_secs(15 * 60));
/// ```
pub fn until_next_hour(now: DateTime<Utc>) -> Duration {
    let into_hour = u64::from(now.minute()) * 60 + u64::from(now.second());
    let nanos = u64::from(now.nanosecond().min(999_999_999));
    Duration::from_secs(3600 - into_hour) - Duration::from_nanos(nanos)
}

/// Refresh both feeds now, then at the top of every hour.
///
/// Failures are logged and retried on the next tick. The first refresh
/// runs in the task, so it does not hold up the caller.
pub fn spawn_refresh_task(feeds: Feeds) -> JoinHandle<()> {
    tokio::spawn(async move {
        refresh_once(&feeds).await;

        let start = Instant::now() + until_next_hour(Utc::now());
        let mut interval = tokio::time::interval_at(start, REFRESH_INTERVAL);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            interval.tick().await;
            refresh_once(&feeds).await;
        }
    })
}

async fn refresh_once(feeds: &Feeds) {
    info!("refreshing live feeds");
    match feeds.refresh_all().await {
        Ok(updated_at) => info!(?updated_at, "live feeds refreshed"),
        Err(e) => warn!(error = %e, "failed to refresh live feeds"),
    }
}
