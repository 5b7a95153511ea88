//! GTFS clock time handling.
//!
//! GTFS expresses stop times as "HH:MM:SS" measured from the start of a
//! service day. A service day can run past midnight, so hours may be 24 or
//! more: "25:10:00" belongs to the same service date as "08:00:00" but
//! happens at 01:10 on the following calendar day. This module provides the
//! types for resolving such times to absolute, timezone-aware instants.

use chrono::{DateTime, Duration, LocalResult, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Timelike};
use chrono_tz::Tz;
use std::fmt;

/// Local hour before which the previous calendar date is still the active
/// service day.
pub const SERVICE_DAY_START_HOUR: u32 = 4;

const SECS_PER_DAY: u32 = 24 * 60 * 60;

/// Error returned when parsing an invalid clock time string.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid clock time: {reason}")]
pub struct TimeError {
    reason: &'static str,
}

impl TimeError {
    fn new(reason: &'static str) -> Self {
        Self { reason }
    }
}

/// A scheduled time of day relative to the start of a service day.
///
/// Unlike [`NaiveTime`], a `ClockTime` may exceed 24 hours.
///
/// # Examples
///
/// ```
/// use transit_clock::domain::ClockTime;
///
/// let t = ClockTime::parse("25:10:00").unwrap();
/// assert_eq!(t.day_offset(), 1);
/// assert_eq!(t.to_string(), "25:10:00");
/// ```
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClockTime(u32);

impl ClockTime {
    /// Create a clock time from seconds since the start of the service day.
    pub fn from_secs(secs: u32) -> Self {
        Self(secs)
    }

    /// The clock time of a wall-clock time of day (always < 24h).
    pub fn of_day(time: NaiveTime) -> Self {
        Self(time.num_seconds_from_midnight())
    }

    /// Parse "HH:MM:SS" or "HH:MM".
    ///
    /// Hours may have one or more digits and may be 24 or above. Minutes and
    /// seconds must have exactly two digits and be below 60.
    ///
    /// # Examples
    ///
    /// ```
    /// use transit_clock::domain::ClockTime;
    ///
    /// assert!(ClockTime::parse("08:30:00").is_ok());
    /// assert!(ClockTime::parse("8:30:00").is_ok());
    /// assert!(ClockTime::parse("26:05").is_ok());
    ///
    /// assert!(ClockTime::parse("08:60:00").is_err());
    /// assert!(ClockTime::parse("08-30-00").is_err());
    /// assert!(ClockTime::parse("").is_err());
    /// ```
    pub fn parse(s: &str) -> Result<Self, TimeError> {
        let mut parts = s.split(':');

        let hours = parts
            .next()
            .filter(|h| !h.is_empty() && h.len() <= 3)
            .and_then(|h| h.parse::<u32>().ok())
            .ok_or_else(|| TimeError::new("invalid hour digits"))?;

        let minutes = parts
            .next()
            .and_then(|m| parse_two_digits(m.as_bytes()))
            .ok_or_else(|| TimeError::new("invalid minute digits"))?;
        if minutes > 59 {
            return Err(TimeError::new("minute must be 0-59"));
        }

        let seconds = match parts.next() {
            Some(sec) => parse_two_digits(sec.as_bytes())
                .ok_or_else(|| TimeError::new("invalid second digits"))?,
            None => 0,
        };
        if seconds > 59 {
            return Err(TimeError::new("second must be 0-59"));
        }

        if parts.next().is_some() {
            return Err(TimeError::new("expected HH:MM:SS format"));
        }

        Ok(Self(hours * 3600 + minutes * 60 + seconds))
    }

    /// Seconds since the start of the service day.
    pub fn secs(&self) -> u32 {
        self.0
    }

    /// Hours since the start of the service day (may be 24 or more).
    pub fn hours(&self) -> u32 {
        self.0 / 3600
    }

    pub fn minutes(&self) -> u32 {
        (self.0 / 60) % 60
    }

    pub fn seconds(&self) -> u32 {
        self.0 % 60
    }

    /// Number of whole days past the service date.
    pub fn day_offset(&self) -> u32 {
        self.0 / SECS_PER_DAY
    }

    /// The wall-clock time of day this clock time falls on.
    pub fn time_of_day(&self) -> NaiveTime {
        NaiveTime::from_num_seconds_from_midnight_opt(self.0 % SECS_PER_DAY, 0)
            .unwrap_or(NaiveTime::MIN)
    }

    /// The local date and time this clock time falls on for a service date.
    pub fn on(&self, service_date: NaiveDate) -> Option<NaiveDateTime> {
        let date = service_date.checked_add_signed(Duration::days(i64::from(self.day_offset())))?;
        Some(date.and_time(self.time_of_day()))
    }

    /// Resolve to an absolute instant in `tz` for the given service date.
    ///
    /// # Examples
    ///
    /// ```
    /// use transit_clock::domain::ClockTime;
    /// use chrono::{NaiveDate, Timelike};
    ///
    /// let date = NaiveDate::from_ymd_opt(2024, 6, 15).unwrap();
    /// let t = ClockTime::parse("24:30:00").unwrap();
    /// let resolved = t.resolve(date, &chrono_tz::Europe::Paris).unwrap();
    ///
    /// assert_eq!(resolved.date_naive(), NaiveDate::from_ymd_opt(2024, 6, 16).unwrap());
    /// assert_eq!(resolved.hour(), 0);
    /// assert_eq!(resolved.minute(), 30);
    /// ```
    pub fn resolve(&self, service_date: NaiveDate, tz: &Tz) -> Result<DateTime<Tz>, TimeError> {
        let local = self
            .on(service_date)
            .ok_or_else(|| TimeError::new("date overflow"))?;
        localize(local, tz).ok_or_else(|| TimeError::new("local time does not exist"))
    }
}

impl fmt::Debug for ClockTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ClockTime({self})")
    }
}

impl fmt::Display for ClockTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:02}:{:02}:{:02}",
            self.hours(),
            self.minutes(),
            self.seconds()
        )
    }
}

/// Attach a timezone to a local date and time.
///
/// Ambiguous local times (clocks going back) take the earlier instant. Times
/// inside a DST gap (clocks going forward) are shifted forward by one hour.
pub fn localize(local: NaiveDateTime, tz: &Tz) -> Option<DateTime<Tz>> {
    match tz.from_local_datetime(&local) {
        LocalResult::Single(t) => Some(t),
        LocalResult::Ambiguous(earliest, _) => Some(earliest),
        LocalResult::None => tz
            .from_local_datetime(&(local + Duration::hours(1)))
            .earliest(),
    }
}

/// The service date active at `now`.
///
/// Service runs from roughly 04:00 until the small hours of the next
/// calendar day, so before [`SERVICE_DAY_START_HOUR`] the previous date is
/// still current.
///
/// # Examples
///
/// ```
/// use transit_clock::domain::service_day;
/// use chrono::{NaiveDate, TimeZone};
///
/// let tz = chrono_tz::Europe::Paris;
/// let early = tz.with_ymd_and_hms(2024, 3, 15, 2, 30, 0).unwrap();
/// let later = tz.with_ymd_and_hms(2024, 3, 15, 4, 0, 0).unwrap();
///
/// assert_eq!(service_day(&early), NaiveDate::from_ymd_opt(2024, 3, 14).unwrap());
/// assert_eq!(service_day(&later), NaiveDate::from_ymd_opt(2024, 3, 15).unwrap());
/// ```
pub fn service_day(now: &DateTime<Tz>) -> NaiveDate {
    let today = now.date_naive();
    if now.hour() < SERVICE_DAY_START_HOUR {
        today.pred_opt().unwrap_or(today)
    } else {
        today
    }
}

/// Parse two ASCII digit bytes into a u32.
fn parse_two_digits(bytes: &[u8]) -> Option<u32> {
    if bytes.len() != 2 {
        return None;
    }
    let d1 = (bytes[0] as char).to_digit(10)?;
    let d2 = (bytes[1] as char).to_digit(10)?;
    Some(d1 * 10 + d2)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono_tz::Europe::Paris;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn parse_valid_times() {
        let t = ClockTime::parse("00:00:00").unwrap();
        assert_eq!(t.secs(), 0);

        let t = ClockTime::parse("08:45:30").unwrap();
        assert_eq!(t.hours(), 8);
        assert_eq!(t.minutes(), 45);
        assert_eq!(t.seconds(), 30);

        let t = ClockTime::parse("27:05:00").unwrap();
        assert_eq!(t.hours(), 27);
        assert_eq!(t.day_offset(), 1);
    }

    #[test]
    fn parse_without_seconds() {
        let t = ClockTime::parse("14:30").unwrap();
        assert_eq!(t.secs(), 14 * 3600 + 30 * 60);
    }

    #[test]
    fn parse_invalid_format() {
        assert!(ClockTime::parse("1430").is_err());
        assert!(ClockTime::parse("14:3").is_err());
        assert!(ClockTime::parse("14:30:0").is_err());
        assert!(ClockTime::parse("14:30:00:00").is_err());
        assert!(ClockTime::parse("ab:cd:ef").is_err());
        assert!(ClockTime::parse(":30:00").is_err());
    }

    #[test]
    fn parse_invalid_values() {
        assert!(ClockTime::parse("12:60:00").is_err());
        assert!(ClockTime::parse("12:00:60").is_err());
    }

    #[test]
    fn display_pads_and_keeps_extended_hours() {
        assert_eq!(ClockTime::parse("8:05:09").unwrap().to_string(), "08:05:09");
        assert_eq!(ClockTime::parse("25:00:00").unwrap().to_string(), "25:00:00");
    }

    #[test]
    fn of_day_matches_parse() {
        let time = NaiveTime::from_hms_opt(9, 15, 0).unwrap();
        assert_eq!(ClockTime::of_day(time), ClockTime::parse("09:15:00").unwrap());
    }

    #[test]
    fn resolve_same_day() {
        let t = ClockTime::parse("08:30:00").unwrap();
        let resolved = t.resolve(date(2024, 3, 15), &Paris).unwrap();
        assert_eq!(resolved.date_naive(), date(2024, 3, 15));
        assert_eq!(resolved.hour(), 8);
        assert_eq!(resolved.minute(), 30);
    }

    #[test]
    fn resolve_past_midnight_moves_to_next_date() {
        let t = ClockTime::parse("25:10:00").unwrap();
        let resolved = t.resolve(date(2024, 12, 31), &Paris).unwrap();
        assert_eq!(resolved.date_naive(), date(2025, 1, 1));
        assert_eq!(resolved.hour(), 1);
        assert_eq!(resolved.minute(), 10);
    }

    #[test]
    fn resolve_inside_dst_gap_shifts_forward() {
        // Clocks in Paris jump from 02:00 to 03:00 on 2024-03-31.
        let t = ClockTime::parse("02:30:00").unwrap();
        let resolved = t.resolve(date(2024, 3, 31), &Paris).unwrap();
        assert_eq!(resolved.hour(), 3);
        assert_eq!(resolved.minute(), 30);
    }

    #[test]
    fn resolve_ambiguous_takes_earliest() {
        // Clocks in Paris go back from 03:00 to 02:00 on 2024-10-27.
        let t = ClockTime::parse("02:30:00").unwrap();
        let resolved = t.resolve(date(2024, 10, 27), &Paris).unwrap();
        let other = Paris.with_ymd_and_hms(2024, 10, 27, 2, 30, 0).latest().unwrap();
        assert!(resolved < other);
    }

    #[test]
    fn service_day_before_four_is_yesterday() {
        let now = Paris.with_ymd_and_hms(2024, 3, 1, 3, 59, 59).unwrap();
        assert_eq!(service_day(&now), date(2024, 2, 29));

        let now = Paris.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap();
        assert_eq!(service_day(&now), date(2024, 2, 29));
    }

    #[test]
    fn service_day_from_four_is_today() {
        let now = Paris.with_ymd_and_hms(2024, 3, 1, 4, 0, 0).unwrap();
        assert_eq!(service_day(&now), date(2024, 3, 1));

        let now = Paris.with_ymd_and_hms(2024, 3, 1, 23, 59, 0).unwrap();
        assert_eq!(service_day(&now), date(2024, 3, 1));
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    prop_compose! {
        fn valid_date()(
            year in 2000i32..2100,
            month in 1u32..=12,
            day in 1u32..=28  // Safe for all months
        ) -> NaiveDate {
            NaiveDate::from_ymd_opt(year, month, day).unwrap()
        }
    }

    proptest! {
        /// Hours in [24, 30) land on the next date at HH-24:MM:SS.
        #[test]
        fn extended_hours_roll_to_next_date(
            hour in 24u32..30,
            minute in 0u32..60,
            second in 0u32..60,
            date in valid_date()
        ) {
            let s = format!("{hour:02}:{minute:02}:{second:02}");
            let resolved = ClockTime::parse(&s)
                .unwrap()
                .resolve(date, &chrono_tz::UTC)
                .unwrap();

            prop_assert_eq!(resolved.date_naive(), date.succ_opt().unwrap());
            prop_assert_eq!(resolved.hour(), hour - 24);
            prop_assert_eq!(resolved.minute(), minute);
            prop_assert_eq!(resolved.second(), second);
        }

        /// Parse then display roundtrips for canonical strings.
        #[test]
        fn parse_display_roundtrip(hour in 0u32..48, minute in 0u32..60, second in 0u32..60) {
            let s = format!("{hour:02}:{minute:02}:{second:02}");
            prop_assert_eq!(ClockTime::parse(&s).unwrap().to_string(), s);
        }

        /// Ordering of clock times agrees with ordering of resolved instants.
        #[test]
        fn ordering_matches_resolution(
            a in 0u32..(30 * 3600),
            b in 0u32..(30 * 3600),
            date in valid_date()
        ) {
            let ta = ClockTime::from_secs(a);
            let tb = ClockTime::from_secs(b);
            let ra = ta.resolve(date, &chrono_tz::UTC).unwrap();
            let rb = tb.resolve(date, &chrono_tz::UTC).unwrap();
            prop_assert_eq!(ta.cmp(&tb), ra.cmp(&rb));
        }
    }
}
