#![forbid(unsafe_code)]

//! Timestamp parsing for the shapes the catalog APIs emit, and the inclusive
//! date window used to filter media.

use std::sync::LazyLock;

use chrono::{DateTime, Days, NaiveDate, NaiveDateTime, TimeZone, Utc};
use regex::Regex;

use crate::error::{ConfigError, DateParseError};

static FRACTIONAL_ZULU: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\.\d+Z$").expect("static regex"));

const NAIVE_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";
const PUBMEDIA_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Number of days `--latest` reaches back from the start of today.
pub const LATEST_WINDOW_DAYS: u64 = 31;

/// Parses a mediator timestamp into UTC, truncated to whole seconds.
///
/// The usual shape is `2021-06-25T10:00:00.123Z`: a trailing `.<digits>Z`
/// is stripped and the rest is read as naive UTC, as is a bare
/// `2021-06-25T10:00:00`. Anything else must be RFC 3339 with an offset.
pub fn parse_date(raw: &str) -> Result<DateTime<Utc>, DateParseError> {
    let stripped = FRACTIONAL_ZULU.replace(raw, "");
    if let Ok(naive) = NaiveDateTime::parse_from_str(&stripped, NAIVE_FORMAT) {
        return Ok(naive.and_utc());
    }
    DateTime::parse_from_rfc3339(raw)
        .map(|parsed| parsed.with_timezone(&Utc))
        .map_err(|_| DateParseError {
            raw: raw.to_owned(),
        })
}

/// Parses the publication-media `modifiedDatetime` format
/// (`2026-01-18 19:25:59`, UTC).
pub fn parse_pubmedia_date(raw: &str) -> Result<DateTime<Utc>, DateParseError> {
    NaiveDateTime::parse_from_str(raw, PUBMEDIA_FORMAT)
        .map(|naive| naive.and_utc())
        .map_err(|_| DateParseError {
            raw: raw.to_owned(),
        })
}

/// `true` when `ts` falls inside `[min, max]`. A `max` of zero or below
/// means the window is open-ended.
pub fn in_window(ts: i64, min: i64, max: i64) -> bool {
    ts >= min && (max <= 0 || ts <= max)
}

/// Parses a `YYYY-MM-DD` command-line date into epoch seconds at UTC
/// midnight.
pub fn parse_day(raw: &str) -> Result<i64, ConfigError> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc().timestamp())
        .ok_or_else(|| ConfigError::InvalidDay(raw.to_owned()))
}

/// Window covering the last [`LATEST_WINDOW_DAYS`] days through the end of
/// `today`, as `(min, max)` epoch seconds in the zone of `today`.
pub fn latest_window<Tz: TimeZone>(today: &DateTime<Tz>) -> (i64, i64) {
    let zone = today.timezone();
    let local_midnight = |date: NaiveDate| {
        date.and_hms_opt(0, 0, 0)
            .and_then(|naive| zone.from_local_datetime(&naive).earliest())
            .map(|start| start.timestamp())
    };
    let date = today.date_naive();
    let start_of_today = local_midnight(date).unwrap_or_else(|| today.timestamp());
    let min = date
        .checked_sub_days(Days::new(LATEST_WINDOW_DAYS))
        .and_then(local_midnight)
        .unwrap_or(start_of_today - (LATEST_WINDOW_DAYS as i64) * 86_400);
    let max = date
        .checked_add_days(Days::new(1))
        .and_then(local_midnight)
        .map(|end| end - 1)
        .unwrap_or(start_of_today + 86_399);
    (min, max)
}
