//! Upload start times.
//!
//! Records carry a free-text local timestamp of the form `D.M.YYYY_H:M:S`
//! without zero padding, e.g. `16.10.2026_9:5:3`. Listing sorts on the parsed
//! value.

use std::cmp::Ordering;

use chrono::{Datelike, Local, NaiveDate, NaiveDateTime, Timelike};

/// Render a timestamp in the record format.
pub fn format_start_time(time: NaiveDateTime) -> String {
    format!(
        "{}.{}.{}_{}:{}:{}",
        time.day(),
        time.month(),
        time.year(),
        time.hour(),
        time.minute(),
        time.second()
    )
}

/// Current local time in the record format.
pub fn now_start_time() -> String {
    format_start_time(Local::now().naive_local())
}

/// Parse a record timestamp. Returns `None` for anything malformed.
pub fn parse_start_time(value: &str) -> Option<NaiveDateTime> {
    let (date_part, time_part) = value.trim().split_once('_')?;

    let mut date = date_part.split('.').map(|p| p.trim().parse::<u32>());
    let day = date.next()?.ok()?;
    let month = date.next()?.ok()?;
    let year = date.next()?.ok()?;
    if date.next().is_some() {
        return None;
    }

    let mut time = time_part.split(':').map(|p| p.trim().parse::<u32>());
    let hour = time.next()?.ok()?;
    let minute = time.next()?.ok()?;
    let second = time.next()?.ok()?;
    if time.next().is_some() {
        return None;
    }

    NaiveDate::from_ymd_opt(i32::try_from(year).ok()?, month, day)?.and_hms_opt(hour, minute, second)
}

/// Newest-first ordering for two record timestamps.
///
/// Unparseable timestamps sort after every parseable one and compare equal to
/// each other, so a stable sort keeps their relative order.
pub fn newest_first(a: &str, b: &str) -> Ordering {
    match (parse_start_time(a), parse_start_time(b)) {
        (Some(a), Some(b)) => b.cmp(&a),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}
