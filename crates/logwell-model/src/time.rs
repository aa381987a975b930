//! The instant grammar.
//!
//! Timestamps in log records arrive in a handful of shapes. The grammar is
//! tried in order:
//!
//! 1. full instant with zone — `YYYY-MM-DDTHH:MM:SS(.sss)?(Z|±HH:MM)`
//! 2. naive instant — same without a zone, interpreted as local time
//! 3. space-separated — `YYYY-MM-DD HH:MM:SS(.sss)?`, local time
//! 4. date only — `YYYY-MM-DD`, midnight UTC
//!
//! Internally an instant is a `DateTime<Utc>` compared at millisecond
//! precision (`timestamp_millis`).

use chrono::{DateTime, Local, LocalResult, NaiveDate, NaiveDateTime, TimeZone, Utc};

/// Parses an instant string under the grammar above.
///
/// Returns `None` for anything that does not match one of the four forms.
#[must_use]
pub fn parse_instant(input: &str) -> Option<DateTime<Utc>> {
    let input = input.trim();
    if input.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(input) {
        return Some(dt.with_timezone(&Utc));
    }

    if let Ok(naive) = NaiveDateTime::parse_from_str(input, "%Y-%m-%dT%H:%M:%S%.f") {
        return local_to_utc(naive);
    }

    if let Ok(naive) = NaiveDateTime::parse_from_str(input, "%Y-%m-%d %H:%M:%S%.f") {
        return local_to_utc(naive);
    }

    if let Ok(date) = NaiveDate::parse_from_str(input, "%Y-%m-%d") {
        let midnight = date.and_hms_opt(0, 0, 0)?;
        return Some(Utc.from_utc_datetime(&midnight));
    }

    None
}

/// Resolves a zone-less timestamp against the local offset.
fn local_to_utc(naive: NaiveDateTime) -> Option<DateTime<Utc>> {
    match Local.from_local_datetime(&naive) {
        LocalResult::Single(dt) => Some(dt.with_timezone(&Utc)),
        // DST fold: take the earlier instant.
        LocalResult::Ambiguous(earlier, _) => Some(earlier.with_timezone(&Utc)),
        LocalResult::None => None,
    }
}
