//! Plain-text record formatting for the raw export endpoint.

use chrono::SecondsFormat;
use serde_json::Value;

use crate::record::Record;

/// Formats a record as one line of plain text:
///
/// `YYYY-MM-DD HH:MM:SS.sss [level] module: msg (k1=v1 k2=v2…)`
///
/// The module segment is omitted when the record has none; the trailing
/// parenthesized extras are omitted when the record carries no extra keys.
/// Records whose `time` never parsed print the raw string instead.
#[must_use]
pub fn format_record(record: &Record) -> String {
    let time = match record.timestamp {
        Some(ts) => ts.format("%Y-%m-%d %H:%M:%S%.3f").to_string(),
        None => record.time.clone(),
    };

    let mut line = format!("{time} [{}] ", record.level);
    if let Some(module) = &record.module {
        line.push_str(module);
        line.push_str(": ");
    }
    line.push_str(&record.msg);

    if !record.extra.is_empty() {
        line.push_str(" (");
        for (i, (key, value)) in record.extra.iter().enumerate() {
            if i > 0 {
                line.push(' ');
            }
            line.push_str(key);
            line.push('=');
            match value {
                Value::String(s) => line.push_str(s),
                other => line.push_str(&other.to_string()),
            }
        }
        line.push(')');
    }

    line
}

/// Formats a record's instant back to its canonical RFC 3339 form, falling
/// back to the raw string for records that never parsed.
#[must_use]
pub fn canonical_time(record: &Record) -> String {
    match record.timestamp {
        Some(ts) => ts.to_rfc3339_opts(SecondsFormat::Millis, true),
        None => record.time.clone(),
    }
}
