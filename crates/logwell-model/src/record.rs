//! The log record model and line parsers.
//!
//! This module provides:
//! - [`Record`] — A parsed NDJSON record with an open set of extra keys
//! - [`Record::parse_strict`] — The indexing parser; only lines whose `time`
//!   field parses under the instant grammar are accepted
//! - [`Record::parse_permissive`] — The user-facing parser; stray non-JSON
//!   lines are absorbed as synthesized records

use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use serde_json::{Map, Value};

use crate::time::parse_instant;

/// A single log record.
///
/// The four well-known fields are lifted out of the JSON object; everything
/// else is preserved in `extra` and travels through serialization unchanged.
/// A record is *strict* iff `timestamp` is `Some`, i.e. its `time` field
/// parsed under the instant grammar. Only strict records participate in
/// offset indexing.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Record {
    /// Severity keyword, normalized to lowercase. Defaults to `info`.
    pub level: String,
    /// The raw instant string as it appeared on disk.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub time: String,
    /// The log message.
    pub msg: String,
    /// Optional short module keyword.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub module: Option<String>,
    /// Open set of additional keys, preserved verbatim.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
    /// The parsed instant; `Some` iff the record is strict.
    #[serde(skip)]
    pub timestamp: Option<DateTime<Utc>>,
    /// Whether the record came from a JSON object (as opposed to being
    /// synthesized from a stray line by the permissive parser).
    #[serde(skip)]
    pub structured: bool,
}

impl Record {
    /// Parses a line strictly.
    ///
    /// Returns `None` for blank lines, non-JSON lines, JSON non-objects and
    /// objects whose `time` field does not parse under the instant grammar.
    /// The returned record always has `timestamp: Some(_)`.
    #[must_use]
    pub fn parse_strict(line: &str) -> Option<Self> {
        let record = Self::from_json_line(line)?;
        if record.timestamp.is_none() {
            return None;
        }
        Some(record)
    }

    /// Parses a line permissively.
    ///
    /// JSON objects are parsed as in [`Self::parse_strict`] but an
    /// unparseable `time` is tolerated (`timestamp: None`). A non-JSON line
    /// yields a synthesized record with `level = "info"`, the raw line as
    /// `msg` and the current instant. Returns `None` only for blank lines.
    #[must_use]
    pub fn parse_permissive(line: &str) -> Option<Self> {
        if line.trim().is_empty() {
            return None;
        }
        if let Some(record) = Self::from_json_line(line) {
            return Some(record);
        }

        let now = Utc::now();
        Some(Self {
            level: "info".to_string(),
            time: now.to_rfc3339_opts(SecondsFormat::Millis, true),
            msg: line.to_string(),
            module: None,
            extra: Map::new(),
            timestamp: Some(now),
            structured: false,
        })
    }

    /// Extracts just the instant from a strict line.
    ///
    /// Convenience for the offset locator, which compares timestamps and
    /// discards the rest of the record.
    #[must_use]
    pub fn strict_time(line: &str) -> Option<DateTime<Utc>> {
        Self::parse_strict(line).and_then(|r| r.timestamp)
    }

    /// Parses a JSON object line into a record, lifting the well-known keys.
    fn from_json_line(line: &str) -> Option<Self> {
        let trimmed = line.trim();
        if !trimmed.starts_with('{') {
            return None;
        }
        let value: Value = serde_json::from_str(trimmed).ok()?;
        let Value::Object(mut obj) = value else {
            return None;
        };

        // The well-known keys are consumed even when they carry a non-string
        // value; they never end up duplicated in `extra`.
        let level = take_string(&mut obj, "level")
            .map(|s| s.to_ascii_lowercase())
            .unwrap_or_else(|| "info".to_string());
        let time = take_string(&mut obj, "time").unwrap_or_default();
        let msg = take_string(&mut obj, "msg").unwrap_or_default();
        let module = take_string(&mut obj, "module");
        let timestamp = parse_instant(&time);

        Some(Self {
            level,
            time,
            msg,
            module,
            extra: obj,
            timestamp,
            structured: true,
        })
    }
}

/// Removes `key` from the object, keeping its value only when it is a string.
fn take_string(obj: &mut Map<String, Value>, key: &str) -> Option<String> {
    match obj.remove(key) {
        Some(Value::String(s)) => Some(s),
        _ => None,
    }
}
