//! Query filters over log records.

use chrono::{DateTime, Utc};

use crate::record::Record;

/// Filter criteria for a log query.
///
/// Time bounds are inclusive on both ends. `from > to` is not an error; such
/// a filter simply matches nothing.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LogFilter {
    /// Earliest instant to include (inclusive).
    pub from: Option<DateTime<Utc>>,
    /// Latest instant to include (inclusive).
    pub to: Option<DateTime<Utc>>,
    /// Level keywords to include (empty means all levels).
    pub levels: Vec<String>,
    /// Module keywords to include (empty means all modules).
    pub modules: Vec<String>,
    /// Maximum number of matches to emit (absent means unlimited).
    pub limit: Option<usize>,
    /// Matches to skip before the first emitted one (bulk reads only).
    pub offset: usize,
}

impl LogFilter {
    /// Creates an empty filter that matches every record.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the lower time bound.
    #[must_use]
    pub const fn with_from(mut self, from: DateTime<Utc>) -> Self {
        self.from = Some(from);
        self
    }

    /// Sets the upper time bound.
    #[must_use]
    pub const fn with_to(mut self, to: DateTime<Utc>) -> Self {
        self.to = Some(to);
        self
    }

    /// Adds a level keyword.
    #[must_use]
    pub fn with_level(mut self, level: impl Into<String>) -> Self {
        self.levels.push(level.into());
        self
    }

    /// Adds a module keyword.
    #[must_use]
    pub fn with_module(mut self, module: impl Into<String>) -> Self {
        self.modules.push(module.into());
        self
    }

    /// Sets the match limit.
    #[must_use]
    pub const fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Sets the match offset.
    #[must_use]
    pub const fn with_offset(mut self, offset: usize) -> Self {
        self.offset = offset;
        self
    }

    /// Returns true when the filter carries a time bound.
    #[must_use]
    pub const fn has_time_bound(&self) -> bool {
        self.from.is_some() || self.to.is_some()
    }

    /// Checks whether a record satisfies the filter.
    ///
    /// A record without a parsed timestamp is rejected whenever any time
    /// bound is set, and accepted (subject to the other criteria) otherwise.
    #[must_use]
    pub fn matches(&self, record: &Record) -> bool {
        if !self.levels.is_empty() && !self.levels.iter().any(|l| *l == record.level) {
            return false;
        }

        if !self.modules.is_empty() {
            match &record.module {
                Some(module) if self.modules.contains(module) => {}
                _ => return false,
            }
        }

        if self.has_time_bound() {
            let Some(ts) = record.timestamp else {
                return false;
            };
            if let Some(from) = self.from {
                if ts < from {
                    return false;
                }
            }
            if let Some(to) = self.to {
                if ts > to {
                    return false;
                }
            }
        }

        true
    }
}
