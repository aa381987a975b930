//! Single-slot offset cache.
//!
//! The dashboard access pattern is one active session issuing repeated
//! queries whose `from` bound drifts forward by minutes. A single process
//! slot keyed by the `from` instant captures that locality without a real
//! index: a later request reuses the located offset as long as its `from`
//! is within a bounded window past the cached one, the file has only grown,
//! and the line at the cached offset is still the line that was there when
//! the entry was recorded. The streaming reader re-applies `from` exactly,
//! so seeding from a slightly-earlier cached offset can never surface a
//! wrong match.

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use tokio::fs::File;

use crate::locate::{read_at, Located};

/// How far a request's `from` may drift past a cached entry's before the
/// entry stops being useful.
pub const CACHE_WINDOW_MS: i64 = 60 * 60 * 1000;

/// Extra bytes read past the validation line to detect it having grown.
const VALIDATION_SLACK: usize = 100;

#[derive(Debug, Clone)]
struct CacheEntry {
    /// `from` bound of the request that recorded the entry, in epoch millis.
    from_ms: i64,
    /// Located byte offset.
    offset: u64,
    /// Exact first line at `offset` when the entry was recorded.
    line: String,
    /// File size observed when the entry was recorded.
    file_size: u64,
}

/// Process-wide single-slot cache of one located offset.
///
/// Reads are frequent, writes rare (once per unique `from` window); the
/// `RwLock` serializes write-after-validate so updates are never torn. A
/// reader observing a just-invalidated entry is safe: validation re-reads
/// the file before the offset is trusted.
#[derive(Debug, Default)]
pub struct OffsetCache {
    slot: RwLock<Option<CacheEntry>>,
}

impl OffsetCache {
    /// Creates an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Looks up a validated offset for a request with the given `from` bound
    /// against a file of the given size.
    ///
    /// Returns `Some(offset)` only when every hit condition holds, including
    /// re-reading the validation line from the file. A failed validation
    /// read clears the slot.
    ///
    /// # Errors
    ///
    /// Returns an error when the validation read fails.
    pub async fn lookup(
        &self,
        file: &mut File,
        from: DateTime<Utc>,
        file_size: u64,
    ) -> std::io::Result<Option<u64>> {
        let entry = self.slot.read().clone();
        let Some(entry) = entry else {
            return Ok(None);
        };

        let from_ms = from.timestamp_millis();
        if file_size < entry.file_size
            || from_ms < entry.from_ms
            || from_ms - entry.from_ms > CACHE_WINDOW_MS
        {
            return Ok(None);
        }

        let buf = read_at(file, entry.offset, entry.line.len() + VALIDATION_SLACK).await?;
        let first = match buf.iter().position(|&b| b == b'\n') {
            Some(nl) => &buf[..nl],
            None => &buf[..],
        };
        if String::from_utf8_lossy(first) == entry.line {
            Ok(Some(entry.offset))
        } else {
            // The file rotated or was rewritten underneath us.
            *self.slot.write() = None;
            Ok(None)
        }
    }

    /// Records a freshly located offset, replacing any previous entry.
    pub fn store(&self, from: DateTime<Utc>, located: &Located, file_size: u64) {
        *self.slot.write() = Some(CacheEntry {
            from_ms: from.timestamp_millis(),
            offset: located.offset,
            line: located.line.clone(),
            file_size,
        });
    }

    /// Drops the cached entry.
    pub fn clear(&self) {
        *self.slot.write() = None;
    }

    /// Returns true when the slot currently holds an entry.
    #[must_use]
    pub fn is_populated(&self) -> bool {
        self.slot.read().is_some()
    }
}
