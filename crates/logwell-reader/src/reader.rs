//! Chunked streaming reads with filter evaluation and early exit.
//!
//! This module provides:
//! - [`LogReader`] — Streams matching records from a computed start offset
//! - [`ParseMode`] — Strict (indexing surfaces) vs permissive (user-facing
//!   bulk output that keeps stray lines)
//!
//! The reader emits matches in file byte order into a bounded channel; a
//! slow consumer parks the chunk loop and a dropped receiver terminates the
//! read promptly.

use std::io::SeekFrom;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tokio::sync::mpsc;

use logwell_model::{LogFilter, Record};

use crate::cache::OffsetCache;
use crate::error::{ReaderError, Result};
use crate::locate::locate;

/// Chunk size for streaming reads.
pub const CHUNK_BYTES: usize = 64 * 1024;

/// Files smaller than this are read from offset zero; the locator only pays
/// off once a linear scan would be slower than a handful of probes.
pub const INDEX_THRESHOLD: u64 = 1024 * 1024;

/// How each line of the file is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseMode {
    /// Only strict records are considered; noise lines are dropped silently.
    Strict,
    /// Stray lines are absorbed as synthesized records so user-facing output
    /// still contains them.
    Permissive,
}

/// Outcome of handling one complete line.
enum LineOutcome {
    Continue,
    Stop,
}

/// Streams records out of an NDJSON log file.
///
/// Cheap to clone; clones share the process-wide offset cache.
#[derive(Debug, Clone)]
pub struct LogReader {
    path: PathBuf,
    cache: Arc<OffsetCache>,
}

impl LogReader {
    /// Creates a reader over the given file, sharing the given cache.
    pub fn new(path: impl Into<PathBuf>, cache: Arc<OffsetCache>) -> Self {
        Self {
            path: path.into(),
            cache,
        }
    }

    /// Returns the path being read.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Streams matching records into `tx` and returns how many were sent.
    ///
    /// When the filter has a `from` bound and the file is large enough, the
    /// start offset comes from the offset cache or the locator; otherwise
    /// the read starts at byte zero. Only the bytes present when the stream
    /// opened are read: anything appended afterwards belongs to the tailer,
    /// so a caller composing a historical prefix with a live subscription
    /// never sees the same append twice. Reading stops at the filter's
    /// `limit`, when a strict record's time passes the `to` bound (records
    /// are assumed chronologically non-decreasing), or when the receiver is
    /// dropped.
    ///
    /// # Errors
    ///
    /// Returns an error when the file is missing or a read fails.
    pub async fn stream(
        &self,
        filter: &LogFilter,
        mode: ParseMode,
        tx: mpsc::Sender<Record>,
    ) -> Result<usize> {
        let mut file = File::open(&self.path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ReaderError::NotFound(self.path.clone())
            } else {
                ReaderError::Io(e)
            }
        })?;
        let size = file.metadata().await?.len();

        let start = match filter.from {
            Some(from) if size > INDEX_THRESHOLD => {
                match self.cache.lookup(&mut file, from, size).await? {
                    Some(offset) => offset,
                    None => {
                        let located = locate(&mut file, size, from).await?;
                        if located.is_empty() {
                            // Nothing at or after `from` anywhere in the file.
                            return Ok(0);
                        }
                        self.cache.store(from, &located, size);
                        located.offset
                    }
                }
            }
            _ => 0,
        };

        file.seek(SeekFrom::Start(start)).await?;

        let mut carry: Vec<u8> = Vec::new();
        let mut chunk = vec![0u8; CHUNK_BYTES];
        let mut emitted = 0usize;
        let mut stopped = false;
        // Bytes left of the snapshot taken above. Reading past it would race
        // concurrent appends into the historical segment.
        let mut remaining = size.saturating_sub(start);

        'chunks: loop {
            if remaining == 0 {
                break;
            }
            let want = remaining.min(chunk.len() as u64) as usize;
            let n = file.read(&mut chunk[..want]).await?;
            if n == 0 {
                break;
            }
            remaining -= n as u64;
            carry.extend_from_slice(&chunk[..n]);

            let mut consumed = 0usize;
            while let Some(rel) = carry[consumed..].iter().position(|&b| b == b'\n') {
                let end = consumed + rel;
                let line = String::from_utf8_lossy(&carry[consumed..end]).into_owned();
                consumed = end + 1;

                match handle_line(&line, filter, mode, &tx, &mut emitted).await {
                    LineOutcome::Continue => {}
                    LineOutcome::Stop => {
                        stopped = true;
                        break 'chunks;
                    }
                }
            }
            carry.drain(..consumed);
        }

        // A final line without a trailing newline still counts, but only
        // when the read ran to the end of the snapshot; a line truncated by
        // the snapshot boundary fails strict parsing and is dropped.
        if !stopped && !carry.is_empty() {
            let line = String::from_utf8_lossy(&carry).into_owned();
            let _ = handle_line(&line, filter, mode, &tx, &mut emitted).await;
        }

        Ok(emitted)
    }

    /// Runs a full read and collects the matches.
    ///
    /// # Errors
    ///
    /// Returns an error when the underlying stream fails.
    pub async fn collect(&self, filter: &LogFilter, mode: ParseMode) -> Result<Vec<Record>> {
        let (tx, mut rx) = mpsc::channel(256);
        let stream = self.stream(filter, mode, tx);
        let drain = async {
            let mut out = Vec::new();
            while let Some(record) = rx.recv().await {
                out.push(record);
            }
            out
        };
        let (sent, out) = tokio::join!(stream, drain);
        sent?;
        Ok(out)
    }
}

/// Parses, filters and forwards one complete line.
async fn handle_line(
    line: &str,
    filter: &LogFilter,
    mode: ParseMode,
    tx: &mpsc::Sender<Record>,
    emitted: &mut usize,
) -> LineOutcome {
    let record = match mode {
        ParseMode::Strict => Record::parse_strict(line),
        ParseMode::Permissive => Record::parse_permissive(line),
    };
    let Some(record) = record else {
        return LineOutcome::Continue;
    };

    // Early exit past the `to` bound. Only a timestamp that came off the
    // line itself counts; a synthesized clock reading must not truncate a
    // bounded query over older data.
    if let (Some(to), true, Some(ts)) = (filter.to, record.structured, record.timestamp) {
        if ts > to {
            return LineOutcome::Stop;
        }
    }

    if !filter.matches(&record) {
        return LineOutcome::Continue;
    }
    if tx.send(record).await.is_err() {
        // Receiver gone: the request was cancelled.
        return LineOutcome::Stop;
    }
    *emitted += 1;
    if let Some(limit) = filter.limit {
        if *emitted >= limit {
            return LineOutcome::Stop;
        }
    }
    LineOutcome::Continue
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Utc};
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn ts(s: &str) -> DateTime<Utc> {
        logwell_model::parse_instant(s).expect("test instant")
    }

    fn fixture(content: &str) -> NamedTempFile {
        let mut f = NamedTempFile::new().expect("temp file");
        f.write_all(content.as_bytes()).expect("write");
        f.flush().expect("flush");
        f
    }

    fn reader_for(f: &NamedTempFile) -> LogReader {
        LogReader::new(f.path(), Arc::new(OffsetCache::new()))
    }

    fn hourly_line(hour: u32, msg: &str) -> String {
        format!("{{\"level\":\"info\",\"time\":\"2025-12-14T{hour:02}:00:00Z\",\"msg\":\"{msg}\"}}\n")
    }

    #[tokio::test]
    async fn emits_all_records_in_order() {
        let content = [
            hourly_line(8, "a"),
            hourly_line(10, "b"),
            hourly_line(12, "c"),
        ]
        .concat();
        let f = fixture(&content);

        let records = reader_for(&f)
            .collect(&LogFilter::new(), ParseMode::Strict)
            .await
            .expect("collect");
        let msgs: Vec<&str> = records.iter().map(|r| r.msg.as_str()).collect();
        assert_eq!(msgs, vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn from_and_to_bounds_are_inclusive() {
        let content = [
            hourly_line(8, "a"),
            hourly_line(10, "b"),
            hourly_line(12, "c"),
            hourly_line(14, "d"),
        ]
        .concat();
        let f = fixture(&content);

        let filter = LogFilter::new()
            .with_from(ts("2025-12-14T10:00:00Z"))
            .with_to(ts("2025-12-14T12:00:00Z"));
        let records = reader_for(&f)
            .collect(&filter, ParseMode::Strict)
            .await
            .expect("collect");
        let msgs: Vec<&str> = records.iter().map(|r| r.msg.as_str()).collect();
        assert_eq!(msgs, vec!["b", "c"]);
    }

    #[tokio::test]
    async fn limit_stops_the_read() {
        let content: String = (0..20).map(|i| hourly_line(i, &format!("m{i}"))).collect();
        let f = fixture(&content);

        let filter = LogFilter::new().with_limit(5);
        let records = reader_for(&f)
            .collect(&filter, ParseMode::Strict)
            .await
            .expect("collect");
        assert_eq!(records.len(), 5);
        assert_eq!(records[4].msg, "m4");
    }

    #[tokio::test]
    async fn limit_is_not_exceeded_by_the_final_carry() {
        let content = format!(
            "{}{}",
            hourly_line(8, "kept"),
            r#"{"level":"info","time":"2025-12-14T10:00:00Z","msg":"beyond the limit"}"#
        );
        let f = fixture(&content);

        let filter = LogFilter::new().with_limit(1);
        let records = reader_for(&f)
            .collect(&filter, ParseMode::Strict)
            .await
            .expect("collect");
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].msg, "kept");
    }

    #[tokio::test]
    async fn strict_mode_drops_noise_permissive_keeps_it() {
        let content = format!(
            "{}garbage line\n\n{}",
            hourly_line(8, "a"),
            hourly_line(10, "b")
        );
        let f = fixture(&content);
        let reader = reader_for(&f);

        let strict = reader
            .collect(&LogFilter::new(), ParseMode::Strict)
            .await
            .expect("collect");
        assert_eq!(strict.len(), 2);

        let permissive = reader
            .collect(&LogFilter::new(), ParseMode::Permissive)
            .await
            .expect("collect");
        assert_eq!(permissive.len(), 3);
        assert_eq!(permissive[1].msg, "garbage line");
        assert!(!permissive[1].structured);
    }

    #[tokio::test]
    async fn synthesized_records_never_trigger_early_exit() {
        // A stray line (synthesized time = now) sits between old records; a
        // `to` bound in the past must not cut off the strict record behind it.
        let content = format!(
            "{}noise noise noise\n{}",
            hourly_line(8, "a"),
            hourly_line(10, "b")
        );
        let f = fixture(&content);

        let filter = LogFilter::new().with_to(ts("2025-12-14T12:00:00Z"));
        let records = reader_for(&f)
            .collect(&filter, ParseMode::Permissive)
            .await
            .expect("collect");
        let msgs: Vec<&str> = records.iter().map(|r| r.msg.as_str()).collect();
        assert_eq!(msgs, vec!["a", "b"]);
    }

    #[tokio::test]
    async fn final_carry_without_newline_is_emitted() {
        let content = format!(
            "{}{}",
            hourly_line(8, "a"),
            r#"{"level":"info","time":"2025-12-14T10:00:00Z","msg":"tail"}"#
        );
        let f = fixture(&content);

        let records = reader_for(&f)
            .collect(&LogFilter::new(), ParseMode::Strict)
            .await
            .expect("collect");
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].msg, "tail");
    }

    #[tokio::test]
    async fn lines_spanning_chunk_boundaries_reassemble() {
        // Each line is ~200 KiB, several times the 64 KiB chunk size.
        let payload = "x".repeat(200 * 1024);
        let mut content = String::new();
        for hour in 8..12 {
            content.push_str(&format!(
                "{{\"level\":\"info\",\"time\":\"2025-12-14T{hour:02}:00:00Z\",\"msg\":\"big\",\"data\":\"{payload}\"}}\n"
            ));
        }
        let f = fixture(&content);

        let records = reader_for(&f)
            .collect(&LogFilter::new(), ParseMode::Strict)
            .await
            .expect("collect");
        assert_eq!(records.len(), 4);
        for record in &records {
            assert_eq!(record.extra["data"].as_str().map(str::len), Some(payload.len()));
        }
    }

    #[tokio::test]
    async fn missing_file_reports_not_found() {
        let reader = LogReader::new("/nonexistent/logwell-test.ndjson", Arc::new(OffsetCache::new()));
        let err = reader
            .collect(&LogFilter::new(), ParseMode::Strict)
            .await
            .expect_err("missing file");
        assert!(matches!(err, ReaderError::NotFound(_)));
    }

    #[tokio::test]
    async fn appends_during_the_read_are_left_to_the_tailer() {
        // A one-slot channel parks the reader after its first send, so the
        // ordering is forced: the file grows while the historical read is
        // still in flight, and the appended record must not leak into it.
        let content = [
            hourly_line(8, "a"),
            hourly_line(9, "b"),
            hourly_line(10, "c"),
        ]
        .concat();
        let f = fixture(&content);
        let reader = reader_for(&f);

        let (tx, mut rx) = mpsc::channel(1);
        let handle = tokio::spawn({
            let reader = reader.clone();
            async move { reader.stream(&LogFilter::new(), ParseMode::Strict, tx).await }
        });

        let first = rx.recv().await.expect("first record");
        assert_eq!(first.msg, "a");

        // The reader is parked mid-send; grow the file underneath it.
        let mut file = std::fs::OpenOptions::new()
            .append(true)
            .open(f.path())
            .expect("open for append");
        file.write_all(hourly_line(11, "late").as_bytes())
            .expect("append");
        drop(file);

        let mut rest = Vec::new();
        while let Some(record) = rx.recv().await {
            rest.push(record.msg);
        }
        assert_eq!(rest, vec!["b", "c"]);

        let sent = handle.await.expect("join").expect("stream");
        assert_eq!(sent, 3);
    }

    #[tokio::test]
    async fn dropped_receiver_terminates_the_stream() {
        let content: String = (0..20).map(|i| hourly_line(i, "x")).collect();
        let f = fixture(&content);
        let reader = reader_for(&f);

        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        // Terminates promptly instead of erroring or hanging.
        let sent = reader
            .stream(&LogFilter::new(), ParseMode::Strict, tx)
            .await
            .expect("stream");
        assert_eq!(sent, 0);
    }

    /// Large-file path: the locator seeds the read and the cache warms up.
    fn large_fixture() -> NamedTempFile {
        let start = ts("2025-12-01T00:00:00Z");
        let pad = "p".repeat(160);
        let mut content = String::new();
        for i in 0..8_000 {
            let t = start + chrono::Duration::minutes(2 * i);
            content.push_str(&format!(
                "{{\"level\":\"info\",\"time\":\"{}\",\"msg\":\"tick {i}\",\"pad\":\"{pad}\"}}\n",
                t.to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
            ));
        }
        fixture(&content)
    }

    #[tokio::test]
    async fn seeded_read_equals_full_scan() {
        // The cache/locator seed must never lose a match: compare against a
        // filter-equivalent read from offset zero.
        let f = large_fixture();
        let cache = Arc::new(OffsetCache::new());
        let seeded_reader = LogReader::new(f.path(), Arc::clone(&cache));
        let filter = LogFilter::new()
            .with_from(ts("2025-12-08T00:00:00Z"))
            .with_to(ts("2025-12-08T06:00:00Z"));

        let seeded = seeded_reader
            .collect(&filter, ParseMode::Strict)
            .await
            .expect("seeded");
        assert!(cache.is_populated());

        // Re-run through the cache hit path.
        let cached = seeded_reader
            .collect(&filter, ParseMode::Strict)
            .await
            .expect("cached");

        // Ground truth: same filter over a small-file (unseeded) read of the
        // same bytes, by reading everything and filtering here.
        let all = seeded_reader
            .collect(&LogFilter::new(), ParseMode::Strict)
            .await
            .expect("all");
        let expected: Vec<_> = all.into_iter().filter(|r| filter.matches(r)).collect();

        assert_eq!(seeded, expected);
        assert_eq!(cached, expected);
        assert_eq!(seeded.first().map(|r| r.timestamp), expected.first().map(|r| r.timestamp));
    }

    #[tokio::test]
    async fn from_after_every_record_yields_nothing() {
        let f = large_fixture();
        let filter = LogFilter::new().with_from(ts("2026-06-01T00:00:00Z"));
        let records = reader_for(&f)
            .collect(&filter, ParseMode::Strict)
            .await
            .expect("collect");
        assert!(records.is_empty());
    }
}
