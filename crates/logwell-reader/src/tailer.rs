//! Live tailing of the log file with broadcast fan-out.
//!
//! This module provides:
//! - [`Tailer`] — Owns the watch task and the broadcast channel
//! - [`TailStream`] — A filtered, per-subscriber async stream of new records
//!
//! The watcher polls the file's size. Growth reads exactly the appended
//! byte range, reassembles lines across polls through a carry buffer and
//! strict-parses complete lines; every parsed record is broadcast once and
//! filtered on the receive side, so subscribing and unsubscribing never
//! perturbs delivery to the other subscribers. A shrinking size is a
//! rotation: bookkeeping resets to byte zero and pre-rotation content is
//! never replayed.

use std::io::SeekFrom;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::task::{ready, Context, Poll};
use std::time::Duration;

use futures::Stream;
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_stream::wrappers::BroadcastStream;
use tracing::{debug, warn};

use logwell_model::{LogFilter, Record};

/// Default poll interval for the size watcher.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Broadcast capacity per tailer; a lagged subscriber skips rather than
/// stalling the watcher.
const TAIL_BUFFER: usize = 1024;

/// Read size while draining appended bytes.
const DRAIN_CHUNK: usize = 64 * 1024;

/// Watches one log file and fans new records out to subscribers.
///
/// The watch task is aborted when the tailer is dropped, which also closes
/// every [`TailStream`].
#[derive(Debug)]
pub struct Tailer {
    sender: broadcast::Sender<Record>,
    watcher: JoinHandle<()>,
    path: PathBuf,
}

impl Tailer {
    /// Spawns the watch task over the given path.
    ///
    /// The file may not exist yet; the watcher picks it up once it appears.
    #[must_use]
    pub fn spawn(path: impl Into<PathBuf>, poll_interval: Duration) -> Self {
        let path = path.into();
        let (sender, _) = broadcast::channel(TAIL_BUFFER);
        let task_path = path.clone();
        let task_sender = sender.clone();
        let watcher = tokio::spawn(async move {
            watch_loop(&task_path, poll_interval, &task_sender).await;
        });

        Self {
            sender,
            watcher,
            path,
        }
    }

    /// Registers a live subscriber with its own filter.
    ///
    /// Only records appended after this call are delivered. Dropping the
    /// returned stream unsubscribes.
    #[must_use]
    pub fn subscribe(&self, filter: LogFilter) -> TailStream {
        TailStream {
            inner: BroadcastStream::new(self.sender.subscribe()),
            filter,
        }
    }

    /// Returns the number of live subscribers.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }

    /// Returns the watched path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for Tailer {
    fn drop(&mut self) {
        self.watcher.abort();
    }
}

/// The poll loop: stat, diff, drain, repeat.
async fn watch_loop(path: &Path, poll_interval: Duration, sender: &broadcast::Sender<Record>) {
    // Existing content belongs to historical reads, not the tail.
    let mut last_size = tokio::fs::metadata(path).await.map_or(0, |m| m.len());
    let mut carry: Vec<u8> = Vec::new();
    let mut ticker = tokio::time::interval(poll_interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    loop {
        ticker.tick().await;

        let size = match tokio::fs::metadata(path).await {
            Ok(meta) => meta.len(),
            // Absent mid-rotation; start over when it reappears.
            Err(_) => {
                last_size = 0;
                carry.clear();
                continue;
            }
        };

        if size < last_size {
            debug!(path = %path.display(), size, last_size, "log file shrank, treating as rotation");
            last_size = 0;
            carry.clear();
        }

        if size > last_size {
            match drain_appended(path, last_size, size, &mut carry, sender).await {
                Ok(()) => last_size = size,
                Err(e) => {
                    warn!(error = %e, path = %path.display(), "failed to read appended bytes");
                    // Skip the unreadable window instead of re-reading it
                    // forever; the next append resumes delivery.
                    carry.clear();
                    last_size = size;
                }
            }
        }
    }
}

/// Reads `[from, to)`, splits complete lines off the carry and broadcasts
/// every strict record.
async fn drain_appended(
    path: &Path,
    from: u64,
    to: u64,
    carry: &mut Vec<u8>,
    sender: &broadcast::Sender<Record>,
) -> std::io::Result<()> {
    let mut file = File::open(path).await?;
    file.seek(SeekFrom::Start(from)).await?;

    let mut remaining = (to - from) as usize;
    let mut chunk = vec![0u8; DRAIN_CHUNK.min(remaining.max(1))];
    while remaining > 0 {
        let want = remaining.min(chunk.len());
        let n = file.read(&mut chunk[..want]).await?;
        if n == 0 {
            break;
        }
        carry.extend_from_slice(&chunk[..n]);
        remaining -= n;
    }

    let mut consumed = 0usize;
    while let Some(rel) = carry[consumed..].iter().position(|&b| b == b'\n') {
        let end = consumed + rel;
        let line = String::from_utf8_lossy(&carry[consumed..end]);
        if let Some(record) = Record::parse_strict(&line) {
            // No receivers is fine; the send just reports zero deliveries.
            let _ = sender.send(record);
        }
        consumed = end + 1;
    }
    carry.drain(..consumed);

    Ok(())
}

/// Async stream of live records matching one subscriber's filter.
///
/// A filtered view over the tailer's broadcast channel: records the filter
/// rejects are swallowed, a lagged gap is logged and skipped, and the
/// stream ends once the tailer is gone.
pub struct TailStream {
    inner: BroadcastStream<Record>,
    filter: LogFilter,
}

impl Stream for TailStream {
    type Item = Record;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        loop {
            let next = ready!(Pin::new(&mut this.inner).poll_next(cx));
            match next {
                Some(Ok(record)) if this.filter.matches(&record) => {
                    return Poll::Ready(Some(record));
                }
                Some(Ok(_)) => {}
                Some(Err(BroadcastStreamRecvError::Lagged(skipped))) => {
                    warn!(skipped, "tail subscriber lagged, records skipped");
                }
                None => return Poll::Ready(None),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;
    use std::io::Write;
    use tempfile::NamedTempFile;
    use tokio::time::timeout;

    const POLL: Duration = Duration::from_millis(20);
    const WAIT: Duration = Duration::from_secs(5);

    fn record_line(hour: u32, level: &str, msg: &str) -> String {
        format!("{{\"level\":\"{level}\",\"time\":\"2025-12-14T{hour:02}:00:00Z\",\"msg\":\"{msg}\"}}\n")
    }

    fn append(file: &NamedTempFile, content: &str) {
        let mut f = std::fs::OpenOptions::new()
            .append(true)
            .open(file.path())
            .expect("open for append");
        f.write_all(content.as_bytes()).expect("append");
        f.flush().expect("flush");
    }

    #[tokio::test]
    async fn delivers_appended_records() {
        let file = NamedTempFile::new().expect("temp file");
        let tailer = Tailer::spawn(file.path(), POLL);
        let mut stream = tailer.subscribe(LogFilter::new());

        append(&file, &record_line(10, "info", "live one"));
        let record = timeout(WAIT, stream.next())
            .await
            .expect("no timeout")
            .expect("record");
        assert_eq!(record.msg, "live one");

        append(&file, &record_line(11, "info", "live two"));
        let record = timeout(WAIT, stream.next())
            .await
            .expect("no timeout")
            .expect("record");
        assert_eq!(record.msg, "live two");
    }

    #[tokio::test]
    async fn existing_content_is_not_replayed() {
        let file = NamedTempFile::new().expect("temp file");
        append(&file, &record_line(8, "info", "old"));

        let tailer = Tailer::spawn(file.path(), POLL);
        let mut stream = tailer.subscribe(LogFilter::new());
        // Give the watcher a few polls before appending.
        tokio::time::sleep(POLL * 4).await;

        append(&file, &record_line(10, "info", "new"));
        let record = timeout(WAIT, stream.next())
            .await
            .expect("no timeout")
            .expect("record");
        assert_eq!(record.msg, "new");
    }

    #[tokio::test]
    async fn rotation_resets_without_replay() {
        let file = NamedTempFile::new().expect("temp file");
        append(&file, &record_line(8, "info", "pre-rotation one"));
        append(&file, &record_line(9, "info", "pre-rotation two"));

        let tailer = Tailer::spawn(file.path(), POLL);
        let mut stream = tailer.subscribe(LogFilter::new());
        tokio::time::sleep(POLL * 4).await;

        // Truncate, then append a single new record.
        std::fs::write(file.path(), "").expect("truncate");
        tokio::time::sleep(POLL * 4).await;
        append(&file, &record_line(10, "info", "fresh"));

        let record = timeout(WAIT, stream.next())
            .await
            .expect("no timeout")
            .expect("record");
        assert_eq!(record.msg, "fresh");

        // Exactly that record: nothing else is pending.
        let extra = timeout(POLL * 6, stream.next()).await;
        assert!(extra.is_err(), "unexpected extra delivery after rotation");
    }

    #[tokio::test]
    async fn subscriber_filter_applies() {
        let file = NamedTempFile::new().expect("temp file");
        let tailer = Tailer::spawn(file.path(), POLL);
        let mut errors = tailer.subscribe(LogFilter::new().with_level("error"));

        append(&file, &record_line(10, "info", "ignored"));
        append(&file, &record_line(11, "error", "kept"));

        let record = timeout(WAIT, errors.next())
            .await
            .expect("no timeout")
            .expect("record");
        assert_eq!(record.msg, "kept");
    }

    #[tokio::test]
    async fn noise_lines_are_dropped() {
        let file = NamedTempFile::new().expect("temp file");
        let tailer = Tailer::spawn(file.path(), POLL);
        let mut stream = tailer.subscribe(LogFilter::new());

        append(&file, "not json at all\n");
        append(&file, &record_line(10, "info", "real"));

        let record = timeout(WAIT, stream.next())
            .await
            .expect("no timeout")
            .expect("record");
        assert_eq!(record.msg, "real");
    }

    #[tokio::test]
    async fn partial_line_waits_for_its_newline() {
        let file = NamedTempFile::new().expect("temp file");
        let tailer = Tailer::spawn(file.path(), POLL);
        let mut stream = tailer.subscribe(LogFilter::new());

        let line = record_line(10, "info", "split across polls");
        let (head, tail) = line.split_at(line.len() / 2);
        append(&file, head);
        tokio::time::sleep(POLL * 4).await;
        append(&file, tail);

        let record = timeout(WAIT, stream.next())
            .await
            .expect("no timeout")
            .expect("record");
        assert_eq!(record.msg, "split across polls");
    }

    #[tokio::test]
    async fn dropping_the_tailer_closes_streams() {
        let file = NamedTempFile::new().expect("temp file");
        let tailer = Tailer::spawn(file.path(), POLL);
        let mut stream = tailer.subscribe(LogFilter::new());
        assert_eq!(tailer.subscriber_count(), 1);

        drop(tailer);
        let next = timeout(WAIT, stream.next()).await.expect("no timeout");
        assert!(next.is_none());
    }

    #[tokio::test]
    async fn multiple_subscribers_each_get_matches() {
        let file = NamedTempFile::new().expect("temp file");
        let tailer = Tailer::spawn(file.path(), POLL);
        let mut all = tailer.subscribe(LogFilter::new());
        let mut errors = tailer.subscribe(LogFilter::new().with_level("error"));
        assert_eq!(tailer.subscriber_count(), 2);

        append(&file, &record_line(10, "error", "boom"));

        let a = timeout(WAIT, all.next()).await.expect("no timeout").expect("record");
        let b = timeout(WAIT, errors.next()).await.expect("no timeout").expect("record");
        assert_eq!(a.msg, "boom");
        assert_eq!(b.msg, "boom");
    }
}
