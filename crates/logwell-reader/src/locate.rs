//! Byte-offset location of the first record at or after a target instant.
//!
//! This module provides:
//! - [`locate`] — Binary search over a variable-length NDJSON file, robust
//!   to non-JSON noise and multi-megabyte lines
//! - [`Located`] — The resulting byte offset plus the line found there
//!
//! The search never trusts a raw midpoint: a probe window is read at the
//! midpoint, the first complete line after the first newline is taken as the
//! comparison candidate, and noise is skipped forward (never backward, which
//! would oscillate on the same region). A forward confirmation scan then
//! walks line-by-line from the converged lower bound until it finds the
//! first strict record at or after the target, growing its window as needed
//! all the way to EOF.

use std::io::SeekFrom;

use chrono::{DateTime, Utc};
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncSeekExt};

use logwell_model::Record;

/// Initial probe window at a binary-search midpoint.
pub const PROBE_BYTES: usize = 4 * 1024;
/// Enlarged probe window for lines that dwarf the initial probe.
pub const PROBE_MAX_BYTES: usize = 4 * 1024 * 1024;
/// Bisection stops once the remaining range fits in this window.
pub const COARSE_WINDOW: u64 = 64 * 1024;
/// Read size for the forward confirmation scan.
pub const SCAN_WINDOW: usize = 256 * 1024;

/// The result of a locate call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Located {
    /// Byte offset of the start of the located line.
    pub offset: u64,
    /// The exact line content at `offset`; empty when no record at or after
    /// the target exists.
    pub line: String,
}

impl Located {
    /// Returns true when no matching record exists (the no-match sentinel).
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.line.is_empty()
    }
}

/// Finds the byte offset of the first strict record whose time is at or
/// after `target`.
///
/// The loop maintains: every strict record starting before `low` has time
/// before `target` (records are assumed chronologically non-decreasing for
/// the bisection, as everywhere else in this crate). When a probe region
/// yields no strict line at all, `low` advances past it rather than
/// retreating, so runs of noise cannot trap the search.
///
/// # Errors
///
/// Returns an error when a seek or read on the file fails.
pub async fn locate(file: &mut File, size: u64, target: DateTime<Utc>) -> std::io::Result<Located> {
    let mut low: u64 = 0;
    let mut high: u64 = size;

    while high.saturating_sub(low) > COARSE_WINDOW {
        let mid = low + (high - low) / 2;

        let mut probe = read_at(file, mid, PROBE_BYTES).await?;
        if !probe.contains(&b'\n') {
            // A record larger than the probe; widen before giving up on the
            // upper half.
            probe = read_at(file, mid, PROBE_MAX_BYTES).await?;
            if !probe.contains(&b'\n') {
                high = mid;
                continue;
            }
        }

        match first_strict_line(&probe) {
            Some((start, time)) => {
                if time < target {
                    // The line starting here is known to be before the
                    // target; the confirmation scan discards it.
                    low = mid + start as u64;
                } else {
                    high = mid;
                }
            }
            // Nothing parseable in the whole probe: advance past it.
            None => low = mid + probe.len() as u64,
        }
    }

    confirm(file, size, low, target).await
}

/// Finds the first complete strict line after the first newline in a probe.
///
/// Returns the line's start relative to the probe base and its timestamp.
/// Non-strict lines are skipped forward; incomplete trailing bytes are
/// ignored.
fn first_strict_line(probe: &[u8]) -> Option<(usize, DateTime<Utc>)> {
    let first_nl = probe.iter().position(|&b| b == b'\n')?;
    let mut start = first_nl + 1;

    while let Some(rel) = probe[start..].iter().position(|&b| b == b'\n') {
        let end = start + rel;
        let line = String::from_utf8_lossy(&probe[start..end]);
        if let Some(time) = Record::strict_time(&line) {
            return Some((start, time));
        }
        start = end + 1;
    }

    None
}

/// Forward scan from `start`: returns the first strict record at or after
/// the target, with its exact byte offset.
///
/// When `start` is nonzero the first line is discarded — it is either a
/// partial line (the scan landed mid-record) or the bisection's known
/// before-target comparison line. The scan window grows by accumulation: a
/// line longer than one read simply stays in the carry until its newline
/// arrives, and the scan continues to EOF rather than reporting not-found.
async fn confirm(
    file: &mut File,
    size: u64,
    start: u64,
    target: DateTime<Utc>,
) -> std::io::Result<Located> {
    file.seek(SeekFrom::Start(start)).await?;

    let mut carry: Vec<u8> = Vec::new();
    let mut chunk = vec![0u8; SCAN_WINDOW];
    // Absolute file offset of carry[0].
    let mut base = start;
    let mut skip_first = start > 0;

    loop {
        let n = file.read(&mut chunk).await?;
        if n == 0 {
            // Trailing line without a final newline.
            if !skip_first && !carry.is_empty() {
                let line = String::from_utf8_lossy(&carry);
                if let Some(time) = Record::strict_time(&line) {
                    if time >= target {
                        return Ok(Located {
                            offset: base,
                            line: line.into_owned(),
                        });
                    }
                }
            }
            return Ok(Located {
                offset: size,
                line: String::new(),
            });
        }
        carry.extend_from_slice(&chunk[..n]);

        let mut consumed = 0usize;
        while let Some(rel) = carry[consumed..].iter().position(|&b| b == b'\n') {
            let end = consumed + rel;
            if skip_first {
                skip_first = false;
            } else {
                let line = String::from_utf8_lossy(&carry[consumed..end]);
                if let Some(time) = Record::strict_time(&line) {
                    if time >= target {
                        return Ok(Located {
                            offset: base + consumed as u64,
                            line: line.into_owned(),
                        });
                    }
                }
            }
            consumed = end + 1;
        }
        carry.drain(..consumed);
        base += consumed as u64;
    }
}

/// Reads up to `len` bytes at `offset`, short only at EOF.
pub(crate) async fn read_at(file: &mut File, offset: u64, len: usize) -> std::io::Result<Vec<u8>> {
    file.seek(SeekFrom::Start(offset)).await?;
    let mut buf = vec![0u8; len];
    let mut filled = 0;
    while filled < len {
        let n = file.read(&mut buf[filled..]).await?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    buf.truncate(filled);
    Ok(buf)
}
