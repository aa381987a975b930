//! # logwell-reader
//!
//! Time-indexed reading and live tailing of a large NDJSON log file.
//!
//! This crate provides:
//!
//! - [`locate`] — Byte-offset binary search for the first record at or after
//!   a target instant, robust to noise and multi-megabyte lines
//! - [`OffsetCache`] — A single-slot cache of one located offset, validated
//!   against the file before every reuse
//! - [`LogReader`] — Chunked streaming reads with filter evaluation, limit
//!   and early exit past the `to` bound
//! - [`Tailer`] / [`TailStream`] — Live fan-out of appended records with
//!   rotation handling
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use logwell_model::LogFilter;
//! use logwell_reader::{LogReader, OffsetCache, ParseMode};
//!
//! # async fn example() -> logwell_reader::Result<()> {
//! let reader = LogReader::new("/var/log/app.ndjson", Arc::new(OffsetCache::new()));
//! let recent = LogFilter::new().with_level("error").with_limit(100);
//! let records = reader.collect(&recent, ParseMode::Strict).await?;
//! # let _ = records;
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod cache;
pub mod error;
pub mod locate;
pub mod reader;
pub mod tailer;

pub use cache::{OffsetCache, CACHE_WINDOW_MS};
pub use error::{ReaderError, Result};
pub use locate::{locate, Located};
pub use reader::{LogReader, ParseMode, INDEX_THRESHOLD};
pub use tailer::{TailStream, Tailer, DEFAULT_POLL_INTERVAL};
