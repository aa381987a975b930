//! # logwell-model
//!
//! Record model and query primitives for the logwell log server.
//!
//! This crate provides:
//!
//! - [`Record`] — A single NDJSON log record with an open set of extra keys
//! - [`LogFilter`] — Query filters over level, module and time bounds
//! - Strict and permissive line parsers ([`Record::parse_strict`],
//!   [`Record::parse_permissive`])
//! - The instant grammar ([`time::parse_instant`])
//! - Plain-text record formatting ([`format::format_record`])
//!
//! ## Example
//!
//! ```rust
//! use logwell_model::{LogFilter, Record};
//!
//! let record = Record::parse_strict(
//!     r#"{"level":"warn","time":"2025-12-14T10:00:00Z","module":"db","msg":"slow query"}"#,
//! ).expect("strict record");
//!
//! let filter = LogFilter::new().with_level("warn");
//! assert!(filter.matches(&record));
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod filter;
pub mod format;
pub mod record;
pub mod time;

pub use filter::LogFilter;
pub use format::format_record;
pub use record::Record;
pub use time::parse_instant;
