//! # logwell-server
//!
//! HTTP boundary for the logwell log server.
//!
//! This crate provides:
//!
//! - [`LogServer`] — Server lifecycle (`serve`, `serve_with_shutdown`)
//! - [`ServerConfig`] — Bind address, log file, shared secret, poll interval
//! - Four query surfaces over one NDJSON file:
//!   - `GET /` — streaming HTML view (login page on auth failure)
//!   - `GET /api/logs` — bulk JSON (`{logs, count, total, hasMore}`)
//!   - `GET /api/logs/raw` — plain text export
//!   - `GET /api/logs/stream` — SSE: historical prefix, `historical-end`
//!     sentinel, then live tail
//!
//! Every surface gates on a `pwd` query parameter compared in constant time
//! against the configured secret.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod auth;
pub mod config;
pub mod error;
pub mod handlers;
pub mod render;
pub mod routes;
pub mod server;
pub mod state;

pub use auth::SharedSecret;
pub use config::ServerConfig;
pub use error::{ServerError, ServerResult};
pub use routes::create_router;
pub use server::LogServer;
pub use state::AppState;
