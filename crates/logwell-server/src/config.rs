//! Server configuration.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use logwell_reader::DEFAULT_POLL_INTERVAL;

/// Environment variable naming the NDJSON source file.
pub const ENV_LOG_FILE: &str = "LOG_FILE_PATH";
/// Environment variable holding the shared secret.
pub const ENV_PASSWORD: &str = "LOG_PASSWORD";

/// Configuration for the log server.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind the HTTP server to.
    pub bind_addr: SocketAddr,
    /// Path of the NDJSON log file to serve.
    pub log_file: PathBuf,
    /// Shared secret checked against the `pwd` query parameter. Requests
    /// fail with 500 while this is unset.
    pub password: Option<String>,
    /// Poll interval of the tail watcher.
    pub poll_interval: Duration,
    /// CORS allowed origins (empty means all).
    pub cors_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            log_file: PathBuf::from("app.ndjson"),
            password: None,
            poll_interval: DEFAULT_POLL_INTERVAL,
            cors_origins: Vec::new(),
        }
    }
}

impl ServerConfig {
    /// Creates a configuration for the given bind address and log file.
    #[must_use]
    pub fn new(bind_addr: SocketAddr, log_file: impl Into<PathBuf>) -> Self {
        Self {
            bind_addr,
            log_file: log_file.into(),
            ..Self::default()
        }
    }

    /// Sets the shared secret.
    #[must_use]
    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    /// Sets the tail watcher poll interval.
    #[must_use]
    pub const fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Adds a CORS allowed origin.
    #[must_use]
    pub fn with_cors_origin(mut self, origin: impl Into<String>) -> Self {
        self.cors_origins.push(origin.into());
        self
    }
}
