//! Shared request-handler state.

use std::sync::Arc;
use std::time::Instant;

use logwell_reader::{LogReader, OffsetCache, Tailer};

use crate::auth::SharedSecret;
use crate::config::ServerConfig;
use crate::error::{ServerError, ServerResult};
use crate::render::Shell;

/// State shared by every handler.
///
/// Owns the tailer (the only long-lived OS resource), the process-wide
/// offset cache (through the reader) and the page shell, which is rendered
/// exactly once per process.
#[derive(Debug)]
pub struct AppState {
    config: ServerConfig,
    secret: Option<SharedSecret>,
    reader: LogReader,
    tailer: Tailer,
    shell: Shell,
    started_at: Instant,
}

impl AppState {
    /// Builds the state from a configuration, spawning the tail watcher.
    #[must_use]
    pub fn new(config: ServerConfig) -> Self {
        let secret = config.password.as_deref().map(SharedSecret::new);
        let reader = LogReader::new(&config.log_file, Arc::new(OffsetCache::new()));
        let tailer = Tailer::spawn(&config.log_file, config.poll_interval);
        let shell = Shell::render();

        Self {
            config,
            secret,
            reader,
            tailer,
            shell,
            started_at: Instant::now(),
        }
    }

    /// Checks the `pwd` query parameter against the configured secret.
    ///
    /// # Errors
    ///
    /// [`ServerError::Unconfigured`] when no secret is set,
    /// [`ServerError::Unauthorized`] when the parameter is missing or wrong.
    pub fn authorize(&self, pwd: Option<&str>) -> ServerResult<()> {
        let Some(secret) = &self.secret else {
            return Err(ServerError::Unconfigured);
        };
        match pwd {
            Some(candidate) if secret.verify(candidate) => Ok(()),
            _ => Err(ServerError::Unauthorized),
        }
    }

    /// Returns the configuration.
    #[must_use]
    pub const fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Returns the streaming reader.
    #[must_use]
    pub const fn reader(&self) -> &LogReader {
        &self.reader
    }

    /// Returns the tailer.
    #[must_use]
    pub const fn tailer(&self) -> &Tailer {
        &self.tailer
    }

    /// Returns the pre-rendered page shell.
    #[must_use]
    pub const fn shell(&self) -> &Shell {
        &self.shell
    }

    /// Seconds since the server started.
    #[must_use]
    pub fn uptime_secs(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state_with_password(password: Option<&str>) -> AppState {
        let mut config = ServerConfig::default();
        config.log_file = std::env::temp_dir().join("logwell-state-test.ndjson");
        if let Some(p) = password {
            config = config.with_password(p);
        }
        AppState::new(config)
    }

    #[tokio::test]
    async fn authorize_accepts_the_configured_secret() {
        let state = state_with_password(Some("hunter2"));
        assert!(state.authorize(Some("hunter2")).is_ok());
    }

    #[tokio::test]
    async fn authorize_rejects_missing_and_wrong_secrets() {
        let state = state_with_password(Some("hunter2"));
        assert!(matches!(
            state.authorize(None),
            Err(ServerError::Unauthorized)
        ));
        assert!(matches!(
            state.authorize(Some("wrong")),
            Err(ServerError::Unauthorized)
        ));
    }

    #[tokio::test]
    async fn authorize_fails_closed_when_unconfigured() {
        let state = state_with_password(None);
        assert!(matches!(
            state.authorize(Some("anything")),
            Err(ServerError::Unconfigured)
        ));
    }

    #[tokio::test]
    async fn shell_is_rendered_once_at_startup() {
        let state = state_with_password(Some("x"));
        assert!(!state.shell().before_logs.is_empty());
    }
}
