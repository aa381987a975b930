//! Error types for the reader.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while reading or tailing a log file.
#[derive(Debug, Error)]
pub enum ReaderError {
    /// The configured log file does not exist.
    #[error("log file not found: {0}")]
    NotFound(PathBuf),

    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for reader operations.
pub type Result<T> = std::result::Result<T, ReaderError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_messages() {
        let err = ReaderError::NotFound(PathBuf::from("/var/log/app.ndjson"));
        assert_eq!(err.to_string(), "log file not found: /var/log/app.ndjson");

        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err = ReaderError::from(io);
        assert!(err.to_string().contains("I/O error"));
    }

    #[test]
    fn error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<ReaderError>();
    }
}
