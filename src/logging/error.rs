//! Logging setup errors.

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while installing the log subscriber.
#[derive(Debug, Error)]
pub enum LoggingError {
    /// File output was selected without a path.
    #[error("logging.file_path is required when output is 'file'")]
    MissingFilePath,

    /// The log file could not be opened.
    #[error("failed to open log file '{path}': {source}")]
    OpenFile {
        /// Path to the log file.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// A global subscriber was already installed.
    #[error("failed to install log subscriber: {0}")]
    Install(String),
}

/// Result type for logging setup.
pub type LoggingResult<T> = Result<T, LoggingError>;
