//! TCP relay error types.

use thiserror::Error;

/// Errors that can occur in the TCP relay module.
#[derive(Debug, Error)]
pub enum TcpRelayError {
    /// Failed to bind to the listen address.
    #[error("failed to bind to {address}: {source}")]
    BindError {
        /// The address that failed to bind.
        address: String,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// Every dial worker has exited, so accepted clients cannot be served.
    #[error("all TCP workers have stopped")]
    WorkersStopped,

    /// A setting that must be non-zero is zero.
    #[error("invalid setting {field}: must be greater than zero")]
    InvalidSetting {
        /// The offending setting.
        field: &'static str,
    },
}

impl TcpRelayError {
    /// Whether the error takes down the whole route rather than one connection.
    #[must_use]
    pub fn is_fatal_to_route(&self) -> bool {
        matches!(
            self,
            Self::BindError { .. } | Self::WorkersStopped | Self::InvalidSetting { .. }
        )
    }
}

/// Result type for TCP relay operations.
pub type TcpRelayResult<T> = Result<T, TcpRelayError>;
