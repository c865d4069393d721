//! UDP relay error types.

use thiserror::Error;

/// Errors that can occur in the UDP relay module.
#[derive(Debug, Error)]
pub enum UdpRelayError {
    /// Failed to bind to the listen address.
    #[error("failed to bind to {address}: {source}")]
    BindError {
        /// The address that failed to bind.
        address: String,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// The target could not be resolved.
    #[error("failed to resolve {target}: {source}")]
    ResolveError {
        /// The remote target.
        target: String,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// The target resolved to no addresses.
    #[error("{target} resolved to no addresses")]
    NoAddress {
        /// The remote target.
        target: String,
    },

    /// Failed to open the per-session remote socket.
    #[error("failed to dial {target}: {source}")]
    DialError {
        /// The remote target.
        target: String,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// The session manager task has exited.
    #[error("UDP session manager has stopped")]
    ManagerStopped,

    /// A capacity or duration that must be non-zero is zero.
    #[error("invalid setting {field}: must be greater than zero")]
    InvalidSetting {
        /// The offending setting.
        field: &'static str,
    },
}

impl UdpRelayError {
    /// Whether the error takes down the whole route rather than one session.
    #[must_use]
    pub fn is_fatal_to_route(&self) -> bool {
        matches!(
            self,
            Self::BindError { .. } | Self::ManagerStopped | Self::InvalidSetting { .. }
        )
    }
}

/// Result type for UDP relay operations.
pub type UdpRelayResult<T> = Result<T, UdpRelayError>;
