//! Route status reporting.

/// Represents the current status of one route.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteStatus {
    /// The listener is being bound.
    Starting,

    /// The relay is serving.
    Running,

    /// The relay returned without error.
    Stopped,

    /// The relay could not start or stopped on a fatal error.
    Failed {
        /// Error message.
        message: String,
    },
}

impl RouteStatus {
    /// Returns `true` if the route is serving traffic.
    #[must_use]
    pub fn is_running(&self) -> bool {
        matches!(self, Self::Running)
    }

    /// Returns `true` if the route has failed.
    #[must_use]
    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }
}

impl std::fmt::Display for RouteStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Starting => write!(f, "starting"),
            Self::Running => write!(f, "running"),
            Self::Stopped => write!(f, "stopped"),
            Self::Failed { message } => write!(f, "failed: {message}"),
        }
    }
}
