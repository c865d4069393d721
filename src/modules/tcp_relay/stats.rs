//! TCP relay statistics.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// Snapshot of TCP relay counters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TcpRelayStats {
    /// Total connections accepted.
    pub accepted: u64,

    /// Connections currently being relayed.
    pub active: u64,

    /// Connections whose both directions finished.
    pub completed: u64,

    /// Remote dials that failed.
    pub dial_failures: u64,

    /// Accept errors on the listener.
    pub accept_errors: u64,

    /// Bytes copied client to remote.
    pub bytes_up: u64,

    /// Bytes copied remote to client.
    pub bytes_down: u64,

    /// Uptime in seconds.
    pub uptime_seconds: u64,
}

/// Inner statistics (atomic counters).
#[derive(Debug)]
pub(crate) struct StatsInner {
    pub(crate) accepted: AtomicU64,
    pub(crate) active: AtomicU64,
    pub(crate) completed: AtomicU64,
    pub(crate) dial_failures: AtomicU64,
    pub(crate) accept_errors: AtomicU64,
    pub(crate) bytes_up: AtomicU64,
    pub(crate) bytes_down: AtomicU64,
    started_at: Instant,
}

impl Default for StatsInner {
    fn default() -> Self {
        Self {
            accepted: AtomicU64::new(0),
            active: AtomicU64::new(0),
            completed: AtomicU64::new(0),
            dial_failures: AtomicU64::new(0),
            accept_errors: AtomicU64::new(0),
            bytes_up: AtomicU64::new(0),
            bytes_down: AtomicU64::new(0),
            started_at: Instant::now(),
        }
    }
}

/// Cloneable handle for reading a relay's counters while it runs.
#[derive(Debug, Clone, Default)]
pub struct TcpStatsHandle {
    inner: Arc<StatsInner>,
}

impl TcpStatsHandle {
    pub(crate) fn inner(&self) -> &StatsInner {
        &self.inner
    }

    /// Read all counters.
    #[inline]
    #[must_use]
    pub fn snapshot(&self) -> TcpRelayStats {
        let s = &self.inner;
        TcpRelayStats {
            accepted: s.accepted.load(Ordering::Relaxed),
            active: s.active.load(Ordering::Relaxed),
            completed: s.completed.load(Ordering::Relaxed),
            dial_failures: s.dial_failures.load(Ordering::Relaxed),
            accept_errors: s.accept_errors.load(Ordering::Relaxed),
            bytes_up: s.bytes_up.load(Ordering::Relaxed),
            bytes_down: s.bytes_down.load(Ordering::Relaxed),
            uptime_seconds: s.started_at.elapsed().as_secs(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_reflects_counters() {
        let handle = TcpStatsHandle::default();
        handle.inner().accepted.fetch_add(2, Ordering::Relaxed);
        handle.inner().bytes_down.fetch_add(512, Ordering::Relaxed);

        let stats = handle.clone().snapshot();
        assert_eq!(stats.accepted, 2);
        assert_eq!(stats.bytes_down, 512);
        assert_eq!(stats.active, 0);
    }
}
