//! UDP relay statistics.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// Snapshot of UDP relay counters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UdpRelayStats {
    /// Datagrams read from the listening socket.
    pub datagrams_received: u64,

    /// Datagrams written to a remote.
    pub datagrams_forwarded: u64,

    /// Replies written back to clients.
    pub datagrams_replied: u64,

    /// Datagrams dropped because a session queue was full.
    pub datagrams_dropped: u64,

    /// Sessions created.
    pub sessions_created: u64,

    /// Sessions evicted, idle or failed.
    pub sessions_evicted: u64,

    /// Times the read loop found the ingestion channel full.
    pub ingest_stalls: u64,

    /// Failure reports lost to a full event queue.
    pub event_queue_overflows: u64,

    /// Session sockets that could not be resolved or dialed.
    pub dial_failures: u64,

    /// Read errors on the listening socket.
    pub read_errors: u64,

    /// Uptime in seconds.
    pub uptime_seconds: u64,
}

/// Inner statistics (atomic counters).
#[derive(Debug)]
pub(crate) struct StatsInner {
    pub(crate) datagrams_received: AtomicU64,
    pub(crate) datagrams_forwarded: AtomicU64,
    pub(crate) datagrams_replied: AtomicU64,
    pub(crate) datagrams_dropped: AtomicU64,
    pub(crate) sessions_created: AtomicU64,
    pub(crate) sessions_evicted: AtomicU64,
    pub(crate) ingest_stalls: AtomicU64,
    pub(crate) event_queue_overflows: AtomicU64,
    pub(crate) dial_failures: AtomicU64,
    pub(crate) read_errors: AtomicU64,
    started_at: Instant,
}

impl Default for StatsInner {
    fn default() -> Self {
        Self {
            datagrams_received: AtomicU64::new(0),
            datagrams_forwarded: AtomicU64::new(0),
            datagrams_replied: AtomicU64::new(0),
            datagrams_dropped: AtomicU64::new(0),
            sessions_created: AtomicU64::new(0),
            sessions_evicted: AtomicU64::new(0),
            ingest_stalls: AtomicU64::new(0),
            event_queue_overflows: AtomicU64::new(0),
            dial_failures: AtomicU64::new(0),
            read_errors: AtomicU64::new(0),
            started_at: Instant::now(),
        }
    }
}

impl StatsInner {
    #[inline]
    pub(crate) fn incr(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

/// Cloneable handle for reading a relay's counters while it runs.
#[derive(Debug, Clone, Default)]
pub struct UdpStatsHandle {
    inner: Arc<StatsInner>,
}

impl UdpStatsHandle {
    pub(crate) fn inner(&self) -> &StatsInner {
        &self.inner
    }

    /// Read all counters.
    #[inline]
    #[must_use]
    pub fn snapshot(&self) -> UdpRelayStats {
        let s = &self.inner;
        UdpRelayStats {
            datagrams_received: s.datagrams_received.load(Ordering::Relaxed),
            datagrams_forwarded: s.datagrams_forwarded.load(Ordering::Relaxed),
            datagrams_replied: s.datagrams_replied.load(Ordering::Relaxed),
            datagrams_dropped: s.datagrams_dropped.load(Ordering::Relaxed),
            sessions_created: s.sessions_created.load(Ordering::Relaxed),
            sessions_evicted: s.sessions_evicted.load(Ordering::Relaxed),
            ingest_stalls: s.ingest_stalls.load(Ordering::Relaxed),
            event_queue_overflows: s.event_queue_overflows.load(Ordering::Relaxed),
            dial_failures: s.dial_failures.load(Ordering::Relaxed),
            read_errors: s.read_errors.load(Ordering::Relaxed),
            uptime_seconds: s.started_at.elapsed().as_secs(),
        }
    }
}
