//! Per-client UDP session state.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use bytes::Bytes;
use tokio::sync::{mpsc, oneshot};

/// Session table key: the canonical string form of the client address.
pub(crate) type SessionKey = String;

/// Last-activity timestamp shared between the manager and a replier.
///
/// Stored as milliseconds since the session was created so it fits in one
/// atomic word. Only the manager writes it.
#[derive(Debug)]
pub struct ActivityClock {
    origin: Instant,
    last_ms: AtomicU64,
}

impl ActivityClock {
    /// Start a clock with activity at the current instant.
    #[must_use]
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
            last_ms: AtomicU64::new(0),
        }
    }

    /// Record activity now.
    pub fn touch(&self) {
        let now = self.origin.elapsed().as_millis() as u64;
        self.last_ms.store(now, Ordering::Release);
    }

    /// Time since the last recorded activity.
    #[must_use]
    pub fn idle(&self) -> Duration {
        let last = Duration::from_millis(self.last_ms.load(Ordering::Acquire));
        self.origin.elapsed().saturating_sub(last)
    }
}

impl Default for ActivityClock {
    fn default() -> Self {
        Self::new()
    }
}

/// Public summary of a live session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionInfo {
    /// Session generation number.
    pub id: u64,

    /// Client address.
    pub client: SocketAddr,

    /// Resolved remote address.
    pub remote: SocketAddr,

    /// Time since the client was last heard from.
    pub idle: Duration,
}

/// A live session, owned by the manager's table.
///
/// Dropping it closes the outbound queue, which ends the forwarder, and
/// drops the shutdown sender, which ends the replier. The remote socket is
/// released when both tasks have exited.
#[derive(Debug)]
pub(crate) struct Session {
    pub(crate) id: u64,
    pub(crate) client: SocketAddr,
    pub(crate) remote: SocketAddr,
    pub(crate) outbound: mpsc::Sender<Bytes>,
    pub(crate) clock: Arc<ActivityClock>,
    pub(crate) _shutdown: oneshot::Sender<()>,
}

impl Session {
    /// Whether the client has been silent longer than `threshold`.
    pub(crate) fn is_idle(&self, threshold: Duration) -> bool {
        self.clock.idle() > threshold
    }

    pub(crate) fn info(&self) -> SessionInfo {
        SessionInfo {
            id: self.id,
            client: self.client,
            remote: self.remote,
            idle: self.clock.idle(),
        }
    }
}
