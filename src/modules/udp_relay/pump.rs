//! Per-session forwarder and replier tasks.
//!
//! Neither task touches the session table. They move bytes and, when they
//! give up, report a [`FailureEvent`] to the manager without blocking.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use tokio::net::UdpSocket;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, oneshot};
use tokio::time::timeout;

use crate::logging::{FailureReason, RelayEvent, SessionOp, SharedSink};

use super::session::{ActivityClock, SessionKey};
use super::stats::{StatsInner, UdpStatsHandle};

/// A session asking the manager to tear it down.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct FailureEvent {
    pub(crate) key: SessionKey,
    pub(crate) session_id: u64,
    pub(crate) reason: FailureReason,
}

/// Everything a session task needs to log and report.
#[derive(Clone)]
pub(crate) struct Reporter {
    pub(crate) key: SessionKey,
    pub(crate) session_id: u64,
    pub(crate) client: SocketAddr,
    pub(crate) events: mpsc::Sender<FailureEvent>,
    pub(crate) sink: SharedSink,
    pub(crate) stats: UdpStatsHandle,
}

impl Reporter {
    fn io_failed(&self, op: SessionOp, error: &std::io::Error) {
        self.sink.record(&RelayEvent::SessionIoFailed {
            client: self.client,
            op,
            error: error.to_string(),
        });
    }

    /// Report a failure without waiting for the manager.
    ///
    /// A full queue leaves the session running until the idle sweep finds it.
    pub(crate) fn fail(&self, reason: FailureReason) {
        let event = FailureEvent {
            key: self.key.clone(),
            session_id: self.session_id,
            reason,
        };
        match self.events.try_send(event) {
            Ok(()) => {},
            Err(TrySendError::Full(_)) => {
                StatsInner::incr(&self.stats.inner().event_queue_overflows);
                self.sink.record(&RelayEvent::EventQueueFull {
                    client: self.client,
                    reason,
                });
            },
            // Manager gone: the whole route is shutting down.
            Err(TrySendError::Closed(_)) => {},
        }
    }
}

/// Drain the outbound queue to the remote in FIFO order.
///
/// Ends when the queue is closed by the manager or on the first failed write.
pub(crate) async fn forward(
    remote: Arc<UdpSocket>,
    mut outbound: mpsc::Receiver<Bytes>,
    write_timeout: Duration,
    reporter: Reporter,
) {
    while let Some(payload) = outbound.recv().await {
        let error = match timeout(write_timeout, remote.send(&payload)).await {
            Ok(Ok(_)) => {
                StatsInner::incr(&reporter.stats.inner().datagrams_forwarded);
                continue;
            },
            Ok(Err(e)) => e,
            Err(_) => std::io::Error::new(std::io::ErrorKind::TimedOut, "write deadline exceeded"),
        };
        reporter.io_failed(SessionOp::Forward, &error);
        reporter.fail(FailureReason::WriteFailure);
        return;
    }
}

/// Settings the replier needs.
#[derive(Debug, Clone, Copy)]
pub(crate) struct ReplyTimeouts {
    pub(crate) read_timeout: Duration,
    pub(crate) idle_timeout: Duration,
}

/// Relay remote replies back to the client through the shared listener.
///
/// The read deadline rolls: on expiry the replier keeps waiting while the
/// client is still active and gives up once it has been idle too long.
pub(crate) async fn reply(
    remote: Arc<UdpSocket>,
    responder: Arc<UdpSocket>,
    clock: Arc<ActivityClock>,
    timeouts: ReplyTimeouts,
    max_datagram_size: usize,
    mut shutdown: oneshot::Receiver<()>,
    reporter: Reporter,
) {
    let mut buf = vec![0u8; max_datagram_size];

    loop {
        let read = tokio::select! {
            _ = &mut shutdown => return,
            read = timeout(timeouts.read_timeout, remote.recv(&mut buf)) => read,
        };

        let n = match read {
            Ok(Ok(n)) => n,
            Ok(Err(e)) => {
                reporter.io_failed(SessionOp::ReadReply, &e);
                reporter.fail(FailureReason::ReadFailure);
                return;
            },
            Err(_) => {
                if clock.idle() < timeouts.idle_timeout {
                    continue;
                }
                reporter.fail(FailureReason::RemoteIdleTimeout);
                return;
            },
        };

        if let Err(e) = responder.send_to(&buf[..n], reporter.client).await {
            reporter.io_failed(SessionOp::Respond, &e);
            reporter.fail(FailureReason::RespondFailure);
            return;
        }
        StatsInner::incr(&reporter.stats.inner().datagrams_replied);
    }
}
