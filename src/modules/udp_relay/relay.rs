//! UDP relay: the shared listener, its read loop, and the handle observers use.

use std::net::SocketAddr;
use std::sync::Arc;

use bytes::Bytes;
use tokio::net::UdpSocket;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, oneshot};

use crate::config::Protocol;
use crate::logging::{RelayEvent, SharedSink};

use super::config::UdpRelaySettings;
use super::error::{UdpRelayError, UdpRelayResult};
use super::manager::{Inbound, ManagerQuery, SessionManager};
use super::session::SessionInfo;
use super::stats::{StatsInner, UdpRelayStats, UdpStatsHandle};

/// Capacity of the introspection query channel.
const QUERY_QUEUE: usize = 8;

/// A bound UDP relay for one route.
pub struct UdpRelay {
    /// Shared listening socket, also used by repliers.
    socket: Arc<UdpSocket>,

    /// The bound address.
    local_addr: SocketAddr,

    /// Remote target as `host:port`.
    target: String,

    /// Relay tuning.
    settings: UdpRelaySettings,

    /// Event sink.
    sink: SharedSink,

    /// Statistics.
    stats: UdpStatsHandle,

    /// Query sender cloned into handles.
    queries_tx: mpsc::Sender<ManagerQuery>,

    /// Query receiver, moved into the manager on run.
    queries_rx: mpsc::Receiver<ManagerQuery>,
}

impl UdpRelay {
    /// Bind the listen address.
    ///
    /// # Errors
    ///
    /// Returns `UdpRelayError::InvalidSetting` for unusable settings and
    /// `UdpRelayError::BindError` if the address cannot be bound.
    pub async fn bind(
        listen: &str,
        target: impl Into<String>,
        settings: UdpRelaySettings,
        sink: SharedSink,
    ) -> UdpRelayResult<Self> {
        settings.check()?;
        let bind_error = |source| UdpRelayError::BindError {
            address: listen.to_string(),
            source,
        };

        let socket = UdpSocket::bind(listen).await.map_err(bind_error)?;
        let local_addr = socket.local_addr().map_err(bind_error)?;
        let (queries_tx, queries_rx) = mpsc::channel(QUERY_QUEUE);

        Ok(Self {
            socket: Arc::new(socket),
            local_addr,
            target: target.into(),
            settings,
            sink,
            stats: UdpStatsHandle::default(),
            queries_tx,
            queries_rx,
        })
    }

    /// Get the bound address.
    #[must_use]
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Get the remote target.
    #[must_use]
    pub fn target(&self) -> &str {
        &self.target
    }

    /// Get relay statistics.
    #[must_use]
    pub fn stats(&self) -> UdpRelayStats {
        self.stats.snapshot()
    }

    /// Handle for observing the relay after [`UdpRelay::run`] takes ownership.
    #[must_use]
    pub fn handle(&self) -> UdpRelayHandle {
        UdpRelayHandle {
            queries: self.queries_tx.clone(),
            stats: self.stats.clone(),
        }
    }

    /// Start the session manager and run the read loop.
    ///
    /// Read errors are logged and the loop continues. When the ingestion
    /// channel is full the loop waits for the manager; the first wait of
    /// each stall episode is counted and logged.
    ///
    /// # Errors
    ///
    /// Returns `UdpRelayError::ManagerStopped` if the session manager exits.
    pub async fn run(self) -> UdpRelayResult<()> {
        let (ingest_tx, ingest_rx) = mpsc::channel(self.settings.ingest_capacity());
        let (events_tx, events_rx) = mpsc::channel(self.settings.event_queue);

        let manager = SessionManager::new(
            self.target.clone(),
            Arc::clone(&self.socket),
            self.settings.clone(),
            Arc::clone(&self.sink),
            self.stats.clone(),
            events_tx,
        );
        tokio::spawn(manager.run(ingest_rx, events_rx, self.queries_rx));

        self.sink.record(&RelayEvent::RelayStarted {
            protocol: Protocol::Udp,
            listen: self.local_addr,
            target: self.target.clone(),
        });

        let stats = self.stats.inner();
        let mut buf = vec![0u8; self.settings.max_datagram_size];
        let mut stalled = false;

        loop {
            let (n, source) = match self.socket.recv_from(&mut buf).await {
                Ok(received) => received,
                Err(e) => {
                    StatsInner::incr(&stats.read_errors);
                    self.sink.record(&RelayEvent::DatagramReadFailed {
                        listen: self.local_addr,
                        error: e.to_string(),
                    });
                    continue;
                },
            };
            StatsInner::incr(&stats.datagrams_received);

            // The receive buffer is reused, so every payload gets its own copy.
            let inbound = Inbound {
                payload: Bytes::copy_from_slice(&buf[..n]),
                source,
            };

            let inbound = match ingest_tx.try_send(inbound) {
                Ok(()) => {
                    stalled = false;
                    continue;
                },
                Err(TrySendError::Full(inbound)) => inbound,
                Err(TrySendError::Closed(_)) => return Err(UdpRelayError::ManagerStopped),
            };

            if !stalled {
                stalled = true;
                StatsInner::incr(&stats.ingest_stalls);
                self.sink.record(&RelayEvent::IngestStalled {
                    listen: self.local_addr,
                });
            }
            if ingest_tx.send(inbound).await.is_err() {
                return Err(UdpRelayError::ManagerStopped);
            }
        }
    }
}

impl std::fmt::Debug for UdpRelay {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UdpRelay")
            .field("local_addr", &self.local_addr)
            .field("target", &self.target)
            .finish_non_exhaustive()
    }
}

/// Observer for a running UDP relay.
///
/// Session data is obtained by asking the manager, never by reading its table.
#[derive(Debug, Clone)]
pub struct UdpRelayHandle {
    queries: mpsc::Sender<ManagerQuery>,
    stats: UdpStatsHandle,
}

impl UdpRelayHandle {
    /// Summaries of every live session, ordered by session id.
    ///
    /// # Errors
    ///
    /// Returns `UdpRelayError::ManagerStopped` if the manager is gone.
    pub async fn sessions(&self) -> UdpRelayResult<Vec<SessionInfo>> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.queries
            .send(ManagerQuery::Sessions(reply_tx))
            .await
            .map_err(|_| UdpRelayError::ManagerStopped)?;
        reply_rx.await.map_err(|_| UdpRelayError::ManagerStopped)
    }

    /// Number of live sessions.
    ///
    /// # Errors
    ///
    /// Returns `UdpRelayError::ManagerStopped` if the manager is gone.
    pub async fn session_count(&self) -> UdpRelayResult<usize> {
        Ok(self.sessions().await?.len())
    }

    /// Current counters.
    #[must_use]
    pub fn stats(&self) -> UdpRelayStats {
        self.stats.snapshot()
    }
}

/// Bind `listen` and relay datagrams to `target` with default settings.
///
/// Returns only when the route fails.
///
/// # Errors
///
/// Returns `UdpRelayError::BindError` when the listener cannot be bound.
pub async fn start_relay(listen: &str, target: &str, sink: SharedSink) -> UdpRelayResult<()> {
    UdpRelay::bind(listen, target, UdpRelaySettings::default(), sink)
        .await?
        .run()
        .await
}
