//! The session manager: sole owner of a route's session table.

use std::collections::HashMap;
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};
use std::sync::Arc;

use bytes::Bytes;
use tokio::net::UdpSocket;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, oneshot};
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::debug;

use crate::logging::{EvictionReason, RelayEvent, SharedSink};

use super::config::UdpRelaySettings;
use super::error::{UdpRelayError, UdpRelayResult};
use super::pump::{self, FailureEvent, ReplyTimeouts, Reporter};
use super::session::{ActivityClock, Session, SessionInfo, SessionKey};
use super::stats::{StatsInner, UdpStatsHandle};

/// A datagram read from the shared listener.
#[derive(Debug)]
pub(crate) struct Inbound {
    pub(crate) payload: Bytes,
    pub(crate) source: SocketAddr,
}

/// Requests answered by the manager from its own table.
#[derive(Debug)]
pub(crate) enum ManagerQuery {
    /// Summaries of every live session, ordered by session id.
    Sessions(oneshot::Sender<Vec<SessionInfo>>),
}

/// Serializes every session table mutation onto one task.
pub(crate) struct SessionManager {
    target: String,
    responder: Arc<UdpSocket>,
    settings: UdpRelaySettings,
    sink: SharedSink,
    stats: UdpStatsHandle,
    sessions: HashMap<SessionKey, Session>,
    next_id: u64,
    events_tx: mpsc::Sender<FailureEvent>,
    /// Target address from the first successful lookup.
    resolved: Option<SocketAddr>,
}

impl SessionManager {
    pub(crate) fn new(
        target: String,
        responder: Arc<UdpSocket>,
        settings: UdpRelaySettings,
        sink: SharedSink,
        stats: UdpStatsHandle,
        events_tx: mpsc::Sender<FailureEvent>,
    ) -> Self {
        Self {
            target,
            responder,
            settings,
            sink,
            stats,
            sessions: HashMap::new(),
            next_id: 0,
            events_tx,
            resolved: None,
        }
    }

    /// Service inbound datagrams, sweeps, failure events and queries until
    /// the read loop goes away.
    pub(crate) async fn run(
        mut self,
        mut ingest: mpsc::Receiver<Inbound>,
        mut events: mpsc::Receiver<FailureEvent>,
        mut queries: mpsc::Receiver<ManagerQuery>,
    ) {
        let period = self.settings.sweep_interval();
        let mut sweep = interval_at(Instant::now() + period, period);
        sweep.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                inbound = ingest.recv() => match inbound {
                    Some(inbound) => self.handle_inbound(inbound).await,
                    None => break,
                },
                _ = sweep.tick() => self.sweep_idle(),
                Some(event) = events.recv() => self.handle_failure(event),
                Some(query) = queries.recv() => self.answer(query),
            }
        }

        debug!(
            target = %self.target,
            sessions = self.sessions.len(),
            "UDP session manager stopped"
        );
    }

    async fn handle_inbound(&mut self, inbound: Inbound) {
        let Inbound { payload, source } = inbound;
        let key = source.to_string();

        if !self.sessions.contains_key(&key) {
            match self.open_session(&key, source).await {
                Ok(session) => {
                    self.sink.record(&RelayEvent::SessionCreated {
                        client: source,
                        session_id: session.id,
                        remote: session.remote,
                    });
                    self.sessions.insert(key.clone(), session);
                },
                Err(e) => {
                    StatsInner::incr(&self.stats.inner().dial_failures);
                    self.sink.record(&self.open_failed(source, e));
                    return;
                },
            }
        }

        let Some(session) = self.sessions.get(&key) else {
            return;
        };
        session.clock.touch();

        match session.outbound.try_send(payload) {
            Ok(()) => {},
            // A closed queue means the forwarder already failed; its event
            // will evict the session.
            Err(TrySendError::Full(_) | TrySendError::Closed(_)) => {
                StatsInner::incr(&self.stats.inner().datagrams_dropped);
                self.sink
                    .record(&RelayEvent::DatagramDropped { client: source });
            },
        }
    }

    fn open_failed(&self, client: SocketAddr, error: UdpRelayError) -> RelayEvent {
        match error {
            UdpRelayError::ResolveError { .. } | UdpRelayError::NoAddress { .. } => {
                RelayEvent::TargetResolveFailed {
                    target: self.target.clone(),
                    error: error.to_string(),
                }
            },
            other => RelayEvent::SessionDialFailed {
                client,
                target: self.target.clone(),
                error: other.to_string(),
            },
        }
    }

    /// Resolve the target, dial a dedicated socket, and start the session tasks.
    async fn open_session(&mut self, key: &str, client: SocketAddr) -> UdpRelayResult<Session> {
        let remote_addr = self.resolve().await?;
        let remote = Arc::new(self.dial(remote_addr).await?);

        self.next_id += 1;
        let id = self.next_id;

        let (outbound_tx, outbound_rx) = mpsc::channel(self.settings.outbound_queue);
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let clock = Arc::new(ActivityClock::new());

        let reporter = Reporter {
            key: key.to_string(),
            session_id: id,
            client,
            events: self.events_tx.clone(),
            sink: Arc::clone(&self.sink),
            stats: self.stats.clone(),
        };

        tokio::spawn(pump::forward(
            Arc::clone(&remote),
            outbound_rx,
            self.settings.write_timeout(),
            reporter.clone(),
        ));
        tokio::spawn(pump::reply(
            remote,
            Arc::clone(&self.responder),
            Arc::clone(&clock),
            ReplyTimeouts {
                read_timeout: self.settings.read_timeout(),
                idle_timeout: self.settings.idle_timeout(),
            },
            self.settings.max_datagram_size,
            shutdown_rx,
            reporter,
        ));

        StatsInner::incr(&self.stats.inner().sessions_created);

        Ok(Session {
            id,
            client,
            remote: remote_addr,
            outbound: outbound_tx,
            clock,
            _shutdown: shutdown_tx,
        })
    }

    /// Look the target up once and reuse the answer for later sessions.
    ///
    /// Failed lookups are not cached, so the next new client retries.
    async fn resolve(&mut self) -> UdpRelayResult<SocketAddr> {
        if let Some(addr) = self.resolved {
            return Ok(addr);
        }

        let mut addrs = tokio::net::lookup_host(self.target.as_str())
            .await
            .map_err(|source| UdpRelayError::ResolveError {
                target: self.target.clone(),
                source,
            })?;
        let addr = addrs.next().ok_or_else(|| UdpRelayError::NoAddress {
            target: self.target.clone(),
        })?;

        self.resolved = Some(addr);
        Ok(addr)
    }

    /// Bind an ephemeral local port of the remote's family and connect it.
    async fn dial(&self, remote: SocketAddr) -> UdpRelayResult<UdpSocket> {
        let dial_error = |source| UdpRelayError::DialError {
            target: self.target.clone(),
            source,
        };

        let local = if remote.is_ipv4() {
            SocketAddr::from((Ipv4Addr::UNSPECIFIED, 0))
        } else {
            SocketAddr::from((Ipv6Addr::UNSPECIFIED, 0))
        };

        let socket = UdpSocket::bind(local).await.map_err(dial_error)?;
        socket.connect(remote).await.map_err(dial_error)?;
        Ok(socket)
    }

    fn sweep_idle(&mut self) {
        let threshold = self.settings.idle_timeout();
        let idle: Vec<SessionKey> = self
            .sessions
            .iter()
            .filter(|(_, session)| session.is_idle(threshold))
            .map(|(key, _)| key.clone())
            .collect();

        for key in idle {
            self.evict(&key, EvictionReason::Idle);
        }
    }

    fn handle_failure(&mut self, event: FailureEvent) {
        match self.sessions.get(&event.key) {
            Some(session) if session.id == event.session_id => {
                self.evict(&event.key, EvictionReason::Failure(event.reason));
            },
            _ => {
                debug!(
                    client = %event.key,
                    session_id = event.session_id,
                    reason = %event.reason,
                    "Ignoring failure event for a closed session"
                );
            },
        }
    }

    fn evict(&mut self, key: &str, reason: EvictionReason) {
        if let Some(session) = self.sessions.remove(key) {
            StatsInner::incr(&self.stats.inner().sessions_evicted);
            self.sink.record(&RelayEvent::SessionEvicted {
                client: session.client,
                reason,
            });
        }
    }

    fn answer(&self, query: ManagerQuery) {
        match query {
            ManagerQuery::Sessions(reply) => {
                let mut sessions: Vec<SessionInfo> =
                    self.sessions.values().map(Session::info).collect();
                sessions.sort_by_key(|s| s.id);
                // The asker may have given up; nothing to do then.
                let _ = reply.send(sessions);
            },
        }
    }
}
