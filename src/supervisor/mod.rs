//! # Supervisor
//!
//! Starts one relay per configured route and keeps track of how each one is
//! doing. Routes are independent: a route that cannot bind is marked failed
//! and logged while every other route keeps serving.

mod status;

use std::sync::Arc;

use tokio::task::{AbortHandle, JoinSet};
use tracing::debug;

use crate::config::{Protocol, RelayConfig, Route};
use crate::logging::{RelayEvent, SharedSink, TracingSink};
use crate::modules::tcp_relay::{TcpRelay, TcpStatsHandle};
use crate::modules::udp_relay::{UdpRelay, UdpRelayHandle};

pub use status::RouteStatus;

/// How to observe a running route.
#[derive(Debug, Clone)]
pub enum RouteHandle {
    /// Counters of a TCP relay.
    Tcp(TcpStatsHandle),
    /// Counters and session snapshots of a UDP relay.
    Udp(UdpRelayHandle),
}

/// A configured route and its current state.
#[derive(Debug, Clone)]
pub struct RouteEntry {
    /// The forwarding rule.
    pub route: Route,

    /// Current status.
    pub status: RouteStatus,

    /// Observer, present once the listener is bound.
    pub handle: Option<RouteHandle>,
}

/// Chooses the sink each route logs to.
enum SinkSource {
    Shared(SharedSink),
    PerRoute,
}

/// Process owner for all relays.
pub struct Supervisor {
    config: RelayConfig,
    sinks: SinkSource,
    entries: Vec<RouteEntry>,
    tasks: JoinSet<(usize, Result<(), String>)>,
    relays: Vec<AbortHandle>,
}

impl Supervisor {
    /// Create a supervisor that logs every route to `sink`.
    #[must_use]
    pub fn new(config: RelayConfig, sink: SharedSink) -> Self {
        Self::with_sinks(config, SinkSource::Shared(sink))
    }

    /// Create a supervisor that logs through `tracing`, labelling each
    /// route's events with the route itself.
    #[must_use]
    pub fn with_tracing(config: RelayConfig) -> Self {
        Self::with_sinks(config, SinkSource::PerRoute)
    }

    fn with_sinks(config: RelayConfig, sinks: SinkSource) -> Self {
        let entries = config
            .routes
            .iter()
            .map(|route| RouteEntry {
                route: route.clone(),
                status: RouteStatus::Starting,
                handle: None,
            })
            .collect();

        Self {
            config,
            sinks,
            entries,
            tasks: JoinSet::new(),
            relays: Vec::new(),
        }
    }

    fn sink_for(&self, route: &Route) -> SharedSink {
        match &self.sinks {
            SinkSource::Shared(sink) => Arc::clone(sink),
            SinkSource::PerRoute => TracingSink::for_route(route.to_string()).shared(),
        }
    }

    /// Every configured route with its status.
    #[must_use]
    pub fn routes(&self) -> &[RouteEntry] {
        &self.entries
    }

    /// Number of routes currently serving.
    #[must_use]
    pub fn running(&self) -> usize {
        self.entries
            .iter()
            .filter(|e| e.status.is_running())
            .count()
    }

    /// Bind every route and start the ones that bound.
    ///
    /// Bind failures mark the route failed and are logged; they never stop
    /// the other routes. Returns the number of routes now running.
    pub async fn spawn_all(&mut self) -> usize {
        for index in 0..self.entries.len() {
            let route = self.entries[index].route.clone();
            let sink = self.sink_for(&route);
            let listen = route.listen_address();
            let target = route.target_address();

            let started = match route.protocol {
                Protocol::Tcp => {
                    TcpRelay::bind(&listen, target, self.config.tcp.clone(), Arc::clone(&sink))
                        .await
                        .map(|relay| {
                            let handle = RouteHandle::Tcp(relay.stats_handle());
                            self.spawn_route(index, async move {
                                relay.run().await.map_err(|e| e.to_string())
                            });
                            handle
                        })
                        .map_err(|e| e.to_string())
                },
                Protocol::Udp => {
                    UdpRelay::bind(&listen, target, self.config.udp.clone(), Arc::clone(&sink))
                        .await
                        .map(|relay| {
                            let handle = RouteHandle::Udp(relay.handle());
                            self.spawn_route(index, async move {
                                relay.run().await.map_err(|e| e.to_string())
                            });
                            handle
                        })
                        .map_err(|e| e.to_string())
                },
            };

            let entry = &mut self.entries[index];
            match started {
                Ok(handle) => {
                    entry.status = RouteStatus::Running;
                    entry.handle = Some(handle);
                },
                Err(message) => {
                    sink.record(&RelayEvent::RelayFailed {
                        protocol: route.protocol,
                        listen,
                        error: message.clone(),
                    });
                    entry.status = RouteStatus::Failed { message };
                },
            }
        }

        self.running()
    }

    fn spawn_route<F>(&mut self, index: usize, relay: F)
    where
        F: std::future::Future<Output = Result<(), String>> + Send + 'static,
    {
        // The relay runs in its own task so a panic is reported, not propagated.
        let relay = tokio::spawn(relay);
        self.relays.push(relay.abort_handle());

        self.tasks.spawn(async move {
            let outcome = match relay.await {
                Ok(result) => result,
                Err(e) => Err(format!("relay task aborted: {e}")),
            };
            (index, outcome)
        });
    }

    /// Drive the routes until every one of them has stopped.
    ///
    /// Relays only return on fatal errors, so in normal operation this never
    /// completes; callers race it against a shutdown signal.
    pub async fn wait(&mut self) {
        while let Some(joined) = self.tasks.join_next().await {
            let Ok((index, outcome)) = joined else {
                continue;
            };
            let route = self.entries[index].route.clone();

            let status = match outcome {
                Ok(()) => RouteStatus::Stopped,
                Err(message) => {
                    self.sink_for(&route).record(&RelayEvent::RelayFailed {
                        protocol: route.protocol,
                        listen: route.listen_address(),
                        error: message.clone(),
                    });
                    RouteStatus::Failed { message }
                },
            };
            debug!(route = %route, status = %status, "Route finished");
            self.entries[index].status = status;
        }
    }

    /// Stop every running relay.
    pub async fn shutdown(&mut self) {
        for relay in self.relays.drain(..) {
            relay.abort();
        }
        self.tasks.shutdown().await;
        for entry in &mut self.entries {
            if entry.status.is_running() {
                entry.status = RouteStatus::Stopped;
            }
        }
    }
}

impl std::fmt::Debug for Supervisor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Supervisor")
            .field("routes", &self.entries)
            .finish_non_exhaustive()
    }
}
