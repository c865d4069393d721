//! TCP relay: one listener, a fixed dial worker pool, and per-connection copy tasks.

use std::net::SocketAddr;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;
use tracing::debug;

use crate::config::Protocol;
use crate::logging::{RelayEvent, SharedSink};

use super::config::TcpRelaySettings;
use super::error::{TcpRelayError, TcpRelayResult};
use super::stats::{TcpRelayStats, TcpStatsHandle};
use super::worker::{self, Accepted, WorkerContext};

/// Pause after a failed accept so persistent errors (fd exhaustion) do not spin.
const ACCEPT_BACKOFF: Duration = Duration::from_millis(10);

/// A bound TCP relay for one route.
pub struct TcpRelay {
    /// The bound listener.
    listener: TcpListener,

    /// The bound address.
    local_addr: SocketAddr,

    /// Worker state shared with every dial worker.
    ctx: Arc<WorkerContext>,
}

impl TcpRelay {
    /// Bind the listen address.
    ///
    /// # Errors
    ///
    /// Returns `TcpRelayError::InvalidSetting` for unusable settings and
    /// `TcpRelayError::BindError` if the address cannot be bound.
    pub async fn bind(
        listen: &str,
        target: impl Into<String>,
        settings: TcpRelaySettings,
        sink: SharedSink,
    ) -> TcpRelayResult<Self> {
        settings.check()?;
        let bind_error = |source| TcpRelayError::BindError {
            address: listen.to_string(),
            source,
        };

        let listener = TcpListener::bind(listen).await.map_err(bind_error)?;
        let local_addr = listener.local_addr().map_err(bind_error)?;

        Ok(Self {
            listener,
            local_addr,
            ctx: Arc::new(WorkerContext {
                target: target.into(),
                settings,
                sink,
                stats: TcpStatsHandle::default(),
            }),
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
        &self.ctx.target
    }

    /// Get relay statistics.
    #[must_use]
    pub fn stats(&self) -> TcpRelayStats {
        self.ctx.stats.snapshot()
    }

    /// Handle for reading statistics after [`TcpRelay::run`] takes ownership.
    #[must_use]
    pub fn stats_handle(&self) -> TcpStatsHandle {
        self.ctx.stats.clone()
    }

    /// Serve the route until the worker pool is gone.
    ///
    /// Accept errors are logged and the loop continues.
    ///
    /// # Errors
    ///
    /// Returns `TcpRelayError::WorkersStopped` if no worker is left to take
    /// accepted clients.
    pub async fn run(self) -> TcpRelayResult<()> {
        let workers = self.ctx.settings.worker_count();

        // Rendezvous channel: the accept loop waits until a worker is free.
        let (handoff_tx, handoff_rx) = flume::bounded::<Accepted>(0);
        for worker_id in 0..workers {
            tokio::spawn(worker::run(
                worker_id,
                handoff_rx.clone(),
                Arc::clone(&self.ctx),
            ));
        }
        drop(handoff_rx);

        debug!(listen = %self.local_addr, workers, "TCP worker pool started");
        self.ctx.sink.record(&RelayEvent::RelayStarted {
            protocol: Protocol::Tcp,
            listen: self.local_addr,
            target: self.ctx.target.clone(),
        });

        let stats = self.ctx.stats.inner();
        loop {
            match self.listener.accept().await {
                Ok((stream, peer)) => {
                    stats.accepted.fetch_add(1, Ordering::Relaxed);
                    if handoff_tx
                        .send_async(Accepted { stream, peer })
                        .await
                        .is_err()
                    {
                        return Err(TcpRelayError::WorkersStopped);
                    }
                },
                Err(e) => {
                    stats.accept_errors.fetch_add(1, Ordering::Relaxed);
                    self.ctx.sink.record(&RelayEvent::AcceptFailed {
                        listen: self.local_addr,
                        error: e.to_string(),
                    });
                    tokio::time::sleep(ACCEPT_BACKOFF).await;
                },
            }
        }
    }
}

impl std::fmt::Debug for TcpRelay {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TcpRelay")
            .field("local_addr", &self.local_addr)
            .field("target", &self.ctx.target)
            .finish_non_exhaustive()
    }
}

/// Bind `listen` and relay every connection to `target` with default settings.
///
/// Returns only when the route fails.
///
/// # Errors
///
/// Returns `TcpRelayError::BindError` when the listener cannot be bound.
pub async fn start_relay(listen: &str, target: &str, sink: SharedSink) -> TcpRelayResult<()> {
    TcpRelay::bind(listen, target, TcpRelaySettings::default(), sink)
        .await?
        .run()
        .await
}
