//! Dial workers.
//!
//! Each worker takes accepted clients one at a time from the handoff channel,
//! dials the target, and spawns the copy tasks for the pair before taking the
//! next client.

use std::net::SocketAddr;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use tokio::net::TcpStream;
use tracing::debug;

use crate::logging::{RelayEvent, SharedSink};

use super::config::TcpRelaySettings;
use super::connection::{Connection, CopyOutcome};
use super::stats::TcpStatsHandle;

/// An accepted client waiting for a worker.
#[derive(Debug)]
pub(crate) struct Accepted {
    pub(crate) stream: TcpStream,
    pub(crate) peer: SocketAddr,
}

/// State shared by all workers of one relay.
pub(crate) struct WorkerContext {
    pub(crate) target: String,
    pub(crate) settings: TcpRelaySettings,
    pub(crate) sink: SharedSink,
    pub(crate) stats: TcpStatsHandle,
}

/// Serve handoffs until the channel closes.
pub(crate) async fn run(
    worker_id: usize,
    handoff: flume::Receiver<Accepted>,
    ctx: Arc<WorkerContext>,
) {
    while let Ok(accepted) = handoff.recv_async().await {
        dial(accepted, &ctx).await;
    }
    debug!(worker_id, target = %ctx.target, "TCP worker stopped");
}

async fn dial(accepted: Accepted, ctx: &Arc<WorkerContext>) {
    let Accepted { stream, peer } = accepted;

    let remote = match TcpStream::connect(ctx.target.as_str()).await {
        Ok(remote) => remote,
        Err(e) => {
            ctx.stats
                .inner()
                .dial_failures
                .fetch_add(1, Ordering::Relaxed);
            ctx.sink.record(&RelayEvent::ConnectionDialFailed {
                peer,
                target: ctx.target.clone(),
                error: e.to_string(),
            });
            // Dropping the client closes it.
            return;
        },
    };

    let conn = Connection::new(stream, peer, remote);
    if ctx.settings.nodelay {
        if let Err(e) = conn.set_nodelay() {
            debug!(conn_id = conn.id(), error = %e, "Failed to set TCP_NODELAY");
        }
    }

    ctx.stats.inner().active.fetch_add(1, Ordering::Relaxed);
    ctx.sink.record(&RelayEvent::ConnectionOpened {
        peer,
        target: ctx.target.clone(),
    });

    tokio::spawn(pump(conn, Arc::clone(ctx)));
}

async fn pump(conn: Connection, ctx: Arc<WorkerContext>) {
    let conn_id = conn.id();
    let peer = conn.peer_addr();

    let outcome = conn.relay(ctx.settings.buffer_size).await;

    let stats = ctx.stats.inner();
    stats
        .bytes_up
        .fetch_add(outcome.upstream.bytes, Ordering::Relaxed);
    stats
        .bytes_down
        .fetch_add(outcome.downstream.bytes, Ordering::Relaxed);

    for copy in [&outcome.upstream, &outcome.downstream] {
        report_copy_error(copy, peer, &ctx);
    }

    stats.active.fetch_sub(1, Ordering::Relaxed);
    stats.completed.fetch_add(1, Ordering::Relaxed);

    debug!(conn_id, duration_ms = outcome.duration.as_millis() as u64, "Connection completed");
    ctx.sink.record(&RelayEvent::ConnectionClosed {
        peer,
        target: ctx.target.clone(),
        bytes_up: outcome.upstream.bytes,
        bytes_down: outcome.downstream.bytes,
    });
}

fn report_copy_error(copy: &CopyOutcome, peer: SocketAddr, ctx: &WorkerContext) {
    if let Some(e) = &copy.error {
        ctx.sink.record(&RelayEvent::CopyFailed {
            peer,
            target: ctx.target.clone(),
            direction: copy.direction,
            error: e.to_string(),
        });
    }
}
