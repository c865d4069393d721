//! Relay events emitted by the forwarding engine.

use std::fmt;
use std::net::SocketAddr;

use tracing::Level;

use crate::config::Protocol;

/// Direction of a TCP copy task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Client to remote target.
    Upstream,
    /// Remote target to client.
    Downstream,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Upstream => write!(f, "client to server"),
            Self::Downstream => write!(f, "server to client"),
        }
    }
}

/// Why a UDP session's forwarder or replier gave up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureReason {
    /// Writing to the remote socket failed or timed out.
    WriteFailure,
    /// Reading from the remote socket failed.
    ReadFailure,
    /// Writing a reply back to the client failed.
    RespondFailure,
    /// The remote stayed silent and the client went idle.
    RemoteIdleTimeout,
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::WriteFailure => "write failure",
            Self::ReadFailure => "read failure",
            Self::RespondFailure => "respond failure",
            Self::RemoteIdleTimeout => "remote idle timeout",
        };
        f.write_str(text)
    }
}

/// Why a UDP session was removed from the table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvictionReason {
    /// The idle sweep found no activity within the idle threshold.
    Idle,
    /// A forwarder or replier reported a failure.
    Failure(FailureReason),
}

impl fmt::Display for EvictionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "idle timeout"),
            Self::Failure(reason) => write!(f, "{reason}"),
        }
    }
}

/// Socket operation that failed inside a UDP session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionOp {
    /// Forwarder write to the remote.
    Forward,
    /// Replier read from the remote.
    ReadReply,
    /// Replier write back to the client.
    Respond,
}

impl fmt::Display for SessionOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Forward => write!(f, "sending UDP payload"),
            Self::ReadReply => write!(f, "reading UDP reply"),
            Self::Respond => write!(f, "writing UDP reply"),
        }
    }
}

/// An observable event in the life of a relay.
///
/// Every variant renders as a single log line through [`fmt::Display`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelayEvent {
    /// A relay bound its listener and is serving.
    RelayStarted {
        /// Route protocol.
        protocol: Protocol,
        /// Bound listen address.
        listen: SocketAddr,
        /// Remote target.
        target: String,
    },

    /// A relay could not start. The route is down, others are unaffected.
    RelayFailed {
        /// Route protocol.
        protocol: Protocol,
        /// Requested listen address.
        listen: String,
        /// Rendered error.
        error: String,
    },

    /// Accepting a TCP connection failed.
    AcceptFailed {
        /// Listen address.
        listen: SocketAddr,
        /// Rendered error.
        error: String,
    },

    /// A TCP client was connected to the target.
    ConnectionOpened {
        /// Client address.
        peer: SocketAddr,
        /// Remote target.
        target: String,
    },

    /// Dialing the TCP target failed; the client was closed.
    ConnectionDialFailed {
        /// Client address.
        peer: SocketAddr,
        /// Remote target.
        target: String,
        /// Rendered error.
        error: String,
    },

    /// One copy direction of a TCP connection ended abnormally.
    CopyFailed {
        /// Client address.
        peer: SocketAddr,
        /// Remote target.
        target: String,
        /// Which direction failed.
        direction: Direction,
        /// Rendered error.
        error: String,
    },

    /// Both copy directions finished and the sockets were released.
    ConnectionClosed {
        /// Client address.
        peer: SocketAddr,
        /// Remote target.
        target: String,
        /// Bytes copied client to remote.
        bytes_up: u64,
        /// Bytes copied remote to client.
        bytes_down: u64,
    },

    /// Reading from the shared UDP listener failed.
    DatagramReadFailed {
        /// Listen address.
        listen: SocketAddr,
        /// Rendered error.
        error: String,
    },

    /// The ingestion channel was full and the read loop had to wait.
    IngestStalled {
        /// Listen address.
        listen: SocketAddr,
    },

    /// The UDP target could not be resolved.
    TargetResolveFailed {
        /// Remote target.
        target: String,
        /// Rendered error.
        error: String,
    },

    /// A dedicated remote socket could not be opened for a client.
    SessionDialFailed {
        /// Client address.
        client: SocketAddr,
        /// Remote target.
        target: String,
        /// Rendered error.
        error: String,
    },

    /// A UDP session was created for a new client address.
    SessionCreated {
        /// Client address.
        client: SocketAddr,
        /// Session generation number.
        session_id: u64,
        /// Resolved remote address.
        remote: SocketAddr,
    },

    /// A datagram was dropped because the session queue was full.
    DatagramDropped {
        /// Client address.
        client: SocketAddr,
    },

    /// A socket operation inside a session failed.
    SessionIoFailed {
        /// Client address.
        client: SocketAddr,
        /// Failed operation.
        op: SessionOp,
        /// Rendered error.
        error: String,
    },

    /// The failure event could not be queued; the session is left running.
    EventQueueFull {
        /// Client address.
        client: SocketAddr,
        /// Failure that was not delivered.
        reason: FailureReason,
    },

    /// A session was removed from the table.
    SessionEvicted {
        /// Client address.
        client: SocketAddr,
        /// Why it was removed.
        reason: EvictionReason,
    },
}

impl RelayEvent {
    /// Severity the event should be logged at.
    #[must_use]
    pub fn level(&self) -> Level {
        match self {
            Self::RelayFailed { .. } => Level::ERROR,
            Self::AcceptFailed { .. }
            | Self::ConnectionDialFailed { .. }
            | Self::CopyFailed { .. }
            | Self::DatagramReadFailed { .. }
            | Self::IngestStalled { .. }
            | Self::TargetResolveFailed { .. }
            | Self::SessionDialFailed { .. }
            | Self::DatagramDropped { .. }
            | Self::SessionIoFailed { .. }
            | Self::EventQueueFull { .. } => Level::WARN,
            Self::RelayStarted { .. }
            | Self::ConnectionOpened { .. }
            | Self::ConnectionClosed { .. }
            | Self::SessionCreated { .. }
            | Self::SessionEvicted { .. } => Level::INFO,
        }
    }

    /// Short machine-friendly name of the event.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::RelayStarted { .. } => "relay_started",
            Self::RelayFailed { .. } => "relay_failed",
            Self::AcceptFailed { .. } => "accept_failed",
            Self::ConnectionOpened { .. } => "connection_opened",
            Self::ConnectionDialFailed { .. } => "connection_dial_failed",
            Self::CopyFailed { .. } => "copy_failed",
            Self::ConnectionClosed { .. } => "connection_closed",
            Self::DatagramReadFailed { .. } => "datagram_read_failed",
            Self::IngestStalled { .. } => "ingest_stalled",
            Self::TargetResolveFailed { .. } => "target_resolve_failed",
            Self::SessionDialFailed { .. } => "session_dial_failed",
            Self::SessionCreated { .. } => "session_created",
            Self::DatagramDropped { .. } => "datagram_dropped",
            Self::SessionIoFailed { .. } => "session_io_failed",
            Self::EventQueueFull { .. } => "event_queue_full",
            Self::SessionEvicted { .. } => "session_evicted",
        }
    }
}

impl fmt::Display for RelayEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RelayStarted {
                protocol,
                listen,
                target,
            } => write!(f, "{protocol} relay started on {listen} forwarding to {target}"),
            Self::RelayFailed {
                protocol,
                listen,
                error,
            } => write!(f, "Failed to start {protocol} relay on {listen}: {error}"),
            Self::AcceptFailed { listen, error } => {
                write!(f, "Error accepting TCP connection on {listen}: {error}")
            },
            Self::ConnectionOpened { peer, target } => {
                write!(f, "New TCP connection: {peer} -> {target}")
            },
            Self::ConnectionDialFailed {
                peer,
                target,
                error,
            } => write!(f, "Failed to connect to TCP server {target} for {peer}: {error}"),
            Self::CopyFailed {
                peer,
                target,
                direction,
                error,
            } => write!(
                f,
                "Error copying {direction} ({peer} <-> {target}): {error}"
            ),
            Self::ConnectionClosed {
                peer,
                target,
                bytes_up,
                bytes_down,
            } => write!(
                f,
                "TCP connection closed: {peer} -> {target} ({bytes_up} bytes up, {bytes_down} bytes down)"
            ),
            Self::DatagramReadFailed { listen, error } => {
                write!(f, "Error reading UDP packet on {listen}: {error}")
            },
            Self::IngestStalled { listen } => write!(
                f,
                "UDP ingestion queue full on {listen}; read loop waiting for the session manager"
            ),
            Self::TargetResolveFailed { target, error } => {
                write!(f, "Failed to resolve UDP target {target}: {error}")
            },
            Self::SessionDialFailed {
                client,
                target,
                error,
            } => write!(f, "Failed to dial UDP target {target} for {client}: {error}"),
            Self::SessionCreated {
                client,
                session_id,
                remote,
            } => write!(f, "Opened UDP session #{session_id} for {client} via {remote}"),
            Self::DatagramDropped { client } => {
                write!(f, "Dropping UDP packet for {client} due to full queue")
            },
            Self::SessionIoFailed { client, op, error } => {
                write!(f, "Error {op} for {client}: {error}")
            },
            Self::EventQueueFull { client, reason } => write!(
                f,
                "Session event queue full; leaking UDP session {client} due to {reason}"
            ),
            Self::SessionEvicted { client, reason } => match reason {
                EvictionReason::Idle => write!(f, "Closed idle UDP session for {client}"),
                EvictionReason::Failure(cause) => {
                    write!(f, "Closed UDP session for {client} due to {cause}")
                },
            },
        }
    }
}
