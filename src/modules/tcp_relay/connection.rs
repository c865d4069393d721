//! A relayed TCP connection pair.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;

use crate::logging::Direction;

/// Global connection ID counter.
static CONNECTION_ID: AtomicU64 = AtomicU64::new(0);

/// An accepted client paired with its freshly dialed remote socket.
///
/// The pair is owned by exactly one task and is consumed by [`Connection::relay`].
#[derive(Debug)]
pub struct Connection {
    /// Connection ID for tracking.
    id: u64,

    /// Client socket.
    client: TcpStream,

    /// Client address.
    peer_addr: SocketAddr,

    /// Dialed remote socket.
    remote: TcpStream,

    /// Time the remote was connected.
    opened_at: Instant,
}

/// Result of copying one direction of a connection.
#[derive(Debug)]
pub struct CopyOutcome {
    /// Which way the bytes flowed.
    pub direction: Direction,

    /// Bytes written to the destination.
    pub bytes: u64,

    /// The error that ended the copy, if it did not end on EOF.
    pub error: Option<std::io::Error>,
}

/// Outcome of a fully relayed connection.
#[derive(Debug)]
pub struct RelayOutcome {
    /// Client to remote.
    pub upstream: CopyOutcome,

    /// Remote to client.
    pub downstream: CopyOutcome,

    /// Time from dial to both directions finishing.
    pub duration: Duration,
}

impl Connection {
    /// Pair a client socket with its remote socket.
    #[must_use]
    pub fn new(client: TcpStream, peer_addr: SocketAddr, remote: TcpStream) -> Self {
        Self {
            id: CONNECTION_ID.fetch_add(1, Ordering::Relaxed),
            client,
            peer_addr,
            remote,
            opened_at: Instant::now(),
        }
    }

    /// Get the connection ID.
    #[must_use]
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Get the client address.
    #[must_use]
    pub fn peer_addr(&self) -> SocketAddr {
        self.peer_addr
    }

    /// Disable Nagle's algorithm on both sockets.
    ///
    /// # Errors
    ///
    /// Returns the first socket option failure.
    pub fn set_nodelay(&self) -> std::io::Result<()> {
        self.client.set_nodelay(true)?;
        self.remote.set_nodelay(true)
    }

    /// Copy bytes both ways until each direction finishes.
    ///
    /// Each direction runs as its own task. When one source reaches EOF (or
    /// fails) the matching destination write half is shut down, and the other
    /// direction keeps running. Both sockets are closed once both tasks end.
    pub async fn relay(self, buffer_size: usize) -> RelayOutcome {
        let (client_read, client_write) = self.client.into_split();
        let (remote_read, remote_write) = self.remote.into_split();

        let upstream = tokio::spawn(copy_half(
            client_read,
            remote_write,
            Direction::Upstream,
            buffer_size,
        ));
        let downstream = tokio::spawn(copy_half(
            remote_read,
            client_write,
            Direction::Downstream,
            buffer_size,
        ));

        let (upstream, downstream) = tokio::join!(upstream, downstream);

        RelayOutcome {
            upstream: joined(upstream, Direction::Upstream),
            downstream: joined(downstream, Direction::Downstream),
            duration: self.opened_at.elapsed(),
        }
    }
}

fn joined(
    result: Result<CopyOutcome, tokio::task::JoinError>,
    direction: Direction,
) -> CopyOutcome {
    result.unwrap_or_else(|e| CopyOutcome {
        direction,
        bytes: 0,
        error: Some(std::io::Error::other(e.to_string())),
    })
}

/// Copy from `reader` to `writer` until EOF or error, then shut `writer` down.
async fn copy_half<R, W>(
    mut reader: R,
    mut writer: W,
    direction: Direction,
    buffer_size: usize,
) -> CopyOutcome
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut buf = vec![0u8; buffer_size.max(1)];
    let mut bytes = 0u64;

    let error = loop {
        match reader.read(&mut buf).await {
            Ok(0) => break None,
            Ok(n) => {
                if let Err(e) = writer.write_all(&buf[..n]).await {
                    break Some(e);
                }
                bytes += n as u64;
            },
            Err(e) => break Some(e),
        }
    };

    // The peer may already be gone; a failed shutdown changes nothing.
    let _ = writer.shutdown().await;

    CopyOutcome {
        direction,
        bytes,
        error,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    async fn socket_pair() -> (TcpStream, TcpStream) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (client, accepted) = tokio::join!(TcpStream::connect(addr), listener.accept());
        (client.unwrap(), accepted.unwrap().0)
    }

    #[tokio::test]
    async fn test_copy_half_counts_and_shuts_down() {
        let (mut source, source_peer) = socket_pair().await;
        let (dest_peer, mut dest) = socket_pair().await;

        let copy = tokio::spawn(copy_half(source_peer, dest_peer, Direction::Upstream, 4));

        source.write_all(b"hello relay").await.unwrap();
        source.shutdown().await.unwrap();

        let mut received = Vec::new();
        dest.read_to_end(&mut received).await.unwrap();
        assert_eq!(received, b"hello relay");

        let outcome = copy.await.unwrap();
        assert_eq!(outcome.bytes, 11);
        assert!(outcome.error.is_none());
    }

    #[tokio::test]
    async fn test_connection_ids_increase() {
        let (a, b) = socket_pair().await;
        let (c, d) = socket_pair().await;
        let peer = a.local_addr().unwrap();

        let first = Connection::new(a, peer, b);
        let second = Connection::new(c, peer, d);
        assert!(second.id() > first.id());
        assert_eq!(first.peer_addr(), peer);
    }
}
