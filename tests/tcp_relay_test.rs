//! Integration tests for the TCP relay.

mod common;

use std::time::Duration;

use r0n_relay::logging::{MemorySink, RelayEvent};
use r0n_relay::modules::tcp_relay::{TcpRelay, TcpRelaySettings, TcpStatsHandle};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

async fn start(target: SocketAddr, sink: &Arc<MemorySink>) -> (SocketAddr, TcpStatsHandle) {
    let relay = TcpRelay::bind(
        "127.0.0.1:0",
        target.to_string(),
        TcpRelaySettings::default().with_workers(2),
        sink.clone(),
    )
    .await
    .unwrap();
    let addr = relay.local_addr();
    let stats = relay.stats_handle();
    tokio::spawn(relay.run());
    (addr, stats)
}

#[tokio::test]
async fn test_ping_echo_and_close_logged() {
    let target = common::tcp_echo_server().await;
    let sink = MemorySink::new();
    let (addr, _) = start(target, &sink).await;

    let mut client = TcpStream::connect(addr).await.unwrap();
    client.write_all(b"ping").await.unwrap();
    let mut buf = [0u8; 4];
    client.read_exact(&mut buf).await.unwrap();
    assert_eq!(&buf, b"ping");
    drop(client);

    let closed = common::wait_until(Duration::from_secs(5), || {
        let sink = Arc::clone(&sink);
        async move { sink.contains(|e| matches!(e, RelayEvent::ConnectionClosed { .. })) }
    })
    .await;
    assert!(closed);
    assert!(sink
        .lines()
        .iter()
        .any(|line| line.starts_with("New TCP connection:")));
}

#[tokio::test]
async fn test_large_payload_bidirectional_order() {
    let target = common::tcp_echo_server().await;
    let sink = MemorySink::new();
    let (addr, stats) = start(target, &sink).await;

    let payload = common::random_payload(1024 * 1024);
    let client = TcpStream::connect(addr).await.unwrap();
    let (mut reader, mut writer) = client.into_split();

    let to_send = payload.clone();
    let sender = tokio::spawn(async move {
        writer.write_all(&to_send).await.unwrap();
        writer.shutdown().await.unwrap();
    });

    let mut echoed = Vec::with_capacity(payload.len());
    tokio::time::timeout(Duration::from_secs(30), reader.read_to_end(&mut echoed))
        .await
        .unwrap()
        .unwrap();
    sender.await.unwrap();

    assert_eq!(echoed.len(), payload.len());
    assert!(echoed == payload, "echoed bytes differ from sent bytes");

    let done = common::wait_until(Duration::from_secs(5), || {
        let stats = stats.clone();
        async move { stats.snapshot().completed == 1 }
    })
    .await;
    assert!(done);
    let snapshot = stats.snapshot();
    assert_eq!(snapshot.bytes_up, payload.len() as u64);
    assert_eq!(snapshot.bytes_down, payload.len() as u64);
}

#[tokio::test]
async fn test_refused_target_closes_client() {
    let refused = common::unused_addr().await;
    let sink = MemorySink::new();
    let (addr, stats) = start(refused, &sink).await;

    let mut client = TcpStream::connect(addr).await.unwrap();
    let mut buf = [0u8; 1];
    let n = tokio::time::timeout(Duration::from_secs(5), client.read(&mut buf))
        .await
        .unwrap()
        .unwrap_or(0);
    assert_eq!(n, 0);

    let logged = common::wait_until(Duration::from_secs(5), || {
        let sink = Arc::clone(&sink);
        async move { sink.contains(|e| matches!(e, RelayEvent::ConnectionDialFailed { .. })) }
    })
    .await;
    assert!(logged);
    assert_eq!(stats.snapshot().dial_failures, 1);
}

#[tokio::test]
async fn test_refused_target_does_not_affect_other_routes() {
    let sink = MemorySink::new();
    let (dead, _) = start(common::unused_addr().await, &sink).await;
    let (live, _) = start(common::tcp_echo_server().await, &sink).await;

    let mut doomed = Vec::new();
    for _ in 0..4 {
        doomed.push(TcpStream::connect(dead).await.unwrap());
    }

    let mut client = TcpStream::connect(live).await.unwrap();
    client.write_all(b"still here").await.unwrap();
    let mut buf = [0u8; 10];
    tokio::time::timeout(Duration::from_secs(5), client.read_exact(&mut buf))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(&buf, b"still here");
}

#[tokio::test]
async fn test_many_concurrent_connections() {
    let target = common::tcp_echo_server().await;
    let sink = MemorySink::new();
    let (addr, stats) = start(target, &sink).await;

    let mut clients = Vec::new();
    for i in 0..20u8 {
        clients.push(tokio::spawn(async move {
            let mut stream = TcpStream::connect(addr).await.unwrap();
            let message = [i; 64];
            stream.write_all(&message).await.unwrap();
            let mut buf = [0u8; 64];
            stream.read_exact(&mut buf).await.unwrap();
            assert_eq!(buf, message);
        }));
    }
    for client in clients {
        client.await.unwrap();
    }

    let done = common::wait_until(Duration::from_secs(5), || {
        let stats = stats.clone();
        async move { stats.snapshot().completed == 20 }
    })
    .await;
    assert!(done);
    assert_eq!(stats.snapshot().active, 0);
}
