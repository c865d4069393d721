//! Integration tests for the UDP relay.

mod common;

use std::net::SocketAddr;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use r0n_relay::logging::{EvictionReason, FailureReason, MemorySink, RelayEvent};
use r0n_relay::modules::udp_relay::{UdpRelay, UdpRelayHandle, UdpRelaySettings};
use tokio::net::UdpSocket;

async fn start(
    target: SocketAddr,
    settings: UdpRelaySettings,
    sink: &Arc<MemorySink>,
) -> (SocketAddr, UdpRelayHandle) {
    let relay = UdpRelay::bind("127.0.0.1:0", target.to_string(), settings, sink.clone())
        .await
        .unwrap();
    let addr = relay.local_addr();
    let handle = relay.handle();
    tokio::spawn(relay.run());
    (addr, handle)
}

async fn recv_with_timeout(socket: &UdpSocket, limit: Duration) -> Option<Vec<u8>> {
    let mut buf = [0u8; 2048];
    match tokio::time::timeout(limit, socket.recv(&mut buf)).await {
        Ok(Ok(n)) => Some(buf[..n].to_vec()),
        _ => None,
    }
}

#[tokio::test]
async fn test_echo_single_datagram() {
    let echo = common::udp_echo_server().await;
    let sink = MemorySink::new();
    let (addr, _) = start(echo.addr, UdpRelaySettings::default(), &sink).await;

    let client = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    client.connect(addr).await.unwrap();
    client.send(b"A").await.unwrap();

    let reply = recv_with_timeout(&client, Duration::from_secs(5)).await;
    assert_eq!(reply.as_deref(), Some(&b"A"[..]));
}

#[tokio::test]
async fn test_datagrams_forwarded_in_order() {
    let echo = common::udp_echo_server().await;
    let sink = MemorySink::new();
    let (addr, _) = start(echo.addr, UdpRelaySettings::default(), &sink).await;

    let client = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    client.connect(addr).await.unwrap();

    // Stay under the outbound queue so nothing is dropped.
    for i in 0..20u8 {
        client.send(&[i]).await.unwrap();
    }

    for i in 0..20u8 {
        let reply = recv_with_timeout(&client, Duration::from_secs(5)).await;
        assert_eq!(reply, Some(vec![i]));
    }
}

#[tokio::test]
async fn test_one_session_per_client_address() {
    let echo = common::udp_echo_server().await;
    let sink = MemorySink::new();
    let (addr, handle) = start(echo.addr, UdpRelaySettings::default(), &sink).await;

    let first = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let second = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    for socket in [&first, &second] {
        socket.connect(addr).await.unwrap();
        for _ in 0..3 {
            socket.send(b"x").await.unwrap();
            assert!(recv_with_timeout(socket, Duration::from_secs(5))
                .await
                .is_some());
        }
    }

    let sessions = handle.sessions().await.unwrap();
    assert_eq!(sessions.len(), 2);
    let clients: Vec<SocketAddr> = sessions.iter().map(|s| s.client).collect();
    assert!(clients.contains(&first.local_addr().unwrap()));
    assert!(clients.contains(&second.local_addr().unwrap()));
    assert_eq!(handle.stats().sessions_created, 2);
}

#[tokio::test]
async fn test_idle_session_evicted() {
    let echo = common::udp_echo_server().await;
    let sink = MemorySink::new();
    let settings = UdpRelaySettings::default()
        .with_idle_timeout(Duration::from_millis(100))
        .with_sweep_interval(Duration::from_millis(50));
    let (addr, handle) = start(echo.addr, settings, &sink).await;

    let client = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    client.connect(addr).await.unwrap();
    client.send(b"hello").await.unwrap();
    assert!(recv_with_timeout(&client, Duration::from_secs(5))
        .await
        .is_some());

    let gone = common::wait_until(Duration::from_secs(2), || {
        let handle = handle.clone();
        async move { handle.session_count().await.unwrap() == 0 }
    })
    .await;
    assert!(gone);

    let expected = format!("Closed idle UDP session for {}", client.local_addr().unwrap());
    assert!(sink.lines().contains(&expected));
    assert!(sink.contains(|e| matches!(
        e,
        RelayEvent::SessionEvicted {
            reason: EvictionReason::Idle,
            ..
        }
    )));
}

#[tokio::test]
async fn test_unreachable_target_does_not_block_other_clients() {
    let echo = common::udp_echo_server().await;
    let sink = MemorySink::new();
    let (dead_addr, _) = start(
        common::unused_addr().await,
        UdpRelaySettings::default(),
        &sink,
    )
    .await;
    let (live_addr, _) = start(echo.addr, UdpRelaySettings::default(), &sink).await;

    let lost = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    lost.connect(dead_addr).await.unwrap();
    lost.send(b"nobody home").await.unwrap();
    assert!(recv_with_timeout(&lost, Duration::from_millis(300))
        .await
        .is_none());

    let served = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    served.connect(live_addr).await.unwrap();
    served.send(b"B").await.unwrap();
    let reply = recv_with_timeout(&served, Duration::from_secs(5)).await;
    assert_eq!(reply.as_deref(), Some(&b"B"[..]));
}

#[tokio::test]
async fn test_refused_target_evicts_session_on_read_failure() {
    let sink = MemorySink::new();
    let (addr, handle) = start(
        common::unused_addr().await,
        UdpRelaySettings::default(),
        &sink,
    )
    .await;

    let client = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    client.connect(addr).await.unwrap();
    client.send(b"anyone there").await.unwrap();

    // Nothing listens on the target, so the replier's read is refused.
    let expected = format!(
        "Closed UDP session for {} due to read failure",
        client.local_addr().unwrap()
    );
    let evicted = common::wait_until(Duration::from_secs(2), || {
        let sink = sink.clone();
        let expected = expected.clone();
        async move { sink.lines().contains(&expected) }
    })
    .await;
    assert!(evicted);

    assert_eq!(handle.session_count().await.unwrap(), 0);
    let stats = handle.stats();
    assert_eq!(stats.sessions_created, 1);
    assert_eq!(stats.sessions_evicted, 1);
    assert!(sink.contains(|e| matches!(
        e,
        RelayEvent::SessionEvicted {
            reason: EvictionReason::Failure(FailureReason::ReadFailure),
            ..
        }
    )));
}

#[tokio::test]
async fn test_outbound_overflow_drops_are_bounded() {
    // The target never reads and the session queue has a single slot.
    let silent = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let sink = MemorySink::new();
    let settings = UdpRelaySettings::default().with_outbound_queue(1);
    let (addr, handle) = start(silent.local_addr().unwrap(), settings, &sink).await;

    let client = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    client.connect(addr).await.unwrap();
    let burst = 2000u64;
    for _ in 0..burst {
        client.send(&[0u8; 512]).await.unwrap();
    }

    let settled = common::wait_until(Duration::from_secs(5), || {
        let handle = handle.clone();
        async move {
            let stats = handle.stats();
            stats.datagrams_received > 0
                && stats.datagrams_forwarded + stats.datagrams_dropped == stats.datagrams_received
        }
    })
    .await;
    assert!(settled);
    tokio::time::sleep(Duration::from_millis(200)).await;

    let stats = handle.stats();
    assert!(stats.datagrams_dropped > 0);
    assert!(stats.datagrams_dropped < stats.datagrams_received);
    assert_eq!(
        sink.count(|e| matches!(e, RelayEvent::DatagramDropped { .. })) as u64,
        stats.datagrams_dropped
    );
    assert_eq!(handle.session_count().await.unwrap(), 1);
}

#[tokio::test]
async fn test_zero_capacity_settings_rejected_at_bind() {
    let sink = MemorySink::new();
    let result = UdpRelay::bind(
        "127.0.0.1:0",
        "127.0.0.1:9",
        UdpRelaySettings::default().with_event_queue(0),
        sink.clone(),
    )
    .await;

    let err = result.unwrap_err();
    assert!(err.is_fatal_to_route());
    assert!(err.to_string().contains("udp.event_queue"));
}

#[tokio::test]
async fn test_echo_counts_match() {
    let echo = common::udp_echo_server().await;
    let sink = MemorySink::new();
    let (addr, handle) = start(echo.addr, UdpRelaySettings::default(), &sink).await;

    let client = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    client.connect(addr).await.unwrap();
    for _ in 0..5 {
        client.send(b"ping").await.unwrap();
        assert!(recv_with_timeout(&client, Duration::from_secs(5))
            .await
            .is_some());
    }

    assert_eq!(echo.received.load(Ordering::Relaxed), 5);
    let stats = handle.stats();
    assert_eq!(stats.datagrams_received, 5);
    assert_eq!(stats.datagrams_forwarded, 5);
    assert_eq!(stats.datagrams_replied, 5);
}
