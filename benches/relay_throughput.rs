#![allow(clippy::all)]
//! Benchmarks for the relay data paths.
//!
//! Tests: TCP round trip and bulk copy through a relay, UDP round trip
//! through a session, and the route parser.

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use r0n_relay::config::{Protocol, Route};
use r0n_relay::logging::MemorySink;
use r0n_relay::modules::tcp_relay::{TcpRelay, TcpRelaySettings};
use r0n_relay::modules::udp_relay::{UdpRelay, UdpRelaySettings};
use std::hint::black_box;
use std::net::SocketAddr;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream, UdpSocket};

fn bench_runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .expect("Failed to build Tokio runtime for benchmarks")
}

async fn tcp_echo() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        while let Ok((mut stream, _)) = listener.accept().await {
            tokio::spawn(async move {
                let (mut r, mut w) = stream.split();
                let _ = tokio::io::copy(&mut r, &mut w).await;
            });
        }
    });
    addr
}

async fn udp_echo() -> SocketAddr {
    let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let addr = socket.local_addr().unwrap();
    tokio::spawn(async move {
        let mut buf = vec![0u8; 65536];
        while let Ok((n, from)) = socket.recv_from(&mut buf).await {
            let _ = socket.send_to(&buf[..n], from).await;
        }
    });
    addr
}

// ---------------------------------------------------------------------------
// TCP
// ---------------------------------------------------------------------------

fn bench_tcp(c: &mut Criterion) {
    let mut group = c.benchmark_group("tcp_relay");
    let rt = bench_runtime();

    let relay_addr = rt.block_on(async {
        let target = tcp_echo().await;
        let relay = TcpRelay::bind(
            "127.0.0.1:0",
            target.to_string(),
            TcpRelaySettings::default(),
            MemorySink::new(),
        )
        .await
        .unwrap();
        let addr = relay.local_addr();
        tokio::spawn(relay.run());
        addr
    });

    let mut stream = rt.block_on(TcpStream::connect(relay_addr)).unwrap();

    group.bench_function("round_trip_64b", |b| {
        let message = [7u8; 64];
        let mut buf = [0u8; 64];
        b.iter(|| {
            rt.block_on(async {
                stream.write_all(&message).await.unwrap();
                stream.read_exact(&mut buf).await.unwrap();
            });
            black_box(&buf);
        });
    });

    for size in [16 * 1024usize, 256 * 1024] {
        let payload = vec![0xABu8; size];
        let mut echoed = vec![0u8; size];
        group.throughput(Throughput::Bytes(size as u64));
        group.bench_with_input(BenchmarkId::new("bulk_echo", size), &size, |b, _| {
            b.iter(|| {
                rt.block_on(async {
                    let (mut r, mut w) = stream.split();
                    let (written, read) =
                        tokio::join!(w.write_all(&payload), r.read_exact(&mut echoed));
                    written.unwrap();
                    read.unwrap();
                });
            });
        });
    }

    group.finish();
}

// ---------------------------------------------------------------------------
// UDP
// ---------------------------------------------------------------------------

fn bench_udp(c: &mut Criterion) {
    let mut group = c.benchmark_group("udp_relay");
    let rt = bench_runtime();

    let client = rt.block_on(async {
        let target = udp_echo().await;
        let relay = UdpRelay::bind(
            "127.0.0.1:0",
            target.to_string(),
            UdpRelaySettings::default(),
            MemorySink::new(),
        )
        .await
        .unwrap();
        let addr = relay.local_addr();
        tokio::spawn(relay.run());

        let client = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        client.connect(addr).await.unwrap();
        client
    });

    for size in [64usize, 1200] {
        let payload = vec![1u8; size];
        let mut buf = vec![0u8; size];
        group.throughput(Throughput::Bytes(size as u64));
        group.bench_with_input(BenchmarkId::new("round_trip", size), &size, |b, _| {
            b.iter(|| {
                let n = rt.block_on(async {
                    client.send(&payload).await.unwrap();
                    client.recv(&mut buf).await.unwrap()
                });
                black_box(n);
            });
        });
    }

    group.finish();
}

// ---------------------------------------------------------------------------
// Route parsing
// ---------------------------------------------------------------------------

fn bench_route_parse(c: &mut Criterion) {
    let list = (0..32)
        .map(|i| format!("{}:10.0.0.{}:{}", 8000 + i, i + 1, 9000 + i))
        .collect::<Vec<_>>()
        .join(",");

    c.bench_function("config/parse_route_list_32", |b| {
        b.iter(|| black_box(Route::parse_list(Protocol::Tcp, black_box(&list)).unwrap()));
    });
}

criterion_group!(benches, bench_tcp, bench_udp, bench_route_parse);
criterion_main!(benches);
