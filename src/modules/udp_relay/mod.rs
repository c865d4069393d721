//! # UDP Relay Module
//!
//! Relays UDP datagrams from many clients on one listening socket to one
//! fixed target, giving every client address its own remote socket so the
//! target sees a stable source port per client.
//!
//! ## Architecture
//!
//! - A read loop copies each datagram off the shared socket and hands it to
//!   the manager through a bounded ingestion channel.
//! - One manager task owns the session table. It creates sessions on first
//!   contact, sweeps idle ones, evicts failed ones, and answers snapshot
//!   queries. Nothing else touches the table.
//! - Each session runs a forwarder (outbound queue to remote) and a replier
//!   (remote back to the client through the shared socket). They report
//!   failures to the manager and never block doing so.
//!
//! ## Configuration
//!
//! ```toml
//! [udp]
//! idle_timeout_secs = 60
//! sweep_interval_secs = 30
//! write_timeout_secs = 2
//! read_timeout_secs = 5
//! outbound_queue = 32
//! ```

mod config;
mod error;
mod manager;
mod pump;
mod relay;
mod session;
mod stats;

pub use config::UdpRelaySettings;
pub use error::{UdpRelayError, UdpRelayResult};
pub use relay::{start_relay, UdpRelay, UdpRelayHandle};
pub use session::{ActivityClock, SessionInfo};
pub use stats::{UdpRelayStats, UdpStatsHandle};
