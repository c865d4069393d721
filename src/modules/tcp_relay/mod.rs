//! # TCP Relay Module
//!
//! Relays TCP connections from one listen address to one fixed target.
//!
//! ## Features
//!
//! - Fixed pool of dial workers (one per core by default) fed through a
//!   rendezvous handoff channel
//! - Two independent copy tasks per connection with half-close propagation
//! - Per-connection failure isolation: dial and copy errors are logged,
//!   never retried
//! - Atomic counters readable while the relay runs
//!
//! ## Configuration
//!
//! ```toml
//! [tcp]
//! workers = 0        # 0 = number of cores
//! buffer_size = 32768
//! nodelay = true
//! ```

mod config;
mod connection;
mod error;
mod relay;
mod stats;
mod worker;

pub use config::{available_cores, TcpRelaySettings};
pub use connection::{Connection, CopyOutcome, RelayOutcome};
pub use error::{TcpRelayError, TcpRelayResult};
pub use relay::{start_relay, TcpRelay};
pub use stats::{TcpRelayStats, TcpStatsHandle};
