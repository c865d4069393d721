//! # Relay Modules
//!
//! The forwarding engine. Each route gets one relay from one of these
//! modules; relays share nothing with each other.
//!
//! ## Available Modules
//!
//! - [`tcp_relay`] - TCP listener with a dial worker pool and bidirectional copy
//! - [`udp_relay`] - UDP listener with a single-owner session table

pub mod tcp_relay;
pub mod udp_relay;
