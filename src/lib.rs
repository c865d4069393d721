//! # R0N Relay
//!
//! A Layer-4 TCP and UDP relay. Each route forwards one local port to one
//! fixed remote endpoint without looking at the bytes it carries.
//!
//! ## Features
//!
//! - TCP relaying with a per-route dial worker pool
//! - UDP relaying with stable per-client source ports, idle eviction and
//!   failure-driven teardown
//! - Per-route failure isolation
//! - Structured relay events through a pluggable [`logging::LogSink`]
//!
//! ## Architecture
//!
//! The [`supervisor`] binds one relay per route from the [`config`]. The
//! relays themselves live in [`modules`]: [`modules::tcp_relay`] and
//! [`modules::udp_relay`]. Every relay reports what it does as
//! [`logging::RelayEvent`]s.

pub mod config;
pub mod logging;
pub mod modules;
pub mod supervisor;
