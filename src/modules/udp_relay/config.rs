//! UDP relay settings.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::modules::tcp_relay::available_cores;

use super::error::{UdpRelayError, UdpRelayResult};

/// Tuning for UDP relays.
///
/// Durations are whole seconds in configuration files. Tests and embedders
/// can set sub-second values through the `with_*` builders.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UdpRelaySettings {
    /// Evict a session after this much inactivity.
    pub idle_timeout_secs: u64,

    /// How often the idle sweep runs.
    pub sweep_interval_secs: u64,

    /// Deadline for one write to the remote.
    pub write_timeout_secs: u64,

    /// Rolling deadline for reads from the remote.
    pub read_timeout_secs: u64,

    /// Per-session outbound queue capacity.
    pub outbound_queue: usize,

    /// Ingestion channel slots per logical core.
    pub ingest_per_core: usize,

    /// Failure event channel capacity.
    pub event_queue: usize,

    /// Largest datagram accepted or relayed.
    pub max_datagram_size: usize,

    #[serde(skip)]
    overrides: Overrides,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct Overrides {
    idle_timeout: Option<Duration>,
    sweep_interval: Option<Duration>,
    write_timeout: Option<Duration>,
    read_timeout: Option<Duration>,
}

impl Default for UdpRelaySettings {
    fn default() -> Self {
        Self {
            idle_timeout_secs: 60,
            sweep_interval_secs: 30,
            write_timeout_secs: 2,
            read_timeout_secs: 5,
            outbound_queue: 32,
            ingest_per_core: 16,
            event_queue: 128,
            max_datagram_size: 65_535,
            overrides: Overrides::default(),
        }
    }
}

impl UdpRelaySettings {
    /// Idle threshold.
    #[must_use]
    pub fn idle_timeout(&self) -> Duration {
        self.overrides
            .idle_timeout
            .unwrap_or_else(|| Duration::from_secs(self.idle_timeout_secs))
    }

    /// Sweep period.
    #[must_use]
    pub fn sweep_interval(&self) -> Duration {
        self.overrides
            .sweep_interval
            .unwrap_or_else(|| Duration::from_secs(self.sweep_interval_secs))
    }

    /// Write deadline.
    #[must_use]
    pub fn write_timeout(&self) -> Duration {
        self.overrides
            .write_timeout
            .unwrap_or_else(|| Duration::from_secs(self.write_timeout_secs))
    }

    /// Read deadline.
    #[must_use]
    pub fn read_timeout(&self) -> Duration {
        self.overrides
            .read_timeout
            .unwrap_or_else(|| Duration::from_secs(self.read_timeout_secs))
    }

    /// Ingestion channel capacity.
    #[must_use]
    pub fn ingest_capacity(&self) -> usize {
        (available_cores() * self.ingest_per_core).max(1)
    }

    /// Override the idle threshold.
    #[must_use]
    pub fn with_idle_timeout(mut self, timeout: Duration) -> Self {
        self.overrides.idle_timeout = Some(timeout);
        self
    }

    /// Override the sweep period.
    #[must_use]
    pub fn with_sweep_interval(mut self, interval: Duration) -> Self {
        self.overrides.sweep_interval = Some(interval);
        self
    }

    /// Override the write deadline.
    #[must_use]
    pub fn with_write_timeout(mut self, timeout: Duration) -> Self {
        self.overrides.write_timeout = Some(timeout);
        self
    }

    /// Override the read deadline.
    #[must_use]
    pub fn with_read_timeout(mut self, timeout: Duration) -> Self {
        self.overrides.read_timeout = Some(timeout);
        self
    }

    /// Set the per-session outbound queue capacity.
    #[must_use]
    pub fn with_outbound_queue(mut self, capacity: usize) -> Self {
        self.outbound_queue = capacity;
        self
    }

    /// Set the failure event channel capacity.
    #[must_use]
    pub fn with_event_queue(mut self, capacity: usize) -> Self {
        self.event_queue = capacity;
        self
    }

    /// Reject settings a relay cannot run with.
    ///
    /// Channels need at least one slot and the sweep, deadlines and receive
    /// buffer must all be non-zero.
    ///
    /// # Errors
    ///
    /// Returns `UdpRelayError::InvalidSetting` naming the first zero value.
    pub fn check(&self) -> UdpRelayResult<()> {
        let zeroes = [
            ("udp.idle_timeout_secs", self.idle_timeout().is_zero()),
            ("udp.sweep_interval_secs", self.sweep_interval().is_zero()),
            ("udp.write_timeout_secs", self.write_timeout().is_zero()),
            ("udp.read_timeout_secs", self.read_timeout().is_zero()),
            ("udp.outbound_queue", self.outbound_queue == 0),
            ("udp.ingest_per_core", self.ingest_per_core == 0),
            ("udp.event_queue", self.event_queue == 0),
            ("udp.max_datagram_size", self.max_datagram_size == 0),
        ];

        match zeroes.into_iter().find(|(_, zero)| *zero) {
            Some((field, _)) => Err(UdpRelayError::InvalidSetting { field }),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = UdpRelaySettings::default();
        assert_eq!(settings.idle_timeout(), Duration::from_secs(60));
        assert_eq!(settings.sweep_interval(), Duration::from_secs(30));
        assert_eq!(settings.write_timeout(), Duration::from_secs(2));
        assert_eq!(settings.read_timeout(), Duration::from_secs(5));
        assert_eq!(settings.outbound_queue, 32);
        assert_eq!(settings.ingest_capacity(), available_cores() * 16);
    }

    #[test]
    fn test_overrides_win() {
        let settings = UdpRelaySettings::default()
            .with_idle_timeout(Duration::from_millis(300))
            .with_sweep_interval(Duration::from_millis(100));
        assert_eq!(settings.idle_timeout(), Duration::from_millis(300));
        assert_eq!(settings.sweep_interval(), Duration::from_millis(100));
        assert_eq!(settings.read_timeout(), Duration::from_secs(5));
    }

    #[test]
    fn test_check_rejects_zero_values() {
        assert!(UdpRelaySettings::default().check().is_ok());

        let cases = [
            (
                UdpRelaySettings::default().with_outbound_queue(0),
                "udp.outbound_queue",
            ),
            (
                UdpRelaySettings::default().with_event_queue(0),
                "udp.event_queue",
            ),
            (
                UdpRelaySettings::default().with_sweep_interval(Duration::ZERO),
                "udp.sweep_interval_secs",
            ),
            (
                UdpRelaySettings::default().with_read_timeout(Duration::ZERO),
                "udp.read_timeout_secs",
            ),
        ];
        for (settings, expected) in cases {
            match settings.check() {
                Err(UdpRelayError::InvalidSetting { field }) => assert_eq!(field, expected),
                other => panic!("expected {expected} to be rejected, got {other:?}"),
            }
        }
    }

    #[test]
    fn test_parse_partial() {
        let settings: UdpRelaySettings =
            toml::from_str("idle_timeout_secs = 120\noutbound_queue = 64").unwrap();
        assert_eq!(settings.idle_timeout(), Duration::from_secs(120));
        assert_eq!(settings.outbound_queue, 64);
        assert_eq!(settings.event_queue, 128);
    }
}
