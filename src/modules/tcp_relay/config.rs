//! TCP relay settings.

use serde::{Deserialize, Serialize};

use super::error::{TcpRelayError, TcpRelayResult};

/// Tuning for TCP relays.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TcpRelaySettings {
    /// Dial workers per route (0 = number of logical cores).
    pub workers: usize,

    /// Copy buffer size per direction.
    pub buffer_size: usize,

    /// TCP nodelay (disable Nagle's algorithm) on both sockets.
    pub nodelay: bool,
}

impl Default for TcpRelaySettings {
    fn default() -> Self {
        Self {
            workers: 0,
            buffer_size: 32 * 1024,
            nodelay: true,
        }
    }
}

impl TcpRelaySettings {
    /// Effective worker count.
    #[must_use]
    pub fn worker_count(&self) -> usize {
        if self.workers == 0 {
            available_cores()
        } else {
            self.workers
        }
    }

    /// Set the worker count.
    #[must_use]
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    /// Set the copy buffer size.
    #[must_use]
    pub fn with_buffer_size(mut self, size: usize) -> Self {
        self.buffer_size = size;
        self
    }

    /// Reject settings a relay cannot run with.
    ///
    /// # Errors
    ///
    /// Returns `TcpRelayError::InvalidSetting` if the copy buffer is empty.
    pub fn check(&self) -> TcpRelayResult<()> {
        // An empty buffer reads zero bytes, which looks like EOF.
        if self.buffer_size == 0 {
            return Err(TcpRelayError::InvalidSetting {
                field: "tcp.buffer_size",
            });
        }
        Ok(())
    }
}

/// Number of logical cores, at least one.
#[must_use]
pub fn available_cores() -> usize {
    std::thread::available_parallelism()
        .map(std::num::NonZeroUsize::get)
        .unwrap_or(1)
}
