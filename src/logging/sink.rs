//! Log sinks consumed by the relays.

use std::sync::{Arc, Mutex};

use tracing::{debug, error, info, warn, Level};

use super::event::RelayEvent;

/// Destination for relay events.
///
/// Implementations must not block: sinks are called from the hot path of
/// every relay task.
pub trait LogSink: Send + Sync {
    /// Record one event.
    fn record(&self, event: &RelayEvent);
}

/// Shared handle to a sink.
pub type SharedSink = Arc<dyn LogSink>;

/// Sink that forwards events to the `tracing` subscriber.
#[derive(Debug, Clone, Default)]
pub struct TracingSink {
    route: Option<String>,
}

impl TracingSink {
    /// Create a sink without a route label.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a sink that tags every event with a route label.
    #[must_use]
    pub fn for_route(route: impl Into<String>) -> Self {
        Self {
            route: Some(route.into()),
        }
    }

    /// Wrap into a shared handle.
    #[must_use]
    pub fn shared(self) -> SharedSink {
        Arc::new(self)
    }
}

impl LogSink for TracingSink {
    fn record(&self, event: &RelayEvent) {
        let route = self.route.as_deref().unwrap_or("-");
        let kind = event.kind();

        match event.level() {
            Level::ERROR => error!(route, kind, "{event}"),
            Level::WARN => warn!(route, kind, "{event}"),
            Level::INFO => info!(route, kind, "{event}"),
            _ => debug!(route, kind, "{event}"),
        }
    }
}

/// Sink that keeps every event in memory.
///
/// Used by tests and by embedders that want to inspect relay activity.
#[derive(Debug, Default)]
pub struct MemorySink {
    events: Mutex<Vec<RelayEvent>>,
}

impl MemorySink {
    /// Create an empty sink.
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Snapshot of all recorded events.
    #[must_use]
    pub fn events(&self) -> Vec<RelayEvent> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }

    /// Rendered log lines of all recorded events.
    #[must_use]
    pub fn lines(&self) -> Vec<String> {
        self.events().iter().map(ToString::to_string).collect()
    }

    /// Count events matching a predicate.
    pub fn count<F>(&self, predicate: F) -> usize
    where
        F: Fn(&RelayEvent) -> bool,
    {
        self.events
            .lock()
            .map(|events| events.iter().filter(|e| predicate(e)).count())
            .unwrap_or(0)
    }

    /// Check whether any recorded event matches a predicate.
    pub fn contains<F>(&self, predicate: F) -> bool
    where
        F: Fn(&RelayEvent) -> bool,
    {
        self.count(predicate) > 0
    }

    /// Forget all recorded events.
    pub fn clear(&self) {
        if let Ok(mut events) = self.events.lock() {
            events.clear();
        }
    }
}

impl LogSink for MemorySink {
    fn record(&self, event: &RelayEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event.clone());
        }
    }
}
