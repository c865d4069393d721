//! # Logging
//!
//! Relays report everything they do through a [`LogSink`]. The engine never
//! writes to a terminal or file on its own; the sink decides where events go.
//!
//! - [`RelayEvent`] - one observable event, rendered as a single line
//! - [`TracingSink`] - forwards events to `tracing`
//! - [`MemorySink`] - keeps events in memory
//! - [`subscriber::init`] - installs the process-wide `tracing` subscriber
//!
//! Log rotation is left to the operator (logrotate, journald, ...).

mod error;
mod event;
mod sink;
pub mod subscriber;

pub use error::{LoggingError, LoggingResult};
pub use event::{Direction, EvictionReason, FailureReason, RelayEvent, SessionOp};
pub use sink::{LogSink, MemorySink, SharedSink, TracingSink};
