//! # Configuration System
//!
//! TOML-based configuration for the relay: forwarding routes plus logging
//! and per-protocol tuning. Routes can also be given on the command line in
//! the compact `LOCALPORT:REMOTEHOST:REMOTEPORT` form.
//!
//! ## Example Configuration
//!
//! ```toml
//! [logging]
//! level = "info"
//! format = "compact"
//!
//! [udp]
//! idle_timeout_secs = 60
//!
//! [[routes]]
//! protocol = "tcp"
//! local_port = 8080
//! remote_host = "203.0.113.10"
//! remote_port = 80
//! ```

mod error;
mod loader;
mod route;
mod types;
mod validation;

pub use error::{ConfigError, ConfigResult};
pub use loader::ConfigLoader;
pub use route::{Protocol, Route};
pub use types::{LogFormat, LogLevel, LogOutput, LoggingConfig, RelayConfig};
pub use validation::{
    BasicValidator, PortConflictValidator, ValidationError, ValidationResult, ValidationSeverity,
    Validator,
};
