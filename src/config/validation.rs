//! Configuration validation system.

use std::collections::HashMap;

use super::types::{LogOutput, RelayConfig};

/// A single validation error.
#[derive(Debug, Clone)]
pub struct ValidationError {
    /// The field path that failed validation.
    pub field: String,
    /// Error message.
    pub message: String,
    /// Severity level.
    pub severity: ValidationSeverity,
}

impl ValidationError {
    /// Create a new error.
    pub fn error(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
            severity: ValidationSeverity::Error,
        }
    }

    /// Create a new warning.
    pub fn warning(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
            severity: ValidationSeverity::Warning,
        }
    }
}

/// Severity of validation issues.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationSeverity {
    /// Error - configuration is invalid.
    Error,
    /// Warning - configuration may have issues.
    Warning,
}

/// Result of configuration validation.
#[derive(Debug, Default)]
pub struct ValidationResult {
    errors: Vec<ValidationError>,
}

impl ValidationResult {
    /// Create a new empty (valid) result.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an error to the result.
    pub fn add_error(&mut self, error: ValidationError) {
        self.errors.push(error);
    }

    /// Check if the validation passed (no errors).
    #[must_use]
    pub fn is_valid(&self) -> bool {
        !self
            .errors
            .iter()
            .any(|e| e.severity == ValidationSeverity::Error)
    }

    /// Get all validation issues.
    #[must_use]
    pub fn errors(&self) -> &[ValidationError] {
        &self.errors
    }

    /// Get only warnings.
    #[must_use]
    pub fn warnings(&self) -> Vec<&ValidationError> {
        self.errors
            .iter()
            .filter(|e| e.severity == ValidationSeverity::Warning)
            .collect()
    }

    /// Merge another validation result into this one.
    pub fn merge(&mut self, other: ValidationResult) {
        self.errors.extend(other.errors);
    }
}

/// Trait for configuration validators.
pub trait Validator: std::fmt::Debug + Send + Sync {
    /// Validate a configuration and return any errors.
    fn validate(&self, config: &RelayConfig) -> ValidationResult;
}

/// Built-in validator for basic configuration checks.
#[derive(Debug, Default)]
pub struct BasicValidator;

impl BasicValidator {
    /// Create a new basic validator.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Validator for BasicValidator {
    fn validate(&self, config: &RelayConfig) -> ValidationResult {
        let mut result = ValidationResult::new();

        if config.routes.is_empty() {
            result.add_error(ValidationError::error(
                "routes",
                "At least one TCP or UDP route is required",
            ));
        }

        for (i, route) in config.routes.iter().enumerate() {
            let field = format!("routes[{i}]");
            if route.remote_host.trim().is_empty() {
                result.add_error(ValidationError::error(
                    format!("{field}.remote_host"),
                    "Remote host cannot be empty",
                ));
            }
            if route.remote_port == 0 {
                result.add_error(ValidationError::error(
                    format!("{field}.remote_port"),
                    "Remote port cannot be 0",
                ));
            }
            if route.local_port == 0 {
                result.add_error(ValidationError::warning(
                    format!("{field}.local_port"),
                    "Local port 0 binds an ephemeral port",
                ));
            }
        }

        if config.logging.output == LogOutput::File && config.logging.file_path.is_none() {
            result.add_error(ValidationError::error(
                "logging.file_path",
                "File path is required when output is 'file'",
            ));
        }

        if config.tcp.buffer_size == 0 {
            result.add_error(ValidationError::error(
                "tcp.buffer_size",
                "Buffer size cannot be 0",
            ));
        }

        let udp = &config.udp;
        for (field, value) in [
            ("udp.idle_timeout_secs", udp.idle_timeout().is_zero()),
            ("udp.sweep_interval_secs", udp.sweep_interval().is_zero()),
            ("udp.write_timeout_secs", udp.write_timeout().is_zero()),
            ("udp.read_timeout_secs", udp.read_timeout().is_zero()),
        ] {
            if value {
                result.add_error(ValidationError::error(field, "Duration cannot be 0"));
            }
        }

        for (field, value) in [
            ("udp.outbound_queue", udp.outbound_queue),
            ("udp.ingest_per_core", udp.ingest_per_core),
            ("udp.event_queue", udp.event_queue),
            ("udp.max_datagram_size", udp.max_datagram_size),
        ] {
            if value == 0 {
                result.add_error(ValidationError::error(field, "Capacity cannot be 0"));
            }
        }

        result
    }
}

/// Validator that checks for two routes claiming the same listener.
#[derive(Debug, Default)]
pub struct PortConflictValidator;

impl PortConflictValidator {
    /// Create a new port conflict validator.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Validator for PortConflictValidator {
    fn validate(&self, config: &RelayConfig) -> ValidationResult {
        let mut result = ValidationResult::new();
        let mut used = HashMap::new();

        for (i, route) in config.routes.iter().enumerate() {
            // Port 0 is ephemeral and never conflicts.
            if route.local_port == 0 {
                continue;
            }
            let key = (route.protocol, route.bind_address, route.local_port);
            if let Some(existing) = used.insert(key, i) {
                result.add_error(ValidationError::error(
                    format!("routes[{i}].local_port"),
                    format!(
                        "{} port {} conflicts with routes[{existing}]",
                        route.protocol, route.local_port
                    ),
                ));
            }
        }

        result
    }
}
