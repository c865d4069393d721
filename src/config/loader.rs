//! Configuration file loader.

use super::error::{ConfigError, ConfigResult};
use super::types::RelayConfig;
use super::validation::{BasicValidator, PortConflictValidator, Validator};
use std::path::Path;

/// Configuration loader with validation support.
#[derive(Debug, Default)]
pub struct ConfigLoader {
    /// Validators to run on loaded configuration.
    validators: Vec<Box<dyn Validator>>,
}

impl ConfigLoader {
    /// Create a new configuration loader.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Loader with the built-in basic and port conflict validators.
    #[must_use]
    pub fn standard() -> Self {
        Self::new()
            .with_validator(BasicValidator::new())
            .with_validator(PortConflictValidator::new())
    }

    /// Add a validator to the loader.
    #[must_use]
    pub fn with_validator<V: Validator + 'static>(mut self, validator: V) -> Self {
        self.validators.push(Box::new(validator));
        self
    }

    /// Load configuration from a file path.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The file does not exist
    /// - The file cannot be read
    /// - The TOML is malformed
    /// - Validation fails
    pub fn load<P: AsRef<Path>>(&self, path: P) -> ConfigResult<RelayConfig> {
        let config = self.parse_file(path)?;
        self.validate(&config)?;
        Ok(config)
    }

    /// Read and parse a file without validating it.
    ///
    /// Used when command-line routes are merged in before validation.
    ///
    /// # Errors
    ///
    /// Returns an error if the file is missing, unreadable or malformed.
    pub fn parse_file<P: AsRef<Path>>(&self, path: P) -> ConfigResult<RelayConfig> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(ConfigError::NotFound(path.to_path_buf()));
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            source: e,
        })?;

        Ok(toml::from_str(&content)?)
    }

    /// Load configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The TOML is malformed
    /// - Validation fails
    pub fn load_str(&self, content: &str) -> ConfigResult<RelayConfig> {
        let config: RelayConfig = toml::from_str(content)?;
        self.validate(&config)?;
        Ok(config)
    }

    /// Validate a configuration against all registered validators.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::ValidationError` listing every error found by
    /// the first failing validator.
    pub fn validate(&self, config: &RelayConfig) -> ConfigResult<()> {
        for validator in &self.validators {
            let result = validator.validate(config);
            for warning in result.warnings() {
                tracing::warn!(field = %warning.field, "{}", warning.message);
            }
            if !result.is_valid() {
                let errors: Vec<String> = result
                    .errors()
                    .iter()
                    .filter(|e| e.severity == super::ValidationSeverity::Error)
                    .map(|e| format!("{}: {}", e.field, e.message))
                    .collect();
                return Err(ConfigError::ValidationError(errors.join("; ")));
            }
        }
        Ok(())
    }
}
