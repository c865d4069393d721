//! Process-wide `tracing` subscriber setup.

use std::fs::OpenOptions;
use std::sync::Mutex;

use tracing_subscriber::fmt;
use tracing_subscriber::EnvFilter;

use crate::config::{LogFormat, LogOutput, LoggingConfig};

use super::error::{LoggingError, LoggingResult};

/// Build the filter directive for the configured level.
///
/// `RUST_LOG` wins over the configuration when it is set.
fn build_filter(config: &LoggingConfig) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(config.level.to_string()))
}

/// Install the global subscriber described by `config`.
///
/// # Errors
///
/// Returns an error if the log file cannot be opened or a global subscriber
/// is already installed.
pub fn init(config: &LoggingConfig) -> LoggingResult<()> {
    let filter = build_filter(config);
    let builder = fmt().with_env_filter(filter).with_target(false);

    match config.output {
        LogOutput::Stdout => install(builder.with_writer(std::io::stdout), config.format),
        LogOutput::Stderr => install(builder.with_writer(std::io::stderr), config.format),
        LogOutput::File => {
            let path = config
                .file_path
                .as_ref()
                .ok_or(LoggingError::MissingFilePath)?;
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .map_err(|source| LoggingError::OpenFile {
                    path: path.clone(),
                    source,
                })?;
            install(
                builder.with_writer(Mutex::new(file)).with_ansi(false),
                config.format,
            )
        },
    }
}

fn install<W>(
    builder: fmt::SubscriberBuilder<fmt::format::DefaultFields, fmt::format::Format, EnvFilter, W>,
    format: LogFormat,
) -> LoggingResult<()>
where
    W: for<'w> fmt::MakeWriter<'w> + Send + Sync + 'static,
{
    let result = match format {
        LogFormat::Json => builder.json().try_init(),
        LogFormat::Compact => builder.compact().try_init(),
        LogFormat::Pretty => builder.pretty().try_init(),
    };
    result.map_err(|e| LoggingError::Install(e.to_string()))
}
