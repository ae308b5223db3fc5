// Logging module for structured logging using the tracing crate

use tracing_subscriber::EnvFilter;

use crate::config::LogFormat;

/// Errors raised while installing the global subscriber
#[derive(Debug, thiserror::Error)]
pub enum LoggingError {
    #[error("Invalid log filter: {0}")]
    InvalidFilter(String),

    #[error("Failed to install subscriber: {0}")]
    InitError(String),
}

/// Build the level filter from `RUST_LOG`, falling back to `default_directive`.
pub fn build_filter(default_directive: &str) -> Result<EnvFilter, LoggingError> {
    match EnvFilter::try_from_default_env() {
        Ok(filter) => Ok(filter),
        Err(_) => EnvFilter::try_new(default_directive)
            .map_err(|e| LoggingError::InvalidFilter(e.to_string())),
    }
}

/// Initialize the tracing subscriber for structured logging
///
/// The subscriber is configured with:
/// - JSON (default) or pretty formatting, chosen by `logging.format`
/// - Level filtering from `RUST_LOG`, defaulting to `info`
/// - Output to stdout for container/cloud-native deployments
///
/// # Errors
///
/// Returns an error if a global subscriber has already been installed.
///
/// # Examples
///
/// ```
/// use pixelrelay::config::LogFormat;
/// use pixelrelay::logging::init_subscriber;
///
/// init_subscriber(LogFormat::Json).expect("Failed to initialize logging");
/// tracing::info!("Application started");
/// ```
pub fn init_subscriber(format: LogFormat) -> Result<(), LoggingError> {
    let filter = build_filter("info")?;
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true);

    let result = match format {
        LogFormat::Json => builder.json().with_current_span(true).try_init(),
        LogFormat::Pretty => builder.pretty().try_init(),
    };

    result.map_err(|e| LoggingError::InitError(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_filter_accepts_default_directive() {
        assert!(build_filter("info").is_ok());
        assert!(build_filter("pixelrelay=debug,warn").is_ok());
    }

    #[test]
    fn test_second_init_reports_error() {
        // Whichever call wins the race installs the subscriber; a later call must fail cleanly.
        let _ = init_subscriber(LogFormat::Json);
        assert!(init_subscriber(LogFormat::Pretty).is_err());
    }
}
