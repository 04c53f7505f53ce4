//! Logging configuration and setup.

use tracing_subscriber::EnvFilter;

use crate::error::{TelemetryError, TelemetryResult};

/// Output format for log lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Human-readable multi-line output for interactive use.
    Pretty,
    /// Single-line output for service logs.
    #[default]
    Compact,
    /// Structured JSON for log shippers.
    Json,
}

impl std::str::FromStr for LogFormat {
    type Err = TelemetryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "pretty" => Ok(Self::Pretty),
            "compact" => Ok(Self::Compact),
            "json" => Ok(Self::Json),
            other => Err(TelemetryError::InvalidFilter(format!(
                "unknown log format {other:?}"
            ))),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Base level (`trace`, `debug`, `info`, `warn`, `error`).
    pub level: String,
    /// Output format.
    pub format: LogFormat,
    /// Extra env-filter directives (e.g. `kenobot_events=trace`).
    pub directives: Vec<String>,
}

impl LogConfig {
    /// Create a config with the given base level.
    #[must_use]
    pub fn new(level: impl Into<String>) -> Self {
        Self {
            level: level.into(),
            format: LogFormat::default(),
            directives: Vec::new(),
        }
    }

    /// Set the output format.
    #[must_use]
    pub fn with_format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    /// Add a per-crate directive.
    #[must_use]
    pub fn with_directive(mut self, directive: impl Into<String>) -> Self {
        self.directives.push(directive.into());
        self
    }

    /// Build the env-filter string: `RUST_LOG` wins over the config.
    fn filter(&self) -> TelemetryResult<EnvFilter> {
        if let Ok(from_env) = std::env::var("RUST_LOG") {
            return from_env
                .parse()
                .map_err(|e| TelemetryError::InvalidFilter(format!("RUST_LOG: {e}")));
        }
        let mut spec = self.level.clone();
        for directive in &self.directives {
            spec.push(',');
            spec.push_str(directive);
        }
        spec.parse()
            .map_err(|e| TelemetryError::InvalidFilter(format!("{spec:?}: {e}")))
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self::new("info")
    }
}

/// Install the global tracing subscriber.
///
/// # Errors
///
/// Returns an error if the filter fails to parse or a subscriber is
/// already installed.
pub fn setup_logging(config: &LogConfig) -> TelemetryResult<()> {
    let filter = config.filter()?;
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true);

    let result = match config.format {
        LogFormat::Pretty => builder.pretty().try_init(),
        LogFormat::Compact => builder.compact().try_init(),
        LogFormat::Json => builder.json().try_init(),
    };
    result.map_err(|e| TelemetryError::AlreadyInitialized(e.to_string()))
}

/// Install a subscriber with defaults (`info`, compact).
pub fn setup_default_logging() -> TelemetryResult<()> {
    setup_logging(&LogConfig::default())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_parses_case_insensitively() {
        assert_eq!("PRETTY".parse::<LogFormat>().unwrap(), LogFormat::Pretty);
        assert_eq!("json".parse::<LogFormat>().unwrap(), LogFormat::Json);
        assert!("yaml".parse::<LogFormat>().is_err());
    }

    #[test]
    fn test_filter_combines_level_and_directives() {
        let config = LogConfig::new("warn")
            .with_directive("kenobot_events=trace")
            .with_directive("kenobot_gateway=debug");
        // Filter construction itself must succeed; exact matching behavior
        // belongs to tracing-subscriber.
        assert!(config.filter().is_ok());
    }

    #[test]
    fn test_bad_level_is_rejected() {
        let config = LogConfig::new("not a level!!");
        assert!(config.filter().is_err());
    }
}
