//! Logging setup for the CLI
//!
//! Logs go to stderr so stdout carries only the JSON command output.

use std::str::FromStr;

use anyhow::{anyhow, Result};
use tracing::Level;
use tracing_subscriber::{fmt, EnvFilter};

/// Configuration for the logging system
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// The log level to use when `RUST_LOG` does not say otherwise
    pub level: Level,
    /// Whether to enable JSON formatting
    pub json: bool,
}

impl LoggingConfig {
    pub fn new(level: &str, json: bool) -> Result<Self> {
        let level = Level::from_str(level).map_err(|_| anyhow!("Invalid log level: {level}"))?;
        Ok(Self { level, json })
    }
}

/// Set up the global subscriber
pub fn setup_logging(config: &LoggingConfig) {
    let filter = EnvFilter::from_default_env().add_directive(config.level.into());

    let subscriber = fmt::Subscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    if config.json {
        subscriber.json().init();
    } else {
        subscriber.init();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_level() {
        assert_eq!(LoggingConfig::new("debug", false).unwrap().level, Level::DEBUG);
        assert_eq!(LoggingConfig::new("WARN", true).unwrap().level, Level::WARN);
        assert!(LoggingConfig::new("chatty", false).is_err());
    }
}
