//! Observability configuration parsing from environment variables.
//!
//! This module handles selecting the log output format. Log levels come from
//! `RUST_LOG` through `tracing_subscriber::EnvFilter`.

use std::str::FromStr;

/// Output format for the `tracing` fmt layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Pretty,
    Compact,
}

impl FromStr for LogFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "pretty" => Ok(LogFormat::Pretty),
            "compact" => Ok(LogFormat::Compact),
            _ => anyhow::bail!("Invalid LOG_FORMAT: {}. Must be 'pretty' or 'compact'", s),
        }
    }
}

/// Observability environment configuration
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ObservabilityEnvConfig {
    pub log_format: LogFormat,
}

impl ObservabilityEnvConfig {
    pub fn from_lookup<F>(lookup: &F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let log_format = match lookup("LOG_FORMAT") {
            Some(raw) => raw.parse::<LogFormat>()?,
            None => LogFormat::default(),
        };
        Ok(Self { log_format })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_observability_config_defaults() {
        let config = ObservabilityEnvConfig::from_lookup(&|_: &str| None).unwrap();
        assert_eq!(config.log_format, LogFormat::Pretty);
    }

    #[test]
    fn test_log_format_parsing() {
        assert_eq!("Compact".parse::<LogFormat>().unwrap(), LogFormat::Compact);
        assert!("json".parse::<LogFormat>().is_err());
    }
}
