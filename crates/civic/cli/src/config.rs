//! Configuration for civicctl

use civic_types::GovernancePolicy;
use serde::{Deserialize, Serialize};

/// Effective CLI configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CliConfig {
    /// Governance limits applied during replay
    #[serde(default)]
    pub governance: GovernancePolicy,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level, used when `RUST_LOG` is unset
    #[serde(default = "default_log_level")]
    pub level: String,

    /// JSON format
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

fn default_log_level() -> String {
    "warn".to_string()
}

impl CliConfig {
    /// Defaults, then the optional file, then `CIVIC_*` variables
    /// (`CIVIC_LOGGING__LEVEL=debug`, `CIVIC_GOVERNANCE__DIALOGUE__MAX_RETENTION_HOURS=72`).
    pub fn load(path: Option<&str>) -> Result<Self, config::ConfigError> {
        let mut builder = config::Config::builder();

        builder = builder.add_source(config::Config::try_from(&CliConfig::default())?);

        if let Some(path) = path {
            builder = builder.add_source(config::File::with_name(path).required(true));
        }

        builder = builder.add_source(
            config::Environment::with_prefix("CIVIC")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        builder.build()?.try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = CliConfig::default();
        assert_eq!(config.logging.level, "warn");
        assert!(!config.logging.json);
        assert_eq!(config.governance, GovernancePolicy::default());
    }

    #[test]
    fn test_file_overrides_defaults() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            "[governance.dialogue]\nmax_retention_hours = 72\n\n[logging]\njson = true"
        )
        .unwrap();

        let config = CliConfig::load(file.path().to_str()).unwrap();
        assert_eq!(config.governance.dialogue.max_retention_hours, 72);
        assert_eq!(config.governance.dialogue.min_retention_hours, 1);
        assert!(config.logging.json);
        assert_eq!(config.governance.confidence.verified_threshold, 0.8);
    }

    #[test]
    fn test_missing_file_is_an_error() {
        assert!(CliConfig::load(Some("/nonexistent/civicctl.toml")).is_err());
    }
}
