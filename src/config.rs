use std::path::Path;

use error_stack::{Report, ResultExt};
use serde::Deserialize;

use crate::error::ConfigError;

fn default_log_level() -> String {
    "info".into()
}

fn default_log_format() -> String {
    "text".into()
}

fn default_data_dir() -> String {
    "./data".into()
}

fn default_logs_dir() -> String {
    "./logs".into()
}

fn default_queue_capacity() -> usize {
    4096
}

/// Ambient settings: logging, output directory roots, queue sizing. The
/// tracked symbol set is never part of this file — it is compile-time fixed
/// (see `model::SYMBOLS`).
#[derive(Debug, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub general: GeneralConfig,
}

#[derive(Debug, Deserialize)]
pub struct GeneralConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default = "default_log_format")]
    pub log_format: String,
    #[serde(default = "default_data_dir")]
    pub data_dir: String,
    #[serde(default = "default_logs_dir")]
    pub logs_dir: String,
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_format: default_log_format(),
            data_dir: default_data_dir(),
            logs_dir: default_logs_dir(),
            queue_capacity: default_queue_capacity(),
        }
    }
}

pub fn load(path: &Path) -> Result<AppConfig, Report<ConfigError>> {
    let content = std::fs::read_to_string(path)
        .change_context(ConfigError::ReadFile)
        .attach_with(|| format!("path: {}", path.display()))?;

    let config: AppConfig = toml::from_str(&content).change_context(ConfigError::Parse {
        reason: "invalid TOML syntax or schema mismatch".into(),
    })?;

    validate(&config)?;
    Ok(config)
}

fn validate(config: &AppConfig) -> Result<(), Report<ConfigError>> {
    if config.general.queue_capacity == 0 {
        return Err(Report::new(ConfigError::Validation {
            field: "general.queue_capacity must be > 0".into(),
        }));
    }

    if !matches!(config.general.log_format.as_str(), "text" | "json") {
        return Err(Report::new(ConfigError::Validation {
            field: format!(
                "general.log_format \"{}\" must be \"text\" or \"json\"",
                config.general.log_format
            ),
        }));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(toml: &str) -> AppConfig {
        toml::from_str(toml).expect("parse failed")
    }

    #[test]
    fn defaults_applied_when_general_omitted() {
        let config = parse("");
        assert_eq!(config.general.log_level, "info");
        assert_eq!(config.general.log_format, "text");
        assert_eq!(config.general.data_dir, "./data");
        assert_eq!(config.general.logs_dir, "./logs");
        assert_eq!(config.general.queue_capacity, 4096);
    }

    #[test]
    fn defaults_applied_when_fields_omitted() {
        let toml = r#"
[general]
log_level = "debug"
"#;
        let config = parse(toml);
        assert_eq!(config.general.log_level, "debug");
        assert_eq!(config.general.queue_capacity, 4096);
    }

    #[test]
    fn zero_queue_capacity_rejected() {
        let toml = r#"
[general]
queue_capacity = 0
"#;
        let config = parse(toml);
        assert!(validate(&config).is_err());
    }

    #[test]
    fn unknown_log_format_rejected() {
        let toml = r#"
[general]
log_format = "xml"
"#;
        let config = parse(toml);
        assert!(validate(&config).is_err());
    }
}
