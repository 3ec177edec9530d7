//! Configuration structures for deserialisation.
//!
//! These map one-to-one onto the JSON configuration file.

use serde::Deserialize;

use crate::contract::Clearances;
use crate::error::ConfigError;
use crate::rpc::DEFAULT_PORT;

/// Root configuration structure.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Optional JSON schema reference (ignored).
    #[serde(rename = "$schema", default)]
    _schema: Option<String>,

    /// Optional comment field (ignored).
    #[serde(rename = "_comment", default)]
    _comment: Option<String>,

    /// Where the FreeCAD RPC listener lives.
    #[serde(default)]
    pub freecad: FreeCadConfig,

    /// Screenshot policy.
    #[serde(default)]
    pub feedback: FeedbackConfig,

    /// Envelope clearances.
    #[serde(default)]
    pub contract: ContractConfig,

    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if any value is out of range.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.freecad.port == 0 {
            return Err(ConfigError::ValidationError {
                message: "freecad.port must be non-zero".to_string(),
            });
        }
        if self.freecad.timeout_secs == 0 {
            return Err(ConfigError::ValidationError {
                message: "freecad.timeout_secs must be at least 1".to_string(),
            });
        }
        if matches!(self.freecad.host.as_deref(), Some(h) if h.trim().is_empty()) {
            return Err(ConfigError::ValidationError {
                message: "freecad.host must not be empty".to_string(),
            });
        }
        for (name, value) in [
            ("maintenance_clearance", self.contract.maintenance_clearance),
            ("operation_clearance", self.contract.operation_clearance),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(ConfigError::ValidationError {
                    message: format!("contract.{name} must be a non-negative number, got {value}"),
                });
            }
        }
        Ok(())
    }

    /// Applies `FREECAD_HOST` and `FREECAD_PORT` overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if `FREECAD_PORT` is not a valid port.
    pub fn apply_env(&mut self) -> Result<(), ConfigError> {
        self.apply_overrides(
            std::env::var("FREECAD_HOST").ok(),
            std::env::var("FREECAD_PORT").ok(),
        )
    }

    fn apply_overrides(
        &mut self,
        host: Option<String>,
        port: Option<String>,
    ) -> Result<(), ConfigError> {
        if let Some(host) = host.filter(|h| !h.trim().is_empty()) {
            self.freecad.host = Some(host);
        }
        if let Some(port) = port {
            self.freecad.port = port.trim().parse().map_err(|_| ConfigError::ValidationError {
                message: format!("FREECAD_PORT is not a valid port: '{port}'"),
            })?;
        }
        Ok(())
    }
}

/// FreeCAD connection settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FreeCadConfig {
    /// Host running FreeCAD. Detected at startup when unset.
    #[serde(default)]
    pub host: Option<String>,

    /// RPC listener port.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Per-call timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for FreeCadConfig {
    fn default() -> Self {
        Self {
            host: None,
            port: default_port(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

const fn default_port() -> u16 {
    DEFAULT_PORT
}

const fn default_timeout_secs() -> u64 {
    30
}

/// Screenshot policy.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FeedbackConfig {
    /// Never attach screenshots.
    #[serde(default)]
    pub only_text: bool,
}

/// Clearances added around equipment envelopes, in metres.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ContractConfig {
    /// Maintenance access clearance.
    #[serde(default = "default_maintenance_clearance")]
    pub maintenance_clearance: f64,

    /// Operational clearance.
    #[serde(default = "default_operation_clearance")]
    pub operation_clearance: f64,
}

impl Default for ContractConfig {
    fn default() -> Self {
        Self {
            maintenance_clearance: default_maintenance_clearance(),
            operation_clearance: default_operation_clearance(),
        }
    }
}

impl ContractConfig {
    /// Returns the clearances handed to envelope generation.
    #[must_use]
    pub const fn clearances(&self) -> Clearances {
        Clearances {
            maintenance: self.maintenance_clearance,
            operation: self.operation_clearance,
        }
    }
}

const fn default_maintenance_clearance() -> f64 {
    2.0
}

const fn default_operation_clearance() -> f64 {
    1.5
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "warn".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_config_uses_defaults() {
        let config: Config = serde_json::from_str("{}").unwrap();
        assert!(config.validate().is_ok());
        assert_eq!(config.freecad.host, None);
        assert_eq!(config.freecad.port, 9875);
        assert_eq!(config.freecad.timeout_secs, 30);
        assert!(!config.feedback.only_text);
        assert_eq!(config.logging.level, "warn");
        let clearances = config.contract.clearances();
        assert!((clearances.maintenance - 2.0).abs() < f64::EPSILON);
        assert!((clearances.operation - 1.5).abs() < f64::EPSILON);
    }

    #[test]
    fn parse_full_config() {
        let json = r#"{
            "$schema": "https://json-schema.org/draft/2020-12/schema",
            "_comment": "Plant workstation",
            "freecad": { "host": "172.20.0.1", "port": 9876, "timeout_secs": 60 },
            "feedback": { "only_text": true },
            "contract": { "maintenance_clearance": 3.0, "operation_clearance": 1.0 },
            "logging": { "level": "debug" }
        }"#;

        let config: Config = serde_json::from_str(json).unwrap();
        assert!(config.validate().is_ok());
        assert_eq!(config.freecad.host.as_deref(), Some("172.20.0.1"));
        assert_eq!(config.freecad.port, 9876);
        assert_eq!(config.freecad.timeout_secs, 60);
        assert!(config.feedback.only_text);
        assert!((config.contract.maintenance_clearance - 3.0).abs() < f64::EPSILON);
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn reject_unknown_fields() {
        assert!(serde_json::from_str::<Config>(r#"{"allowed_paths": []}"#).is_err());
        assert!(serde_json::from_str::<Config>(r#"{"freecad": {"hostname": "x"}}"#).is_err());
    }

    #[test]
    fn reject_out_of_range_values() {
        let zero_port: Config = serde_json::from_str(r#"{"freecad": {"port": 0}}"#).unwrap();
        assert!(zero_port.validate().is_err());

        let negative: Config =
            serde_json::from_str(r#"{"contract": {"operation_clearance": -1.0}}"#).unwrap();
        assert!(negative.validate().is_err());
    }

    #[test]
    fn env_overrides_replace_file_values() {
        let mut config = Config::default();
        config
            .apply_overrides(Some("10.0.0.5".to_string()), Some(" 9900 ".to_string()))
            .unwrap();
        assert_eq!(config.freecad.host.as_deref(), Some("10.0.0.5"));
        assert_eq!(config.freecad.port, 9900);

        config.apply_overrides(Some("  ".to_string()), None).unwrap();
        assert_eq!(config.freecad.host.as_deref(), Some("10.0.0.5"));

        assert!(config.apply_overrides(None, Some("ninety".to_string())).is_err());
    }
}
