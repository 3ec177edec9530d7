//! Configuration file loading and parsing.
//!
//! # Configuration File Locations
//!
//! 1. Path given as the `CONFIG_FILE` CLI argument (must exist)
//! 2. Default location (optional; defaults are used when it is absent):
//!    - **Linux/macOS:** `~/.freecad-mcp/config.json`
//!    - **Windows:** `%USERPROFILE%\.freecad-mcp\config.json`
//!
//! `FREECAD_HOST` and `FREECAD_PORT` override the file after loading.
//!
//! See `config/example-config.json` for a complete example.

mod settings;

pub use settings::{Config, ContractConfig, FeedbackConfig, FreeCadConfig, LoggingConfig};

use std::path::{Path, PathBuf};

use crate::error::ConfigError;

/// Returns the default configuration directory.
#[must_use]
pub fn default_config_dir() -> Option<PathBuf> {
    dirs::home_dir().map(|p| p.join(".freecad-mcp"))
}

/// Returns the platform-specific default configuration file path.
#[must_use]
pub fn default_config_path() -> Option<PathBuf> {
    default_config_dir().map(|p| p.join("config.json"))
}

/// Loads the configuration and applies environment overrides.
///
/// With `path` set the file must exist. Without it, the default location is
/// read if present and defaults are used otherwise.
///
/// # Errors
///
/// Returns an error if an explicit file is missing, a file cannot be read or
/// parsed, a value fails validation, or `FREECAD_PORT` is not a port.
pub fn load_config(path: Option<&Path>) -> Result<Config, ConfigError> {
    let mut config = match path {
        Some(p) => read_config(p)?,
        None => match default_config_path().filter(|p| p.exists()) {
            Some(p) => read_config(&p)?,
            None => {
                tracing::debug!("No configuration file, using defaults");
                Config::default()
            }
        },
    };

    config.apply_env()?;
    config.validate()?;
    Ok(config)
}

fn read_config(path: &Path) -> Result<Config, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::NotFound {
            path: path.to_path_buf(),
        });
    }

    let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
        path: path.to_path_buf(),
        source: e,
    })?;

    serde_json::from_str(&contents).map_err(|e| ConfigError::ParseError {
        path: path.to_path_buf(),
        source: e,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn default_config_path_is_under_home() {
        let path = default_config_path().unwrap();
        assert!(path.ends_with(".freecad-mcp/config.json"));
    }

    #[test]
    fn explicit_missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = read_config(&dir.path().join("absent.json")).unwrap_err();
        assert!(matches!(err, ConfigError::NotFound { .. }));
    }

    #[test]
    fn reads_file_from_disk() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"freecad": {{"port": 9900}}, "feedback": {{"only_text": true}}}}"#)
            .unwrap();
        let config = read_config(file.path()).unwrap();
        assert_eq!(config.freecad.port, 9900);
        assert!(config.feedback.only_text);
    }

    #[test]
    fn malformed_file_is_a_parse_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{{ not json").unwrap();
        assert!(matches!(
            read_config(file.path()),
            Err(ConfigError::ParseError { .. })
        ));
    }
}
