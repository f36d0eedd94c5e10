//! Configuration file handling for glitchdeck.
//!
//! Loads defaults from `~/.config/glitchdeck/config.toml` or a custom path.
//! CLI flags always win over config values.

use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Configuration file structure for glitchdeck.
/// Loaded from ~/.config/glitchdeck/config.toml (or custom path via --config).
#[derive(Debug, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub present: PresentConfig,
    #[serde(default)]
    pub export: ExportConfig,
}

#[derive(Debug, Deserialize, Default)]
pub struct PresentConfig {
    pub width: Option<u16>,
    pub height: Option<u16>,
}

#[derive(Debug, Deserialize, Default)]
pub struct ExportConfig {
    pub width: Option<u16>,
    pub height: Option<u16>,
    pub fps: Option<u32>,
    pub slide_time: Option<f64>,
    pub quality: Option<u8>,
}

fn default_path() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    PathBuf::from(home)
        .join(".config")
        .join("glitchdeck")
        .join("config.toml")
}

impl Config {
    /// Load configuration from a file path.
    /// Returns default config if the file doesn't exist.
    /// Returns an error if the file exists but cannot be parsed.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let path = path.map(PathBuf::from).unwrap_or_else(default_path);

        if path.exists() {
            let content = std::fs::read_to_string(&path).map_err(|e| ConfigError::IoError {
                path: path.clone(),
                source: e,
            })?;
            let config: Config = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
                path: path.clone(),
                source: e,
            })?;
            Ok(config)
        } else {
            Ok(Config::default())
        }
    }
}

/// Errors that can occur when loading configuration.
#[derive(Debug)]
pub enum ConfigError {
    IoError {
        path: PathBuf,
        source: std::io::Error,
    },
    ParseError {
        path: PathBuf,
        source: toml::de::Error,
    },
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::IoError { path, source } => {
                write!(
                    f,
                    "Failed to read config file '{}': {}",
                    path.display(),
                    source
                )
            }
            ConfigError::ParseError { path, source } => {
                write!(
                    f,
                    "Failed to parse config file '{}': {}",
                    path.display(),
                    source
                )
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::IoError { source, .. } => Some(source),
            ConfigError::ParseError { source, .. } => Some(source),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_missing_file_yields_defaults() {
        let config = Config::load(Some(Path::new("/nonexistent/config.toml"))).unwrap();
        assert!(config.export.fps.is_none());
        assert!(config.present.width.is_none());
    }

    #[test]
    fn test_load_partial_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "[export]\nfps = 24\nquality = 90").unwrap();
        let config = Config::load(Some(&path)).unwrap();
        assert_eq!(config.export.fps, Some(24));
        assert_eq!(config.export.quality, Some(90));
        assert!(config.export.width.is_none());
    }

    #[test]
    fn test_unparsable_config_names_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "not [valid toml").unwrap();
        let err = Config::load(Some(&path)).unwrap_err();
        assert!(format!("{}", err).contains("config.toml"));
    }
}
