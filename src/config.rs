//! Configuration module for assertive
//!
//! Handles loading and merging configuration from multiple sources, lowest
//! precedence first:
//! - Default values
//! - Configuration file (`--config`, `ASSERTIVE_CONFIG`, or `./assertive.toml`)
//! - Environment variables
//! - Command-line arguments (applied by the CLI)

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Environment variable pointing at a configuration file.
pub const CONFIG_ENV: &str = "ASSERTIVE_CONFIG";
/// Configuration file picked up from the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "assertive.toml";

/// Main configuration structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Default settings
    pub defaults: Defaults,

    /// Colors and output settings
    pub colors: ColorsConfig,

    /// Assertion reporting settings
    pub assertive: AssertiveConfig,
}

/// Default configuration values
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Defaults {
    /// Maximum number of hosts running a task at once
    pub forks: usize,
}

impl Default for Defaults {
    fn default() -> Self {
        Self { forks: 5 }
    }
}

/// Output color settings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ColorsConfig {
    /// Disable colored output
    pub no_color: bool,
}

/// Assertion aggregator settings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AssertiveConfig {
    /// Where to write the YAML report; no report when unset
    pub record: Option<PathBuf>,

    /// Force verbose rendering of failed assertions even when `quiet` is set
    pub fail_verbose: bool,
}

impl Config {
    /// Load configuration from the config file and the environment.
    pub fn load(config_path: Option<&Path>) -> Result<Self> {
        let mut config = match Self::config_file(config_path) {
            Some(path) => Self::from_file(&path)?,
            None => Config::default(),
        };
        config.apply_env_overrides();
        Ok(config)
    }

    /// Pick the configuration file to read, if any.
    fn config_file(explicit_path: Option<&Path>) -> Option<PathBuf> {
        if let Some(path) = explicit_path {
            return Some(path.to_path_buf());
        }
        if let Some(path) = std::env::var_os(CONFIG_ENV).filter(|p| !p.is_empty()) {
            return Some(PathBuf::from(path));
        }
        let local = PathBuf::from(DEFAULT_CONFIG_FILE);
        local.exists().then_some(local)
    }

    /// Load a configuration file, choosing the format from its extension.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("");
        let config: Config = match extension {
            "yml" | "yaml" => serde_yaml::from_str(&content)
                .with_context(|| format!("Failed to parse config file: {}", path.display()))?,
            "json" => serde_json::from_str(&content)
                .with_context(|| format!("Failed to parse config file: {}", path.display()))?,
            _ => toml::from_str(&content)
                .with_context(|| format!("Failed to parse config file: {}", path.display()))?,
        };

        debug!(path = %path.display(), "Loaded configuration file");
        Ok(config)
    }

    /// Apply environment variable overrides
    pub fn apply_env_overrides(&mut self) {
        if let Ok(forks) = std::env::var("ASSERTIVE_FORKS") {
            match forks.parse() {
                Ok(n) => self.defaults.forks = n,
                Err(_) => debug!(value = %forks, "Ignoring unparsable ASSERTIVE_FORKS"),
            }
        }

        if let Some(record) = std::env::var_os("ASSERTIVE_RECORD").filter(|v| !v.is_empty()) {
            self.assertive.record = Some(PathBuf::from(record));
        }

        if let Ok(value) = std::env::var("ASSERTIVE_FAIL_VERBOSE") {
            self.assertive.fail_verbose = is_truthy(&value);
        }

        if std::env::var_os("NO_COLOR").is_some() {
            self.colors.no_color = true;
        }
    }
}

/// Environment-style boolean: `1`, `yes` and `true` (any case) are true.
pub fn is_truthy(value: &str) -> bool {
    matches!(value.trim().to_lowercase().as_str(), "1" | "yes" | "true")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    fn clear_env() {
        for key in [
            "ASSERTIVE_FORKS",
            "ASSERTIVE_RECORD",
            "ASSERTIVE_FAIL_VERBOSE",
            "ASSERTIVE_CONFIG",
            "NO_COLOR",
        ] {
            std::env::remove_var(key);
        }
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.defaults.forks, 5);
        assert!(config.assertive.record.is_none());
        assert!(!config.assertive.fail_verbose);
    }

    #[test]
    fn test_truthy_values() {
        assert!(is_truthy("1"));
        assert!(is_truthy("YES"));
        assert!(is_truthy(" true "));
        assert!(!is_truthy("0"));
        assert!(!is_truthy("on"));
    }

    #[test]
    fn test_file_formats() {
        let dir = tempfile::tempdir().unwrap();

        let toml_path = dir.path().join("a.toml");
        std::fs::write(&toml_path, "[defaults]\nforks = 3\n[assertive]\nrecord = \"out.yml\"\n").unwrap();
        let config = Config::from_file(&toml_path).unwrap();
        assert_eq!(config.defaults.forks, 3);
        assert_eq!(config.assertive.record, Some(PathBuf::from("out.yml")));

        let yaml_path = dir.path().join("a.yml");
        std::fs::write(&yaml_path, "assertive:\n  fail_verbose: true\n").unwrap();
        let config = Config::from_file(&yaml_path).unwrap();
        assert!(config.assertive.fail_verbose);
        assert_eq!(config.defaults.forks, 5);

        let json_path = dir.path().join("a.json");
        std::fs::write(&json_path, r#"{"colors": {"no_color": true}}"#).unwrap();
        assert!(Config::from_file(&json_path).unwrap().colors.no_color);
    }

    #[test]
    fn test_bad_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.toml");
        std::fs::write(&path, "[defaults\n").unwrap();
        let err = Config::from_file(&path).unwrap_err();
        assert!(err.to_string().contains("broken.toml"));
    }

    #[test]
    #[serial]
    fn test_env_overrides_file() {
        clear_env();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("c.toml");
        std::fs::write(&path, "[defaults]\nforks = 3\n[assertive]\nrecord = \"file.yml\"\n").unwrap();

        std::env::set_var("ASSERTIVE_FORKS", "20");
        std::env::set_var("ASSERTIVE_RECORD", "env.yml");
        std::env::set_var("ASSERTIVE_FAIL_VERBOSE", "yes");
        let config = Config::load(Some(&path)).unwrap();
        clear_env();

        assert_eq!(config.defaults.forks, 20);
        assert_eq!(config.assertive.record, Some(PathBuf::from("env.yml")));
        assert!(config.assertive.fail_verbose);
    }

    #[test]
    #[serial]
    fn test_config_env_variable_names_file() {
        clear_env();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("env.yaml");
        std::fs::write(&path, "defaults:\n  forks: 9\n").unwrap();

        std::env::set_var(CONFIG_ENV, &path);
        let config = Config::load(None).unwrap();
        clear_env();

        assert_eq!(config.defaults.forks, 9);
    }
}
