//! CLI configuration handling.

use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CliConfig {
    /// Extra credential files searched before the default locations.
    pub credential_files: Vec<PathBuf>,

    /// Environment variable holding the service catalog.
    pub catalog_variable: String,

    /// Logging level used when `RUST_LOG` is unset.
    pub log_level: String,

    /// How long `check` and `token` wait for a token.
    pub token_timeout_secs: u64,

    /// Interval between `can_authenticate` checks in `check`.
    pub poll_interval_ms: u64,

    /// Path to the configuration file that was loaded.
    #[serde(skip)]
    pub config_path: PathBuf,
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            credential_files: Vec::new(),
            catalog_variable: "VCAP_SERVICES".to_string(),
            log_level: "warn".to_string(),
            token_timeout_secs: 30,
            poll_interval_ms: 250,
            config_path: PathBuf::new(),
        }
    }
}

impl CliConfig {
    pub fn token_timeout(&self) -> Duration {
        Duration::from_secs(self.token_timeout_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }
}

/// Load configuration from `path`, or from the default location.
///
/// A missing file yields the defaults.
pub fn load_config(path: Option<&Path>) -> Result<CliConfig> {
    let config_path = match path {
        Some(path) => path.to_path_buf(),
        None => default_config_path(),
    };

    let mut config = if config_path.exists() {
        let contents = std::fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read config from {:?}", config_path))?;
        toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config from {:?}", config_path))?
    } else {
        CliConfig::default()
    };

    config.config_path = config_path;
    Ok(config)
}

fn default_config_path() -> PathBuf {
    ProjectDirs::from("com", "raibid-labs", "cloudcred")
        .map(|d| d.config_dir().join("cli.toml"))
        .unwrap_or_else(|| PathBuf::from("cloudcred.toml"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_uses_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("cli.toml");

        let config = load_config(Some(&path)).unwrap();
        assert_eq!(config.catalog_variable, "VCAP_SERVICES");
        assert_eq!(config.token_timeout(), Duration::from_secs(30));
        assert_eq!(config.config_path, path);
    }

    #[test]
    fn test_partial_file_keeps_other_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("cli.toml");
        std::fs::write(
            &path,
            "credential_files = [\"/etc/cloudcred/ibm-credentials.env\"]\npoll_interval_ms = 50\n",
        )
        .unwrap();

        let config = load_config(Some(&path)).unwrap();
        assert_eq!(
            config.credential_files,
            vec![PathBuf::from("/etc/cloudcred/ibm-credentials.env")]
        );
        assert_eq!(config.poll_interval(), Duration::from_millis(50));
        assert_eq!(config.log_level, "warn");
    }

    #[test]
    fn test_invalid_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("cli.toml");
        std::fs::write(&path, "token_timeout_secs = \"soon\"\n").unwrap();

        let err = load_config(Some(&path)).unwrap_err();
        assert!(err.to_string().contains("Failed to parse config"));
    }
}
