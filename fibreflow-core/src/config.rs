use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

/// Default bind address for the HTTP server
pub const DEFAULT_BIND: &str = "127.0.0.1:3030";

/// Default pool size
pub const DEFAULT_MAX_CONNECTIONS: u32 = 5;

pub use crate::sow::DEFAULT_BATCH_SIZE;

/// Centralized configuration for fibreflow
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FibreConfig {
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub server: ServerSection,
    #[serde(default)]
    pub import: ImportConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: Option<String>,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSection {
    #[serde(default = "default_bind")]
    pub bind: String,
    #[serde(default)]
    pub cors_permissive: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportConfig {
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    /// Directory where OneMap text reports are written
    pub reports_dir: Option<PathBuf>,
}

fn default_max_connections() -> u32 {
    DEFAULT_MAX_CONNECTIONS
}

fn default_bind() -> String {
    DEFAULT_BIND.to_string()
}

fn default_batch_size() -> usize {
    DEFAULT_BATCH_SIZE
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: None,
            max_connections: DEFAULT_MAX_CONNECTIONS,
        }
    }
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            cors_permissive: false,
        }
    }
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            reports_dir: None,
        }
    }
}

impl FibreConfig {
    /// Load config from ~/.fibreflow/config.toml, then apply environment overrides.
    ///
    /// A missing file is not an error: defaults plus environment are used.
    pub fn load() -> Result<Self> {
        let mut config = Self::load_from(&Self::config_path())?;
        config.apply_env_overrides()?;
        Ok(config)
    }

    /// Load config from an explicit path without environment overrides.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "no config file, using defaults");
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)
            .context(format!("Failed to read config file: {:?}", path))?;

        toml::from_str(&content).context("Failed to parse config file (invalid TOML)")
    }

    /// Get config file path: ~/.fibreflow/config.toml
    pub fn config_path() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".fibreflow/config.toml")
    }

    /// Environment variables win over the file.
    fn apply_env_overrides(&mut self) -> Result<()> {
        if let Ok(url) = env::var("DATABASE_URL") {
            if !url.trim().is_empty() {
                self.database.url = Some(url);
            }
        }
        if let Ok(bind) = env::var("FIBREFLOW_BIND") {
            self.server.bind = bind;
        }
        if let Ok(max) = env::var("FIBREFLOW_MAX_CONNECTIONS") {
            self.database.max_connections = max
                .parse()
                .context("FIBREFLOW_MAX_CONNECTIONS must be a positive integer")?;
        }
        if let Ok(flag) = env::var("FIBREFLOW_CORS_PERMISSIVE") {
            self.server.cors_permissive = matches!(flag.as_str(), "1" | "true" | "yes");
        }
        Ok(())
    }

    /// Database URL or an actionable error.
    pub fn database_url(&self) -> Result<&str> {
        self.database.url.as_deref().context(
            "DATABASE_URL not set. Set via --database-url, DATABASE_URL env, or [database] url in ~/.fibreflow/config.toml",
        )
    }

    /// Save config to file
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let toml_str =
            toml::to_string_pretty(self).context("Failed to serialize config to TOML")?;

        fs::write(path, toml_str)
            .context(format!("Failed to write config file: {:?}", path))?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = FibreConfig::load_from(&dir.path().join("nope.toml")).unwrap();
        assert_eq!(config.server.bind, DEFAULT_BIND);
        assert_eq!(config.database.max_connections, DEFAULT_MAX_CONNECTIONS);
        assert_eq!(config.import.batch_size, DEFAULT_BATCH_SIZE);
        assert!(config.database.url.is_none());
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(
            &path,
            "[database]\nurl = \"postgres://localhost/fibreflow\"\n\n[import]\nbatch_size = 250\n",
        )
        .unwrap();

        let config = FibreConfig::load_from(&path).unwrap();
        assert_eq!(
            config.database.url.as_deref(),
            Some("postgres://localhost/fibreflow")
        );
        assert_eq!(config.import.batch_size, 250);
        assert_eq!(config.server.bind, DEFAULT_BIND);
    }

    #[test]
    fn save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/config.toml");
        let mut config = FibreConfig::default();
        config.server.cors_permissive = true;
        config.save_to(&path).unwrap();

        let loaded = FibreConfig::load_from(&path).unwrap();
        assert!(loaded.server.cors_permissive);
    }

    #[test]
    fn invalid_toml_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[database\nurl=").unwrap();
        assert!(FibreConfig::load_from(&path).is_err());
    }

    #[test]
    fn missing_url_message_is_actionable() {
        let config = FibreConfig::default();
        let err = config.database_url().unwrap_err();
        assert!(err.to_string().contains("DATABASE_URL"));
    }
}
