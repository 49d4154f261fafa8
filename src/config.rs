//! Runtime configuration.
//!
//! Values come from the environment (after `.env` is loaded), can be
//! overridden by a YAML file, and finally by CLI flags in the binaries.

use crate::store::DatabaseConfig;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

/// Default location of the legacy dump, relative to the working directory.
pub const DEFAULT_DUMP_PATH: &str = "data/legacy_dump.sql";

/// Prefix shared by every table the migration writes to.
pub const DEFAULT_TABLE_PREFIX: &str = "cms_";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MigrationConfig {
    pub dump_path: PathBuf,
    pub database_url: Option<String>,
    pub table_prefix: String,
    /// YAML mapping set; the built-in mappings are used when unset.
    pub mappings_path: Option<PathBuf>,
    pub port: u16,
    pub database: DatabaseConfig,
}

impl Default for MigrationConfig {
    fn default() -> Self {
        Self {
            dump_path: std::env::var("DUMP_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from(DEFAULT_DUMP_PATH)),
            database_url: std::env::var("DATABASE_URL").ok(),
            table_prefix: std::env::var("TABLE_PREFIX")
                .unwrap_or_else(|_| DEFAULT_TABLE_PREFIX.to_string()),
            mappings_path: std::env::var("MAPPINGS_PATH").ok().map(PathBuf::from),
            port: std::env::var("PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(8080),
            database: DatabaseConfig::default(),
        }
    }
}

impl MigrationConfig {
    /// Load `.env` if present and build the environment-backed defaults.
    pub fn from_env() -> Self {
        dotenv::dotenv().ok();
        Self::default()
    }

    /// Load configuration from a YAML file. Keys missing from the file keep
    /// their environment-backed defaults.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: MigrationConfig = serde_yaml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.table_prefix.is_empty() {
            return Err(ConfigError::Invalid("table_prefix must not be empty".to_string()));
        }
        if !self
            .table_prefix
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_')
        {
            return Err(ConfigError::Invalid(format!(
                "table_prefix '{}' may only contain letters, digits and '_'",
                self.table_prefix
            )));
        }
        Ok(())
    }

    /// The database URL, or an error naming the variable to set.
    pub fn require_database_url(&self) -> Result<&str, ConfigError> {
        self.database_url
            .as_deref()
            .ok_or_else(|| ConfigError::Missing("DATABASE_URL".to_string()))
    }
}

#[derive(Debug)]
pub enum ConfigError {
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    Yaml(serde_yaml::Error),
    Invalid(String),
    Missing(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Io { path, source } => {
                write!(f, "Failed to read config file {}: {}", path.display(), source)
            }
            ConfigError::Yaml(e) => write!(f, "Failed to parse YAML: {}", e),
            ConfigError::Invalid(msg) => write!(f, "Invalid configuration: {}", msg),
            ConfigError::Missing(key) => write!(f, "Missing required setting {}", key),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::Io { source, .. } => Some(source),
            ConfigError::Yaml(e) => Some(e),
            _ => None,
        }
    }
}

impl From<serde_yaml::Error> for ConfigError {
    fn from(err: serde_yaml::Error) -> Self {
        ConfigError::Yaml(err)
    }
}
