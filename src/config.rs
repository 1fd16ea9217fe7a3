//! `config.toml` loading and saving.
//!
//! The base path is deliberately absent here: it is stored inside the catalog
//! so it travels with the catalog file.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::app_dirs::{self, AppDirError};
use crate::scanner::{
    DEFAULT_COMMIT_INTERVAL, DEFAULT_HASH_BYTES_PER_BATCH, DEFAULT_RECONCILE_PAGE_SIZE,
    HashAlgorithm, HashErrorPolicy, PipelineSettings,
};

/// Errors from reading or writing `config.toml`.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Unable to create config directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Invalid config at {path}: {source}")]
    ParseToml {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("Failed to serialize config to TOML at {path}: {source}")]
    SerializeToml {
        path: PathBuf,
        source: toml::ser::Error,
    },
    #[error("No suitable config directory found")]
    NoConfigDir,
}

/// Persisted tool settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Catalog file; `<app dir>/catalog.db` when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub catalog_path: Option<PathBuf>,
    pub commit_interval: usize,
    pub reconcile_page_size: usize,
    pub hash_bytes_per_batch: u64,
    /// Algorithm for a fresh catalog. A catalog keeps the one it was built with.
    pub hash_algorithm: HashAlgorithm,
    pub hash_error_policy: HashErrorPolicy,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            catalog_path: None,
            commit_interval: DEFAULT_COMMIT_INTERVAL,
            reconcile_page_size: DEFAULT_RECONCILE_PAGE_SIZE,
            hash_bytes_per_batch: DEFAULT_HASH_BYTES_PER_BATCH,
            hash_algorithm: HashAlgorithm::default(),
            hash_error_policy: HashErrorPolicy::default(),
        }
    }
}

impl AppConfig {
    /// Clamp sizes that must stay positive.
    pub fn normalized(mut self) -> Self {
        self.commit_interval = self.commit_interval.max(1);
        self.reconcile_page_size = self.reconcile_page_size.max(1);
        self.hash_bytes_per_batch = self.hash_bytes_per_batch.max(1);
        self
    }

    pub fn pipeline_settings(&self) -> PipelineSettings {
        PipelineSettings {
            commit_interval: self.commit_interval,
            reconcile_page_size: self.reconcile_page_size,
            hash_bytes_per_batch: self.hash_bytes_per_batch,
            hash_algorithm: self.hash_algorithm,
            hash_error_policy: self.hash_error_policy,
        }
    }

    /// Configured catalog path, falling back to the app directory.
    pub fn resolved_catalog_path(&self) -> Result<PathBuf, ConfigError> {
        match &self.catalog_path {
            Some(path) => Ok(path.clone()),
            None => app_dirs::default_catalog_path().map_err(map_app_dir_error),
        }
    }
}

/// Resolve the configuration file path, ensuring the parent directory exists.
pub fn config_path() -> Result<PathBuf, ConfigError> {
    app_dirs::config_file_path().map_err(map_app_dir_error)
}

/// Load configuration from disk, returning defaults if missing.
pub fn load_or_default() -> Result<AppConfig, ConfigError> {
    load_from_path(&config_path()?)
}

/// Load a specific config file, returning defaults if it does not exist.
pub fn load_from_path(path: &Path) -> Result<AppConfig, ConfigError> {
    if !path.exists() {
        return Ok(AppConfig::default());
    }
    let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    toml::from_str::<AppConfig>(&text)
        .map(AppConfig::normalized)
        .map_err(|source| ConfigError::ParseToml {
            path: path.to_path_buf(),
            source,
        })
}

/// Persist configuration to the app directory.
pub fn save(config: &AppConfig) -> Result<(), ConfigError> {
    save_to_path(config, &config_path()?)
}

/// Save configuration to a specific path, creating parent directories as needed.
pub fn save_to_path(config: &AppConfig, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent).map_err(|source| ConfigError::CreateDir {
            path: parent.to_path_buf(),
            source,
        })?;
    }
    let data = toml::to_string_pretty(config).map_err(|source| ConfigError::SerializeToml {
        path: path.to_path_buf(),
        source,
    })?;
    std::fs::write(path, data).map_err(|source| ConfigError::Write {
        path: path.to_path_buf(),
        source,
    })
}

fn map_app_dir_error(error: AppDirError) -> ConfigError {
    match error {
        AppDirError::NoBaseDir => ConfigError::NoConfigDir,
        AppDirError::CreateDir { path, source } => ConfigError::CreateDir { path, source },
    }
}
