//! Configuration management for imagegate.
//!
//! Layered configuration loaded from:
//! 1. Default values (embedded in structs)
//! 2. TOML configuration file
//! 3. Environment variables (highest priority)
//!
//! # Usage
//!
//! ```no_run
//! use imagegate::config::Config;
//!
//! let config = Config::load().expect("failed to load configuration");
//! println!("worker pool size: {}", config.worker.num_workers);
//! ```
//!
//! # Environment variables
//!
//! Configuration can be overridden using the pattern
//! `IMAGEGATE__<section>__<key>`, e.g. `IMAGEGATE__WORKER__NUM_WORKERS=8`.
//!
//! # Configuration file
//!
//! By default, configuration is loaded from `config/imagegate.toml`. This
//! can be overridden with the `IMAGEGATE_CONFIG` environment variable.

mod models;
mod sources;
mod validation;

pub use crate::humanize::ByteSize;
pub use models::{
    BlobConfig, Config, GateConfig, MetadataConfig, QueueConfig, ServerConfig, WorkerConfig,
};
pub use validation::ValidationError;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    LoadError(#[from] config::ConfigError),

    #[error("configuration validation failed: {0}")]
    ValidationError(#[from] ValidationError),
}

impl Config {
    /// Load configuration from all sources (file + environment), then
    /// validate it.
    pub fn load() -> Result<Self, ConfigError> {
        let config = sources::load()?;
        validation::validate(&config)?;
        Ok(config)
    }

    /// Load configuration from a specific path. Useful for tests.
    pub fn load_from_path(path: std::path::PathBuf) -> Result<Self, ConfigError> {
        let config = sources::load_from_sources(path)?;
        validation::validate(&config)?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_load_minimal_config() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("test.toml");

        fs::write(&config_path, "[worker]\nnum_workers = 3\n").unwrap();

        let config = Config::load_from_path(config_path).unwrap();
        assert_eq!(config.worker.num_workers, 3);
    }

    #[test]
    fn test_validation_catches_bad_config() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("test.toml");

        fs::write(&config_path, "[worker]\nnum_workers = 0\n").unwrap();

        let result = Config::load_from_path(config_path);
        assert!(result.is_err());
        assert!(matches!(
            result.unwrap_err(),
            ConfigError::ValidationError(ValidationError::InvalidNumWorkers(0))
        ));
    }
}
