use super::models::Config;
use config::{ConfigError, Environment, File};
use std::env;
use std::path::PathBuf;

const CONFIG_ENV_VAR: &str = "IMAGEGATE_CONFIG";
const DEFAULT_CONFIG_PATH: &str = "config/imagegate.toml";
const ENV_PREFIX: &str = "IMAGEGATE";
const ENV_SEPARATOR: &str = "__";

/// Load configuration from multiple sources with priority:
/// 1. Defaults (embedded in structs)
/// 2. TOML file (if present)
/// 3. `.env` file (via dotenvy)
/// 4. System environment variables (highest priority)
pub fn load() -> Result<Config, ConfigError> {
    let _ = dotenvy::dotenv();

    let config_path = env::var(CONFIG_ENV_VAR)
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH));

    let mut config = load_from_sources(config_path)?;
    load_secrets(&mut config);

    Ok(config)
}

/// Secrets never live in TOML; they're read straight from the environment.
fn load_secrets(config: &mut Config) {
    if let Ok(access_key) = env::var("BLOB_ACCESS_KEY") {
        config.blob.access_key = Some(access_key);
    }
    if let Ok(secret_key) = env::var("BLOB_SECRET_KEY") {
        config.blob.secret_key = Some(secret_key);
    }

    if config.blob.access_key.is_none() {
        if let Ok(access_key) = env::var("AWS_ACCESS_KEY_ID") {
            config.blob.access_key = Some(access_key);
        }
    }
    if config.blob.secret_key.is_none() {
        if let Ok(secret_key) = env::var("AWS_SECRET_ACCESS_KEY") {
            config.blob.secret_key = Some(secret_key);
        }
    }
}

/// Load configuration from a specific path. Useful for tests with custom
/// fixture files.
pub fn load_from_sources(config_path: PathBuf) -> Result<Config, ConfigError> {
    let mut builder = config::Config::builder();

    if config_path.exists() {
        tracing::info!("loading configuration from {}", config_path.display());
        builder = builder.add_source(File::from(config_path).required(false));
    } else {
        tracing::warn!(
            path = %config_path.display(),
            "configuration file not found, using defaults and environment overrides"
        );
    }

    // IMAGEGATE__QUEUE__NUM_WORKERS -> queue.num_workers, etc.
    builder = builder.add_source(
        Environment::with_prefix(ENV_PREFIX)
            .separator(ENV_SEPARATOR)
            .try_parsing(true),
    );

    let config = builder.build()?;
    config.try_deserialize()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_load_defaults_only() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("nonexistent.toml");

        let config = load_from_sources(config_path).unwrap();
        assert_eq!(config.server.bind_addr.to_string(), "0.0.0.0:8080");
        assert_eq!(config.worker.num_workers, 5);
    }

    #[test]
    fn test_load_from_toml_overrides_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("test.toml");

        let toml_content = r#"
[server]
bind_addr = "127.0.0.1:9000"
inline_payload_max_bytes = "1MB"

[worker]
num_workers = 8

[queue]
max_attempts = 3
        "#;

        fs::write(&config_path, toml_content).unwrap();

        let config = load_from_sources(config_path).unwrap();
        assert_eq!(config.server.bind_addr.to_string(), "127.0.0.1:9000");
        assert_eq!(
            config.server.inline_payload_max_bytes.as_u64(),
            1024 * 1024
        );
        assert_eq!(config.worker.num_workers, 8);
        assert_eq!(config.queue.max_attempts, 3);
    }

    #[test]
    fn test_load_full_config() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("test.toml");

        let toml_content = r#"
[server]
bind_addr = "0.0.0.0:8080"

[queue]
queue_url = "data/queue"
max_queue_size = 500
visibility_timeout_secs = 60
max_attempts = 5

[metadata]
metadata_url = "postgres://localhost/imagegate_test"
pool_max_connections = 10

[blob]
bucket = "imagegate-test"
region = "us-east-1"

[worker]
num_workers = 10
worker_timeout_secs = 120

[gate]
car_confidence_threshold = 0.75
face_confidence_threshold = 0.9
        "#;

        fs::write(&config_path, toml_content).unwrap();

        let config = load_from_sources(config_path).unwrap();
        assert_eq!(config.queue.max_queue_size, 500);
        assert_eq!(config.metadata.pool_max_connections, 10);
        assert_eq!(config.blob.bucket, "imagegate-test");
        assert_eq!(config.worker.num_workers, 10);
        assert_eq!(config.gate.car_confidence_threshold, 0.75);
    }
}
