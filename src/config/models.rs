use crate::humanize::ByteSize;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;

/// Top-level configuration, matching the "all recognized options" table.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub queue: QueueConfig,
    #[serde(default)]
    pub metadata: MetadataConfig,
    #[serde(default)]
    pub blob: BlobConfig,
    #[serde(default)]
    pub worker: WorkerConfig,
    #[serde(default)]
    pub gate: GateConfig,
}

/// Server configuration (the thin Axum surface).
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind_addr")]
    pub bind_addr: SocketAddr,
    /// Threshold above which a submitted payload is staged in the blob
    /// store instead of carried inline in the envelope.
    #[serde(default = "default_inline_payload_max_bytes")]
    pub inline_payload_max_bytes: ByteSize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            inline_payload_max_bytes: default_inline_payload_max_bytes(),
        }
    }
}

fn default_bind_addr() -> SocketAddr {
    "0.0.0.0:8080".parse().unwrap()
}

fn default_inline_payload_max_bytes() -> ByteSize {
    ByteSize(262_144)
}

/// Durable work queue configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct QueueConfig {
    /// For the Fjall-backed adapter this is a filesystem path; the name
    /// mirrors `QUEUE_URL` from the external-interfaces table so the same
    /// env var works against any future backend.
    #[serde(default = "default_queue_url")]
    pub queue_url: String,
    #[serde(default = "default_max_queue_size")]
    pub max_queue_size: usize,
    #[serde(default = "default_visibility_timeout_secs")]
    pub visibility_timeout_secs: u64,
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            queue_url: default_queue_url(),
            max_queue_size: default_max_queue_size(),
            visibility_timeout_secs: default_visibility_timeout_secs(),
            max_attempts: default_max_attempts(),
        }
    }
}

fn default_queue_url() -> String {
    "data/queue".to_string()
}

fn default_max_queue_size() -> usize {
    1000
}

fn default_visibility_timeout_secs() -> u64 {
    120
}

fn default_max_attempts() -> u32 {
    5
}

/// Relational metadata store configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MetadataConfig {
    #[serde(default = "default_metadata_url")]
    pub metadata_url: String,
    #[serde(default = "default_pool_max_connections")]
    pub pool_max_connections: u32,
    #[serde(default = "default_pool_max_lifetime_secs")]
    pub pool_max_lifetime_secs: u64,
}

impl Default for MetadataConfig {
    fn default() -> Self {
        Self {
            metadata_url: default_metadata_url(),
            pool_max_connections: default_pool_max_connections(),
            pool_max_lifetime_secs: default_pool_max_lifetime_secs(),
        }
    }
}

fn default_metadata_url() -> String {
    "postgres://localhost/imagegate".to_string()
}

fn default_pool_max_connections() -> u32 {
    20
}

fn default_pool_max_lifetime_secs() -> u64 {
    3600
}

/// Object-store target for originals and processed artifacts.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BlobConfig {
    #[serde(default = "default_bucket")]
    pub bucket: String,
    pub region: Option<String>,
    pub endpoint: Option<String>,
    /// Loaded from environment, never from a TOML file.
    #[serde(skip)]
    pub access_key: Option<String>,
    #[serde(skip)]
    pub secret_key: Option<String>,
}

impl Default for BlobConfig {
    fn default() -> Self {
        Self {
            bucket: default_bucket(),
            region: None,
            endpoint: None,
            access_key: None,
            secret_key: None,
        }
    }
}

fn default_bucket() -> String {
    "imagegate-default".to_string()
}

/// Worker pool + per-step behavior.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WorkerConfig {
    #[serde(default = "default_num_workers")]
    pub num_workers: usize,
    #[serde(default = "default_worker_timeout_secs")]
    pub worker_timeout_secs: u64,
    #[serde(default = "default_poll_timeout_secs")]
    pub poll_timeout_secs: u64,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            num_workers: default_num_workers(),
            worker_timeout_secs: default_worker_timeout_secs(),
            poll_timeout_secs: default_poll_timeout_secs(),
        }
    }
}

fn default_num_workers() -> usize {
    5
}

fn default_worker_timeout_secs() -> u64 {
    300
}

fn default_poll_timeout_secs() -> u64 {
    2
}

/// Admission gate + Model Manager thresholds.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GateConfig {
    #[serde(default = "default_car_confidence_threshold")]
    pub car_confidence_threshold: f32,
    #[serde(default = "default_face_confidence_threshold")]
    pub face_confidence_threshold: f32,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            car_confidence_threshold: default_car_confidence_threshold(),
            face_confidence_threshold: default_face_confidence_threshold(),
        }
    }
}

fn default_car_confidence_threshold() -> f32 {
    0.8
}

fn default_face_confidence_threshold() -> f32 {
    0.8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config {
            server: ServerConfig::default(),
            queue: QueueConfig::default(),
            metadata: MetadataConfig::default(),
            blob: BlobConfig::default(),
            worker: WorkerConfig::default(),
            gate: GateConfig::default(),
        };

        assert_eq!(config.server.bind_addr.to_string(), "0.0.0.0:8080");
        assert_eq!(config.server.inline_payload_max_bytes.as_u64(), 262_144);
        assert_eq!(config.worker.num_workers, 5);
        assert_eq!(config.queue.visibility_timeout_secs, 120);
        assert_eq!(config.queue.max_attempts, 5);
        assert_eq!(config.gate.car_confidence_threshold, 0.8);
    }
}
