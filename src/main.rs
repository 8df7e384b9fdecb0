mod cli;

use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use cli::Cli;
use imagegate::api::{self, AppState};
use imagegate::config::Config;
use imagegate::gate::AdmissionGate;
use imagegate::metadata::{MetadataStore, PgMetadataStore};
use imagegate::models::ModelManager;
use imagegate::observability::init_tracing;
use imagegate::queue::FjallQueue;
use imagegate::stats::StatsAggregator;
use imagegate::storage::StorageClient;
use imagegate::worker::{Dispatcher, WorkerConfig, WorkerDeps};
use tracing::{error, info, warn};

const METADATA_CONNECT_RETRIES: u32 = 5;

#[tokio::main]
async fn main() -> ExitCode {
    init_tracing();

    let cli = Cli::parse();

    let config = match cli.config {
        Some(path) => Config::load_from_path(path.into()),
        None => Config::load(),
    };
    let config = match config {
        Ok(config) => Arc::new(config),
        Err(e) => {
            error!(error = %e, "invalid configuration");
            return ExitCode::from(1);
        }
    };

    match run(config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "fatal error");
            ExitCode::from(1)
        }
    }
}

async fn run(config: Arc<Config>) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    info!(path = %config.queue.queue_url, "opening queue");
    let queue = Arc::new(FjallQueue::open(
        &config.queue.queue_url,
        config.queue.max_queue_size,
        Duration::from_secs(config.queue.visibility_timeout_secs),
    )?);

    let metadata: Arc<dyn MetadataStore> = connect_metadata(&config).await?;

    // Object storage: in-memory, matching the one backend this codebase
    // has ever actually wired in its own `main`. A real S3/GCS client
    // is a drop-in `StorageClient::new(Arc<dyn ObjectStore>, bucket)`.
    let blob = Arc::new(StorageClient::in_memory());

    // The vehicle/face models themselves are out of this service's scope
    // (spec §1): `StubModelRuntime` is the only `ModelRuntime` this
    // codebase ships. A real inference backend plugs in here by swapping
    // the loader for one returning a production runtime.
    let models = Arc::new(ModelManager::new(
        || Arc::new(imagegate::models::StubModelRuntime) as Arc<dyn imagegate::models::ModelRuntime>,
        config.worker.num_workers,
        config.gate.car_confidence_threshold,
        config.gate.face_confidence_threshold,
    ));

    let gate = Arc::new(AdmissionGate::new(
        queue.clone(),
        metadata.clone(),
        blob.clone(),
        models.clone(),
        config.server.inline_payload_max_bytes.as_u64() as usize,
    ));

    let stats = Arc::new(StatsAggregator::new());

    let worker_config = WorkerConfig {
        num_workers: config.worker.num_workers,
        worker_timeout: Duration::from_secs(config.worker.worker_timeout_secs),
        poll_timeout: Duration::from_secs(config.worker.poll_timeout_secs),
    };
    let dispatcher = Arc::new(Dispatcher::spawn(
        worker_config,
        WorkerDeps {
            queue: queue.clone(),
            metadata: metadata.clone(),
            blob: blob.clone(),
            models,
            stats: stats.clone(),
            max_attempts: config.queue.max_attempts,
        },
    ));

    let state = AppState {
        config: config.clone(),
        gate,
        metadata,
        queue,
        blob: blob as Arc<dyn imagegate::storage::BlobStore>,
        stats,
        dispatcher,
    };

    api::run(config.server.bind_addr, state).await?;

    Ok(())
}

async fn connect_metadata(
    config: &Config,
) -> Result<Arc<dyn MetadataStore>, Box<dyn std::error::Error + Send + Sync>> {
    let mut attempt = 0;
    loop {
        attempt += 1;
        match PgMetadataStore::connect(
            &config.metadata.metadata_url,
            config.metadata.pool_max_connections,
            config.metadata.pool_max_lifetime_secs,
        )
        .await
        {
            Ok(store) => return Ok(Arc::new(store)),
            Err(e) if attempt >= METADATA_CONNECT_RETRIES => {
                return Err(format!(
                    "metadata store unreachable after {attempt} attempts: {e}"
                )
                .into());
            }
            Err(e) => {
                warn!(attempt, error = %e, "metadata store unreachable, retrying");
                tokio::time::sleep(Duration::from_millis(200 * attempt as u64)).await;
            }
        }
    }
}
