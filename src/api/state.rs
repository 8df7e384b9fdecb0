use std::sync::Arc;

use crate::config::Config;
use crate::gate::AdmissionGate;
use crate::metadata::MetadataStore;
use crate::queue::QueueAdapter;
use crate::stats::StatsAggregator;
use crate::storage::BlobStore;
use crate::worker::Dispatcher;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub gate: Arc<AdmissionGate>,
    pub metadata: Arc<dyn MetadataStore>,
    pub queue: Arc<dyn QueueAdapter>,
    pub blob: Arc<dyn BlobStore>,
    pub stats: Arc<StatsAggregator>,
    pub dispatcher: Arc<Dispatcher>,
}
