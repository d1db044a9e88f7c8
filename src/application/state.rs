use std::sync::Arc;

use crate::config::Config;
use crate::services::aggregator::StatusAggregator;
use crate::services::store::ProfileStore;

/// Shared resource store
pub type SharedStore = Arc<dyn ProfileStore>;

/// Application state containing all shared resources
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub store: SharedStore,
    pub aggregator: Arc<StatusAggregator>,
}

impl AppState {
    pub fn new(config: Arc<Config>, store: SharedStore) -> Self {
        let aggregator = Arc::new(StatusAggregator::new(
            store.clone(),
            config.reconcile.max_conflict_retries,
        ));
        Self {
            config,
            store,
            aggregator,
        }
    }
}
