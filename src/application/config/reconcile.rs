use std::env;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct ReconcileConfig {
    /// Re-list-and-fold attempts after a status write conflict
    pub max_conflict_retries: u32,
    /// Period of the full resync over every profile
    pub resync_interval: Duration,
    /// Profiles reconciled in parallel during a full resync
    pub resync_concurrency: usize,
    /// Requeue delay after a failed reconcile
    pub error_requeue: Duration,
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            max_conflict_retries: 5,
            resync_interval: Duration::from_secs(300),
            resync_concurrency: 8,
            error_requeue: Duration::from_secs(15),
        }
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    env::var(key).ok().and_then(|v| v.parse().ok())
}

impl ReconcileConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            max_conflict_retries: env_parse("SPO_MAX_CONFLICT_RETRIES")
                .unwrap_or(defaults.max_conflict_retries),
            resync_interval: env_parse("SPO_RESYNC_INTERVAL_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.resync_interval),
            resync_concurrency: env_parse::<usize>("SPO_RESYNC_CONCURRENCY")
                .filter(|n| *n > 0)
                .unwrap_or(defaults.resync_concurrency),
            error_requeue: env_parse("SPO_ERROR_REQUEUE_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.error_requeue),
        }
    }
}
