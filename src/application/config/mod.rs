pub mod kubernetes;
pub mod reconcile;
pub mod server;

use std::env;

/// Application configuration loaded from environment variables.
///
/// Built once at startup and handed to whatever needs it.
#[derive(Debug, Clone)]
pub struct Config {
    pub server: server::ServerConfig,
    pub kubernetes: kubernetes::KubernetesConfig,
    pub reconcile: reconcile::ReconcileConfig,

    // Build info
    pub commit_hash: String,
    pub build_time: String,
    pub version: String,

    // Logging
    pub log_level: String,
    pub log_json: bool,
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            server: server::ServerConfig::from_env(),
            kubernetes: kubernetes::KubernetesConfig::from_env(),
            reconcile: reconcile::ReconcileConfig::from_env(),

            // Build info
            commit_hash: env::var("COMMIT_HASH").unwrap_or_else(|_| "unknown".to_string()),
            build_time: env::var("BUILD_TIME").unwrap_or_else(|_| "unknown".to_string()),
            version: env!("CARGO_PKG_VERSION").to_string(),

            // Logging
            log_level: env::var("SPO_LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            log_json: env::var("SPO_LOG_FORMAT")
                .map(|v| v.to_lowercase() == "json")
                .unwrap_or(false),
        }
    }
}
