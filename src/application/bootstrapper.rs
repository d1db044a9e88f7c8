//! Application bootstrapper
//!
//! Handles all initialization and setup for the profile status service.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use kube::CustomResourceExt;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::{server::ServerConfig, Config};
use crate::endpoints;
use crate::models::{SeccompProfile, SelinuxProfile};
use crate::services::controller::{run_controller, ControllerContext};
use crate::services::scheduler::{self, ResyncTask};
use crate::services::{K8sClient, KubeStore};
use crate::state::{AppState, SharedStore};

/// Bootstrap and run the application
pub async fn run() -> anyhow::Result<()> {
    if std::env::args().nth(1).as_deref() == Some("crd") {
        print!("{}", crd_manifests()?);
        return Ok(());
    }

    let config = Arc::new(Config::from_env());
    init_tracing(&config);

    tracing::info!(
        version = %config.version,
        commit = %config.commit_hash,
        operator_namespace = %config.kubernetes.operator_namespace,
        node = ?config.kubernetes.node_name,
        "Starting security profile status aggregator"
    );

    let k8s = K8sClient::new(&config.kubernetes).await?;
    match k8s.get_server_version().await {
        Ok(version) => tracing::info!("Kubernetes client initialized (server {})", version),
        Err(e) => tracing::warn!("Kubernetes API server not reachable yet: {}", e),
    }

    let store: SharedStore = Arc::new(KubeStore::new(
        &k8s,
        config.kubernetes.watch_namespace.clone(),
    ));
    let state = AppState::new(config.clone(), store);

    scheduler::start_scheduler(vec![Box::new(ResyncTask {
        aggregator: state.aggregator.clone(),
        every: config.reconcile.resync_interval,
        concurrency: config.reconcile.resync_concurrency,
    })]);

    let ctx = Arc::new(ControllerContext {
        aggregator: state.aggregator.clone(),
        error_requeue: config.reconcile.error_requeue,
    });
    let watch_namespace = config.kubernetes.watch_namespace.clone();
    let seccomp = tokio::spawn(run_controller::<SeccompProfile>(
        k8s.client().clone(),
        watch_namespace.clone(),
        ctx.clone(),
    ));
    let selinux = tokio::spawn(run_controller::<SelinuxProfile>(
        k8s.client().clone(),
        watch_namespace,
        ctx,
    ));

    let app = create_app(state);

    tokio::select! {
        res = serve(app, &config.server) => res,
        _ = futures_util::future::join(seccomp, selinux) => {
            tracing::info!("Controllers stopped, shutting down");
            Ok(())
        }
    }
}

/// Initialize tracing/logging
fn init_tracing(config: &Config) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| format!("spo_status={}", config.log_level).into());

    let registry = tracing_subscriber::registry().with(filter);
    if config.log_json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_ansi(false))
            .init();
    }
}

/// YAML manifests of the profile CRDs
pub fn crd_manifests() -> anyhow::Result<String> {
    let seccomp = serde_yaml::to_string(&SeccompProfile::crd())?;
    let selinux = serde_yaml::to_string(&SelinuxProfile::crd())?;
    Ok(format!("{}---\n{}", seccomp, selinux))
}

/// Create the main application router
pub fn create_app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    endpoints::create_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}

/// Start the HTTP server
async fn serve(app: Router, server: &ServerConfig) -> anyhow::Result<()> {
    let addr: SocketAddr = format!("{}:{}", server.host, server.port).parse()?;
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_crd_manifests_cover_both_kinds() {
        let manifests = crd_manifests().unwrap();
        let docs: Vec<&str> = manifests.split("---\n").collect();

        assert_eq!(docs.len(), 2);
        assert!(docs[0].contains("seccompprofiles.security-profiles-operator.x-k8s.io"));
        assert!(docs[1].contains("selinuxprofiles.security-profiles-operator.x-k8s.io"));
    }
}
