pub mod node_statuses;
pub mod profiles;

use axum::{extract::State, routing::get, Router};

use crate::state::AppState;

/// Create the main API router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/api/health", get(health_check))
        .route("/api/system/version", get(get_version))
        .with_state(state.clone())
        .nest("/api", api_routes(state))
}

/// Read-only API routes under /api/*
fn api_routes(state: AppState) -> Router {
    Router::new()
        .nest("/profiles", profiles::profiles_routes(state.clone()))
        .nest("/nodestatuses", node_statuses::node_statuses_routes(state))
}

/// Health check endpoint
async fn health_check() -> &'static str {
    "OK"
}

/// Version info endpoint
async fn get_version(State(state): State<AppState>) -> axum::Json<serde_json::Value> {
    axum::Json(serde_json::json!({
        "version": state.config.version,
        "commit_hash": state.config.commit_hash,
        "build_time": state.config.build_time,
        "operator_namespace": state.config.kubernetes.operator_namespace,
        "node_name": state.config.kubernetes.node_name,
    }))
}
