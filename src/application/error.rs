use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

use crate::models::ProfileState;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Optimistic-concurrency failure: the object changed since it was read
    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Conflict retries exhausted for {profile} after {attempts} attempts")]
    ConflictRetriesExhausted { profile: String, attempts: u32 },

    #[error("Invalid state transition from {from} to {to}")]
    InvalidTransition { from: ProfileState, to: ProfileState },

    #[error("Internal server error: {0}")]
    Internal(String),

    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("Kubernetes error: {0}")]
    Kubernetes(#[from] kube::Error),

    #[error("Kubernetes config error: {0}")]
    KubeConfig(#[from] kube::config::KubeconfigError),

    #[error("Kubernetes in-cluster config error: {0}")]
    KubeInCluster(#[from] kube::config::InClusterError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl AppError {
    /// Whether retrying the same operation after a fresh read could succeed
    pub fn is_conflict(&self) -> bool {
        match self {
            AppError::Conflict(_) => true,
            AppError::Kubernetes(kube::Error::Api(ae)) => ae.code == 409,
            _ => false,
        }
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    detail: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, msg.clone()),
            AppError::ConflictRetriesExhausted { .. } => (StatusCode::CONFLICT, self.to_string()),
            AppError::InvalidTransition { .. } => (StatusCode::BAD_REQUEST, self.to_string()),
            AppError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg.clone()),
            AppError::ServiceUnavailable(msg) => (StatusCode::SERVICE_UNAVAILABLE, msg.clone()),
            AppError::Kubernetes(e) => {
                tracing::error!("Kubernetes error: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    format!("Kubernetes error: {}", e),
                )
            }
            AppError::KubeConfig(e) => {
                tracing::error!("Kubernetes config error: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    format!("Kubernetes config error: {}", e),
                )
            }
            AppError::KubeInCluster(e) => {
                tracing::error!("Kubernetes in-cluster config error: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    format!("Kubernetes in-cluster config error: {}", e),
                )
            }
            AppError::Json(e) => {
                tracing::error!("JSON error: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    format!("JSON error: {}", e),
                )
            }
        };

        (status, Json(ErrorResponse { detail: message })).into_response()
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
