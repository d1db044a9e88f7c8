use std::collections::BTreeMap;

use axum::{
    extract::{Path, State},
    routing::get,
    Json, Router,
};
use serde::Serialize;

use crate::error::{AppError, Result};
use crate::models::{fold_states, Condition, ProfileKind, ProfileRef, ProfileState};
use crate::services::store::NodeStatusQuery;
use crate::state::AppState;

/// Create profile routes
pub fn profiles_routes(state: AppState) -> Router {
    Router::new()
        .route("/{kind}/{namespace}/{name}/status", get(get_profile_status))
        .with_state(state)
}

/// Aggregate status of one profile, with the per-state node breakdown
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileStatusResponse {
    pub profile: ProfileRef,
    /// Value currently stored on the profile
    pub status: Option<ProfileState>,
    /// What the node records fold to right now; differs from `status` until
    /// the next reconcile pass catches up
    pub computed: Option<ProfileState>,
    pub active_workloads: Vec<String>,
    pub conditions: Vec<Condition>,
    pub node_count: usize,
    pub nodes: BTreeMap<ProfileState, usize>,
}

pub(crate) fn parse_kind(kind: &str) -> Result<ProfileKind> {
    kind.parse()
        .map_err(|e: crate::models::profile::ParseProfileKindError| {
            AppError::BadRequest(e.to_string())
        })
}

async fn get_profile_status(
    State(state): State<AppState>,
    Path((kind, namespace, name)): Path<(String, String, String)>,
) -> Result<Json<ProfileStatusResponse>> {
    let profile = ProfileRef::new(parse_kind(&kind)?, namespace, name);

    let current = state
        .store
        .get_profile_status(&profile)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Profile {} not found", profile)))?;

    let records = state
        .store
        .list_node_statuses(&NodeStatusQuery::for_profile(&profile))
        .await?;

    let mut nodes = BTreeMap::new();
    for record in &records {
        *nodes.entry(record.status).or_insert(0) += 1;
    }

    Ok(Json(ProfileStatusResponse {
        computed: fold_states(records.iter().map(|r| r.status)),
        profile,
        status: current.status.status,
        active_workloads: current.status.active_workloads,
        conditions: current.status.conditions,
        node_count: records.len(),
        nodes,
    }))
}
