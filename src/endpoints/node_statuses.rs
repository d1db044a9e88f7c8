use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};
use serde::Deserialize;

use super::profiles::parse_kind;
use crate::error::{AppError, Result};
use crate::models::{ProfileState, SecurityProfileNodeStatus};
use crate::services::store::NodeStatusQuery;
use crate::state::AppState;

/// Create node status routes
pub fn node_statuses_routes(state: AppState) -> Router {
    Router::new()
        .route("/", get(list_node_statuses))
        .with_state(state)
}

/// Label filters; all optional
#[derive(Debug, Default, Deserialize)]
pub struct NodeStatusFilter {
    pub namespace: Option<String>,
    pub profile: Option<String>,
    pub kind: Option<String>,
    pub node: Option<String>,
    pub state: Option<String>,
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

impl NodeStatusFilter {
    /// `?state=` and friends mean "no filter"
    fn without_blanks(self) -> Self {
        Self {
            namespace: non_blank(self.namespace),
            profile: non_blank(self.profile),
            kind: non_blank(self.kind),
            node: non_blank(self.node),
            state: non_blank(self.state),
        }
    }
}

impl TryFrom<NodeStatusFilter> for NodeStatusQuery {
    type Error = AppError;

    fn try_from(filter: NodeStatusFilter) -> Result<Self> {
        let filter = filter.without_blanks();
        let mut query = NodeStatusQuery::all();
        if let Some(namespace) = filter.namespace {
            query = query.in_namespace(namespace);
        }
        if let Some(profile) = filter.profile {
            query = query.named(profile);
        }
        if let Some(kind) = filter.kind {
            query = query.of_kind(parse_kind(&kind)?);
        }
        if let Some(node) = filter.node {
            query = query.on_node(node);
        }
        if let Some(state) = filter.state {
            let state: ProfileState = state
                .parse()
                .map_err(|e: crate::models::profile_state::ParseProfileStateError| {
                    AppError::BadRequest(e.to_string())
                })?;
            query = query.in_state(state);
        }
        Ok(query)
    }
}

/// List node status records, e.g. all records in `Error` or all on one node
async fn list_node_statuses(
    State(state): State<AppState>,
    Query(filter): Query<NodeStatusFilter>,
) -> Result<Json<Vec<SecurityProfileNodeStatus>>> {
    let query = NodeStatusQuery::try_from(filter)?;
    let records = state.store.list_node_statuses(&query).await?;
    Ok(Json(records))
}
