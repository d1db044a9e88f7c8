//! Resource store seam
//!
//! Everything the aggregator and the record writer need from the cluster's
//! resource store. Writes carry the resource version they were based on and
//! fail with a conflict when the object moved in the meantime.

use async_trait::async_trait;
use serde::Serialize;

use crate::error::Result;
use crate::models::node_status::{
    STATUS_KIND_LABEL, STATUS_STATE_LABEL, STATUS_TO_NODE_LABEL, STATUS_TO_POLICY_LABEL,
};
use crate::models::{ProfileKind, ProfileRef, ProfileState, ProfileStatus, SecurityProfileNodeStatus};

/// A profile's status together with the version it was read at
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VersionedStatus {
    pub status: ProfileStatus,
    pub resource_version: Option<String>,
}

/// Typed selection of node-status records.
///
/// Each filter corresponds to one of the record labels; unset filters match
/// everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NodeStatusQuery {
    pub namespace: Option<String>,
    pub profile_name: Option<String>,
    pub kind: Option<ProfileKind>,
    pub node_name: Option<String>,
    pub state: Option<ProfileState>,
}

impl NodeStatusQuery {
    pub fn all() -> Self {
        Self::default()
    }

    /// Every record belonging to one profile
    pub fn for_profile(profile: &ProfileRef) -> Self {
        Self {
            namespace: Some(profile.namespace.clone()),
            profile_name: Some(profile.name.clone()),
            kind: Some(profile.kind),
            ..Default::default()
        }
    }

    pub fn in_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    pub fn named(mut self, profile_name: impl Into<String>) -> Self {
        self.profile_name = Some(profile_name.into());
        self
    }

    pub fn of_kind(mut self, kind: ProfileKind) -> Self {
        self.kind = Some(kind);
        self
    }

    pub fn on_node(mut self, node_name: impl Into<String>) -> Self {
        self.node_name = Some(node_name.into());
        self
    }

    pub fn in_state(mut self, state: ProfileState) -> Self {
        self.state = Some(state);
        self
    }

    fn label_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = Vec::new();
        if let Some(name) = &self.profile_name {
            pairs.push((STATUS_TO_POLICY_LABEL, name.clone()));
        }
        if let Some(node) = &self.node_name {
            pairs.push((STATUS_TO_NODE_LABEL, node.clone()));
        }
        if let Some(state) = self.state {
            pairs.push((STATUS_STATE_LABEL, state.to_string()));
        }
        if let Some(kind) = self.kind {
            pairs.push((STATUS_KIND_LABEL, kind.to_string()));
        }
        pairs
    }

    /// Equality label selector, empty when no label filter is set
    pub fn label_selector(&self) -> String {
        self.label_pairs()
            .into_iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect::<Vec<_>>()
            .join(",")
    }

    /// Evaluate the query against a record's namespace and labels
    pub fn matches(&self, record: &SecurityProfileNodeStatus) -> bool {
        if let Some(ns) = &self.namespace {
            if record.metadata.namespace.as_deref() != Some(ns.as_str()) {
                return false;
            }
        }
        let labels = record.metadata.labels.as_ref();
        self.label_pairs()
            .iter()
            .all(|(k, v)| labels.and_then(|l| l.get(*k)) == Some(v))
    }
}

#[async_trait]
pub trait ProfileStore: Send + Sync {
    async fn list_node_statuses(
        &self,
        query: &NodeStatusQuery,
    ) -> Result<Vec<SecurityProfileNodeStatus>>;

    async fn get_node_status(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<SecurityProfileNodeStatus>>;

    /// Fails with a conflict if the record already exists
    async fn create_node_status(
        &self,
        record: &SecurityProfileNodeStatus,
    ) -> Result<SecurityProfileNodeStatus>;

    /// Fails with a conflict if `record`'s resource version is stale
    async fn replace_node_status(
        &self,
        record: &SecurityProfileNodeStatus,
    ) -> Result<SecurityProfileNodeStatus>;

    /// Deleting a missing record succeeds
    async fn delete_node_status(&self, namespace: &str, name: &str) -> Result<()>;

    /// All profiles of one kind, in the watched namespace(s)
    async fn list_profiles(&self, kind: ProfileKind) -> Result<Vec<ProfileRef>>;

    /// `None` when the profile does not exist. A profile without a status
    /// subresource yet yields the default status.
    async fn get_profile_status(&self, profile: &ProfileRef) -> Result<Option<VersionedStatus>>;

    /// Replace the status subresource, failing with a conflict when
    /// `status.resource_version` is stale
    async fn replace_profile_status(
        &self,
        profile: &ProfileRef,
        status: &VersionedStatus,
    ) -> Result<VersionedStatus>;
}
