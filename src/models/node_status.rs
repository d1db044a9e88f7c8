//! Per-node installation record of a security profile
//!
//! One record exists per (profile, node). The identity and current state are
//! mirrored into labels so records can be selected by the API server; the
//! mirror is only ever updated through [`SecurityProfileNodeStatus::set_state`].

use std::borrow::Cow;
use std::collections::BTreeMap;

use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use k8s_openapi::NamespaceResourceScope;
use kube::Resource;
use serde::{Deserialize, Serialize};

use super::profile::{ProfileKind, ProfileRef, API_GROUP, API_VERSION};
use super::profile_state::ProfileState;
use crate::error::{AppError, Result};

/// Identifies the policy by name so that the admin can list all node statuses for a certain policy.
pub const STATUS_TO_POLICY_LABEL: &str = "spo.x-k8s.io/policy-name";
/// Identifies the node on which the policy is installed so that the admin can list policies per node.
pub const STATUS_TO_NODE_LABEL: &str = "spo.x-k8s.io/node-name";
/// Allows the admin to filter out node statuses with a certain state (e.g. show me all that failed).
pub const STATUS_STATE_LABEL: &str = "spo.x-k8s.io/policy-state";
/// The kind of policy so that the admin can filter only e.g. all selinux policy statuses.
pub const STATUS_KIND_LABEL: &str = "spo.x-k8s.io/policy-kind";

pub const NODE_STATUS_KIND: &str = "SecurityProfileNodeStatus";
pub const NODE_STATUS_PLURAL: &str = "securityprofilenodestatuses";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SecurityProfileNodeStatus {
    #[serde(default)]
    pub api_version: String,
    #[serde(default)]
    pub kind: String,
    #[serde(default)]
    pub metadata: ObjectMeta,
    pub profile_name: String,
    pub profile_kind: ProfileKind,
    pub node_name: String,
    #[serde(default)]
    pub status: ProfileState,
}

/// Object name of the record for `profile` on `node_name`
pub fn node_status_name(profile: &ProfileRef, node_name: &str) -> String {
    format!("{}-{}-{}", profile.name, profile.kind.short_name(), node_name)
}

impl SecurityProfileNodeStatus {
    /// A fresh record in the initial `Pending` state
    pub fn new(profile: &ProfileRef, node_name: &str) -> Self {
        let mut record = Self {
            api_version: format!("{}/{}", API_GROUP, API_VERSION),
            kind: NODE_STATUS_KIND.to_string(),
            metadata: ObjectMeta {
                name: Some(node_status_name(profile, node_name)),
                namespace: Some(profile.namespace.clone()),
                ..Default::default()
            },
            profile_name: profile.name.clone(),
            profile_kind: profile.kind,
            node_name: node_name.to_string(),
            status: ProfileState::Pending,
        };
        record.sync_labels();
        record
    }

    pub fn profile_ref(&self) -> ProfileRef {
        ProfileRef::new(
            self.profile_kind,
            self.metadata.namespace.clone().unwrap_or_default(),
            self.profile_name.clone(),
        )
    }

    /// Move to `next`, keeping the state label in step.
    pub fn set_state(&mut self, next: ProfileState) -> Result<()> {
        if !self.status.can_transition_to(next) {
            return Err(AppError::InvalidTransition {
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        self.sync_labels();
        Ok(())
    }

    /// The four derived labels as they should be for the current fields
    pub fn expected_labels(&self) -> BTreeMap<String, String> {
        BTreeMap::from([
            (STATUS_TO_POLICY_LABEL.to_string(), self.profile_name.clone()),
            (STATUS_TO_NODE_LABEL.to_string(), self.node_name.clone()),
            (STATUS_STATE_LABEL.to_string(), self.status.to_string()),
            (
                STATUS_KIND_LABEL.to_string(),
                self.profile_kind.to_string(),
            ),
        ])
    }

    pub fn labels_in_sync(&self) -> bool {
        let labels = self.metadata.labels.as_ref();
        self.expected_labels()
            .iter()
            .all(|(k, v)| labels.and_then(|l| l.get(k)) == Some(v))
    }

    fn sync_labels(&mut self) {
        let expected = self.expected_labels();
        self.metadata
            .labels
            .get_or_insert_with(BTreeMap::new)
            .extend(expected);
    }
}

impl Resource for SecurityProfileNodeStatus {
    type DynamicType = ();
    type Scope = NamespaceResourceScope;

    fn kind(_: &()) -> Cow<'_, str> {
        NODE_STATUS_KIND.into()
    }

    fn group(_: &()) -> Cow<'_, str> {
        API_GROUP.into()
    }

    fn version(_: &()) -> Cow<'_, str> {
        API_VERSION.into()
    }

    fn plural(_: &()) -> Cow<'_, str> {
        NODE_STATUS_PLURAL.into()
    }

    fn meta(&self) -> &ObjectMeta {
        &self.metadata
    }

    fn meta_mut(&mut self) -> &mut ObjectMeta {
        &mut self.metadata
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn nginx() -> ProfileRef {
        ProfileRef::new(ProfileKind::SeccompProfile, "web", "nginx")
    }

    #[test]
    fn test_new_record_is_pending_with_labels() {
        let record = SecurityProfileNodeStatus::new(&nginx(), "worker-1");

        assert_eq!(record.status, ProfileState::Pending);
        assert_eq!(record.metadata.name.as_deref(), Some("nginx-seccomp-worker-1"));
        assert_eq!(record.metadata.namespace.as_deref(), Some("web"));
        assert!(record.labels_in_sync());

        let labels = record.metadata.labels.as_ref().unwrap();
        assert_eq!(labels[STATUS_TO_POLICY_LABEL], "nginx");
        assert_eq!(labels[STATUS_TO_NODE_LABEL], "worker-1");
        assert_eq!(labels[STATUS_STATE_LABEL], "Pending");
        assert_eq!(labels[STATUS_KIND_LABEL], "SeccompProfile");
    }

    #[test]
    fn test_set_state_updates_label() {
        let mut record = SecurityProfileNodeStatus::new(&nginx(), "worker-1");
        record.set_state(ProfileState::InProgress).unwrap();
        record.set_state(ProfileState::Installed).unwrap();

        assert_eq!(record.status, ProfileState::Installed);
        assert!(record.labels_in_sync());
        assert_eq!(
            record.metadata.labels.as_ref().unwrap()[STATUS_STATE_LABEL],
            "Installed"
        );
    }

    #[test]
    fn test_set_state_rejects_invalid_transition() {
        let mut record = SecurityProfileNodeStatus::new(&nginx(), "worker-1");
        let err = record.set_state(ProfileState::Installed).unwrap_err();

        assert!(matches!(
            err,
            AppError::InvalidTransition {
                from: ProfileState::Pending,
                to: ProfileState::Installed
            }
        ));
        assert_eq!(record.status, ProfileState::Pending);
        assert!(record.labels_in_sync());
    }

    #[test]
    fn test_set_state_keeps_foreign_labels() {
        let mut record = SecurityProfileNodeStatus::new(&nginx(), "worker-1");
        record
            .metadata
            .labels
            .as_mut()
            .unwrap()
            .insert("team".to_string(), "platform".to_string());
        record.set_state(ProfileState::Error).unwrap();

        assert_eq!(record.metadata.labels.as_ref().unwrap()["team"], "platform");
    }

    #[test]
    fn test_distinct_kinds_get_distinct_names() {
        let seccomp = SecurityProfileNodeStatus::new(&nginx(), "worker-1");
        let selinux = SecurityProfileNodeStatus::new(
            &ProfileRef::new(ProfileKind::SelinuxProfile, "web", "nginx"),
            "worker-1",
        );
        assert_ne!(seccomp.metadata.name, selinux.metadata.name);
    }

    #[test]
    fn test_wire_format() {
        let record = SecurityProfileNodeStatus::new(&nginx(), "worker-1");
        let json = serde_json::to_value(&record).unwrap();

        assert_eq!(
            json["apiVersion"],
            "security-profiles-operator.x-k8s.io/v1alpha1"
        );
        assert_eq!(json["kind"], "SecurityProfileNodeStatus");
        assert_eq!(json["nodeName"], "worker-1");
        assert_eq!(json["profileKind"], "SeccompProfile");
        assert_eq!(json["status"], "Pending");
    }

    #[test]
    fn test_missing_status_defaults_to_pending() {
        let record: SecurityProfileNodeStatus = serde_json::from_value(serde_json::json!({
            "metadata": { "name": "nginx-seccomp-worker-2", "namespace": "web" },
            "profileName": "nginx",
            "profileKind": "SeccompProfile",
            "nodeName": "worker-2"
        }))
        .unwrap();

        assert_eq!(record.status, ProfileState::Pending);
        assert_eq!(record.profile_ref(), nginx());
    }

    #[test]
    fn test_resource_metadata() {
        assert_eq!(SecurityProfileNodeStatus::kind(&()), "SecurityProfileNodeStatus");
        assert_eq!(
            SecurityProfileNodeStatus::api_version(&()),
            "security-profiles-operator.x-k8s.io/v1alpha1"
        );
        assert_eq!(
            SecurityProfileNodeStatus::plural(&()),
            "securityprofilenodestatuses"
        );
    }
}
