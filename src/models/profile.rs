//! Security profile resources and their shared status
//!
//! Profile content (syscall rules, SELinux policy text) is carried as data
//! only; it is never interpreted here.

use std::fmt;
use std::str::FromStr;

use k8s_openapi::NamespaceResourceScope;
use kube::{CustomResource, Resource, ResourceExt};
use schemars::JsonSchema;
use serde::{de::DeserializeOwned, Deserialize, Serialize};

use super::condition::Condition;
use super::profile_state::ProfileState;

pub const API_GROUP: &str = "security-profiles-operator.x-k8s.io";
pub const API_VERSION: &str = "v1alpha1";

/// Which kind of profile a record or status belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
pub enum ProfileKind {
    SeccompProfile,
    SelinuxProfile,
}

impl ProfileKind {
    pub const ALL: [ProfileKind; 2] = [ProfileKind::SeccompProfile, ProfileKind::SelinuxProfile];

    pub const fn as_str(self) -> &'static str {
        match self {
            ProfileKind::SeccompProfile => "SeccompProfile",
            ProfileKind::SelinuxProfile => "SelinuxProfile",
        }
    }

    /// Short form used in object names and URLs
    pub const fn short_name(self) -> &'static str {
        match self {
            ProfileKind::SeccompProfile => "seccomp",
            ProfileKind::SelinuxProfile => "selinux",
        }
    }
}

impl fmt::Display for ProfileKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown profile kind: {0}")]
pub struct ParseProfileKindError(pub String);

impl FromStr for ProfileKind {
    type Err = ParseProfileKindError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ProfileKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s || kind.short_name() == s)
            .ok_or_else(|| ParseProfileKindError(s.to_string()))
    }
}

/// Identity of one profile object
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProfileRef {
    pub kind: ProfileKind,
    pub namespace: String,
    pub name: String,
}

impl ProfileRef {
    pub fn new(kind: ProfileKind, namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            kind,
            namespace: namespace.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for ProfileRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.kind.short_name(), self.namespace, self.name)
    }
}

/// Status subresource shared by every profile kind
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProfileStatus {
    /// Cluster-wide aggregate. Absent until at least one node has reported.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<ProfileState>,
    /// Workloads currently using this profile (maintained elsewhere)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub active_workloads: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<Condition>,
}

// ============================================================================
// Seccomp
// ============================================================================

#[derive(CustomResource, Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
#[kube(
    group = "security-profiles-operator.x-k8s.io",
    version = "v1alpha1",
    kind = "SeccompProfile",
    namespaced,
    status = "ProfileStatus",
    shortname = "sp",
    printcolumn = r#"{"name":"Status","type":"string","jsonPath":".status.status"}"#,
    printcolumn = r#"{"name":"Age","type":"date","jsonPath":".metadata.creationTimestamp"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct SeccompProfileSpec {
    /// Action taken when no syscall rule matches
    pub default_action: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub architectures: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub syscalls: Vec<Syscall>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub flags: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_workload: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Syscall {
    pub names: Vec<String>,
    pub action: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<Arg>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Arg {
    pub index: u32,
    #[serde(default)]
    pub value: u64,
    #[serde(default)]
    pub value_two: u64,
    pub op: String,
}

// ============================================================================
// SELinux
// ============================================================================

#[derive(CustomResource, Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
#[kube(
    group = "security-profiles-operator.x-k8s.io",
    version = "v1alpha1",
    kind = "SelinuxProfile",
    namespaced,
    status = "ProfileStatus",
    printcolumn = r#"{"name":"Status","type":"string","jsonPath":".status.status"}"#,
    printcolumn = r#"{"name":"Age","type":"date","jsonPath":".metadata.creationTimestamp"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct SelinuxProfileSpec {
    /// Base policies this policy builds on
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub inherit: Vec<String>,
    /// Policy text in CIL form
    pub policy: String,
}

// ============================================================================
// Kind-generic access
// ============================================================================

/// A profile resource whose status is aggregated from node records
pub trait SecurityProfile:
    Resource<DynamicType = (), Scope = NamespaceResourceScope>
    + Clone
    + fmt::Debug
    + Serialize
    + DeserializeOwned
    + Send
    + Sync
    + 'static
{
    const KIND: ProfileKind;

    fn profile_status(&self) -> Option<&ProfileStatus>;

    fn profile_ref(&self) -> ProfileRef {
        ProfileRef::new(
            Self::KIND,
            self.namespace().unwrap_or_default(),
            self.name_any(),
        )
    }
}

impl SecurityProfile for SeccompProfile {
    const KIND: ProfileKind = ProfileKind::SeccompProfile;

    fn profile_status(&self) -> Option<&ProfileStatus> {
        self.status.as_ref()
    }
}

impl SecurityProfile for SelinuxProfile {
    const KIND: ProfileKind = ProfileKind::SelinuxProfile;

    fn profile_status(&self) -> Option<&ProfileStatus> {
        self.status.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kube::CustomResourceExt;

    #[test]
    fn test_kind_parse_accepts_full_and_short_names() {
        assert_eq!("SeccompProfile".parse(), Ok(ProfileKind::SeccompProfile));
        assert_eq!("seccomp".parse(), Ok(ProfileKind::SeccompProfile));
        assert_eq!("SelinuxProfile".parse(), Ok(ProfileKind::SelinuxProfile));
        assert_eq!("selinux".parse(), Ok(ProfileKind::SelinuxProfile));
        assert!("apparmor".parse::<ProfileKind>().is_err());
    }

    #[test]
    fn test_profile_ref_display() {
        let profile = ProfileRef::new(ProfileKind::SeccompProfile, "default", "nginx");
        assert_eq!(profile.to_string(), "seccomp/default/nginx");
    }

    #[test]
    fn test_status_omits_absent_aggregate() {
        let json = serde_json::to_value(ProfileStatus::default()).unwrap();
        assert_eq!(json, serde_json::json!({}));
    }

    #[test]
    fn test_status_wire_format() {
        let status = ProfileStatus {
            status: Some(ProfileState::Installed),
            active_workloads: vec!["default/nginx-7d9f".to_string()],
            conditions: Vec::new(),
        };
        let json = serde_json::to_value(&status).unwrap();
        assert_eq!(json["status"], "Installed");
        assert_eq!(json["activeWorkloads"][0], "default/nginx-7d9f");
    }

    #[test]
    fn test_seccomp_profile_ref() {
        let mut profile = SeccompProfile::new(
            "nginx",
            SeccompProfileSpec {
                default_action: "SCMP_ACT_ERRNO".to_string(),
                ..Default::default()
            },
        );
        profile.metadata.namespace = Some("web".to_string());

        let profile_ref = profile.profile_ref();
        assert_eq!(profile_ref.kind, ProfileKind::SeccompProfile);
        assert_eq!(profile_ref.namespace, "web");
        assert_eq!(profile_ref.name, "nginx");
        assert!(profile.profile_status().is_none());
    }

    #[test]
    fn test_crd_names() {
        let crd = SeccompProfile::crd();
        assert_eq!(crd.spec.group, API_GROUP);
        assert_eq!(crd.spec.names.kind, "SeccompProfile");
        assert_eq!(crd.spec.versions[0].name, API_VERSION);

        let crd = SelinuxProfile::crd();
        assert_eq!(crd.spec.names.kind, "SelinuxProfile");
    }
}
