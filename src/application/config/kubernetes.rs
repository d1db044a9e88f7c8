use std::env;
use std::fs;
use std::path::{Path, PathBuf};

/// The name when referring to the operator.
pub const OPERATOR_NAME: &str = "security-profiles-operator";

/// Path where all kubelet seccomp profiles are stored.
pub const KUBELET_SECCOMP_ROOT_PATH: &str = "/var/lib/kubelet/seccomp";

/// Path where the operator stores seccomp profiles.
pub const PROFILES_ROOT_PATH: &str = "/var/lib/kubelet/seccomp/operator";

/// Environment variable holding the name of the current node.
pub const NODE_NAME_ENV_KEY: &str = "NODE_NAME";

const SERVICE_ACCOUNT_NAMESPACE_PATH: &str =
    "/var/run/secrets/kubernetes.io/serviceaccount/namespace";

#[derive(Debug, Clone)]
pub struct KubernetesConfig {
    pub kubeconfig_path: Option<PathBuf>,
    pub in_cluster: bool,
    /// Namespace the operator runs in, resolved once at startup
    pub operator_namespace: String,
    /// Restrict watches to one namespace; `None` watches all of them
    pub watch_namespace: Option<String>,
    /// Set when running as a node agent
    pub node_name: Option<String>,
}

impl KubernetesConfig {
    pub fn from_env() -> Self {
        Self {
            kubeconfig_path: env::var("SPO_KUBECONFIG_PATH").ok().map(PathBuf::from),
            in_cluster: env::var("SPO_IN_CLUSTER")
                .map(|v| v.to_lowercase() == "true")
                .unwrap_or(false),
            operator_namespace: resolve_operator_namespace(
                env::var("SPO_OPERATOR_NAMESPACE").ok(),
                Path::new(SERVICE_ACCOUNT_NAMESPACE_PATH),
            ),
            watch_namespace: env::var("SPO_WATCH_NAMESPACE")
                .ok()
                .filter(|ns| !ns.trim().is_empty()),
            node_name: env::var(NODE_NAME_ENV_KEY)
                .ok()
                .filter(|n| !n.trim().is_empty()),
        }
    }
}

/// Explicit setting first, then the mounted service account, then the
/// operator's well-known namespace.
pub fn resolve_operator_namespace(explicit: Option<String>, sa_namespace_file: &Path) -> String {
    if let Some(ns) = explicit.map(|ns| ns.trim().to_string()).filter(|ns| !ns.is_empty()) {
        return ns;
    }
    if let Ok(contents) = fs::read_to_string(sa_namespace_file) {
        let ns = contents.trim();
        if !ns.is_empty() {
            return ns.to_string();
        }
    }
    OPERATOR_NAME.to_string()
}
