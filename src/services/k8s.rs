use async_trait::async_trait;
use kube::{
    api::{Api, DeleteParams, ListParams, Patch, PatchParams, PostParams},
    config::{Config, KubeConfigOptions, Kubeconfig},
    Client, ResourceExt,
};
use serde_json::json;

use super::store::{NodeStatusQuery, ProfileStore, VersionedStatus};
use crate::config::kubernetes::KubernetesConfig;
use crate::error::{AppError, Result};
use crate::models::{
    ProfileKind, ProfileRef, SeccompProfile, SecurityProfile, SecurityProfileNodeStatus,
    SelinuxProfile,
};

/// Kubernetes client manager
#[derive(Clone)]
pub struct K8sClient {
    client: Client,
}

impl K8sClient {
    /// Create a new Kubernetes client
    pub async fn new(config: &KubernetesConfig) -> Result<Self> {
        let client = if config.in_cluster {
            // In-cluster config
            let config = Config::incluster()?;
            Client::try_from(config)?
        } else if let Some(ref kubeconfig_path) = config.kubeconfig_path {
            // Explicit kubeconfig path
            let kubeconfig = Kubeconfig::read_from(kubeconfig_path)?;
            let config =
                Config::from_custom_kubeconfig(kubeconfig, &KubeConfigOptions::default()).await?;
            Client::try_from(config)?
        } else {
            // Default kubeconfig
            Client::try_default().await?
        };

        Ok(Self { client })
    }

    /// Get the Kubernetes client
    pub fn client(&self) -> &Client {
        &self.client
    }

    /// Get Kubernetes server version
    pub async fn get_server_version(&self) -> Result<String> {
        let version = self.client.apiserver_version().await?;
        Ok(format!("{}.{}", version.major, version.minor))
    }
}

/// [`ProfileStore`] backed by the Kubernetes API server
#[derive(Clone)]
pub struct KubeStore {
    client: Client,
    watch_namespace: Option<String>,
}

/// Translate optimistic-concurrency and missing-object responses
fn map_api_error(err: kube::Error, what: &str) -> AppError {
    match err {
        kube::Error::Api(ae) if ae.code == 409 => {
            AppError::Conflict(format!("{}: {}", what, ae.message))
        }
        kube::Error::Api(ae) if ae.code == 404 => AppError::NotFound(what.to_string()),
        e => AppError::Kubernetes(e),
    }
}

impl KubeStore {
    pub fn new(k8s: &K8sClient, watch_namespace: Option<String>) -> Self {
        Self {
            client: k8s.client().clone(),
            watch_namespace,
        }
    }

    fn node_status_api(&self, namespace: Option<&str>) -> Api<SecurityProfileNodeStatus> {
        match namespace.or(self.watch_namespace.as_deref()) {
            Some(ns) => Api::namespaced(self.client.clone(), ns),
            None => Api::all(self.client.clone()),
        }
    }

    fn profile_api<K: SecurityProfile>(&self, namespace: Option<&str>) -> Api<K> {
        match namespace.or(self.watch_namespace.as_deref()) {
            Some(ns) => Api::namespaced(self.client.clone(), ns),
            None => Api::all(self.client.clone()),
        }
    }

    async fn list_profiles_of<K: SecurityProfile>(&self) -> Result<Vec<ProfileRef>> {
        let profiles = self
            .profile_api::<K>(None)
            .list(&ListParams::default())
            .await?;
        Ok(profiles.iter().map(|p| p.profile_ref()).collect())
    }

    async fn get_status_of<K: SecurityProfile>(
        &self,
        profile: &ProfileRef,
    ) -> Result<Option<VersionedStatus>> {
        let api = self.profile_api::<K>(Some(&profile.namespace));
        Ok(api.get_opt(&profile.name).await?.map(|obj| VersionedStatus {
            status: obj.profile_status().cloned().unwrap_or_default(),
            resource_version: obj.resource_version(),
        }))
    }

    async fn replace_status_of<K: SecurityProfile>(
        &self,
        profile: &ProfileRef,
        status: &VersionedStatus,
    ) -> Result<VersionedStatus> {
        let api = self.profile_api::<K>(Some(&profile.namespace));

        // A resourceVersion in the patch body makes the API server reject it
        // when the object moved since it was read.
        let mut patch = json!({ "status": status.status });
        if let Some(rv) = &status.resource_version {
            patch["metadata"] = json!({ "resourceVersion": rv });
        }

        let updated = api
            .patch_status(&profile.name, &PatchParams::default(), &Patch::Merge(&patch))
            .await
            .map_err(|e| map_api_error(e, &format!("profile {}", profile)))?;

        Ok(VersionedStatus {
            status: updated.profile_status().cloned().unwrap_or_default(),
            resource_version: updated.resource_version(),
        })
    }
}

#[async_trait]
impl ProfileStore for KubeStore {
    async fn list_node_statuses(
        &self,
        query: &NodeStatusQuery,
    ) -> Result<Vec<SecurityProfileNodeStatus>> {
        let api = self.node_status_api(query.namespace.as_deref());
        let selector = query.label_selector();
        let lp = if selector.is_empty() {
            ListParams::default()
        } else {
            ListParams::default().labels(&selector)
        };
        Ok(api.list(&lp).await?.items)
    }

    async fn get_node_status(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<SecurityProfileNodeStatus>> {
        Ok(self.node_status_api(Some(namespace)).get_opt(name).await?)
    }

    async fn create_node_status(
        &self,
        record: &SecurityProfileNodeStatus,
    ) -> Result<SecurityProfileNodeStatus> {
        let api = self.node_status_api(record.metadata.namespace.as_deref());
        api.create(&PostParams::default(), record)
            .await
            .map_err(|e| map_api_error(e, &format!("node status {}", record.name_any())))
    }

    async fn replace_node_status(
        &self,
        record: &SecurityProfileNodeStatus,
    ) -> Result<SecurityProfileNodeStatus> {
        let api = self.node_status_api(record.metadata.namespace.as_deref());
        let name = record.name_any();
        api.replace(&name, &PostParams::default(), record)
            .await
            .map_err(|e| map_api_error(e, &format!("node status {}", name)))
    }

    async fn delete_node_status(&self, namespace: &str, name: &str) -> Result<()> {
        let api = self.node_status_api(Some(namespace));
        match api.delete(name, &DeleteParams::default()).await {
            Ok(_) => Ok(()),
            Err(kube::Error::Api(ae)) if ae.code == 404 => Ok(()),
            Err(e) => Err(AppError::Kubernetes(e)),
        }
    }

    async fn list_profiles(&self, kind: ProfileKind) -> Result<Vec<ProfileRef>> {
        match kind {
            ProfileKind::SeccompProfile => self.list_profiles_of::<SeccompProfile>().await,
            ProfileKind::SelinuxProfile => self.list_profiles_of::<SelinuxProfile>().await,
        }
    }

    async fn get_profile_status(&self, profile: &ProfileRef) -> Result<Option<VersionedStatus>> {
        match profile.kind {
            ProfileKind::SeccompProfile => self.get_status_of::<SeccompProfile>(profile).await,
            ProfileKind::SelinuxProfile => self.get_status_of::<SelinuxProfile>(profile).await,
        }
    }

    async fn replace_profile_status(
        &self,
        profile: &ProfileRef,
        status: &VersionedStatus,
    ) -> Result<VersionedStatus> {
        match profile.kind {
            ProfileKind::SeccompProfile => {
                self.replace_status_of::<SeccompProfile>(profile, status).await
            }
            ProfileKind::SelinuxProfile => {
                self.replace_status_of::<SelinuxProfile>(profile, status).await
            }
        }
    }
}
