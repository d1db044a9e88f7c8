//! Watch-driven reconciliation
//!
//! One controller per profile kind. A profile is reconciled when it changes
//! and whenever one of its node status records is created, updated or
//! deleted. Successful passes wait for the next change; the periodic resync
//! in the scheduler covers missed events.

use std::sync::Arc;
use std::time::Duration;

use futures_util::StreamExt;
use kube::{
    api::Api,
    runtime::{controller::Action, reflector::ObjectRef, watcher, Controller},
    Client,
};

use super::aggregator::StatusAggregator;
use super::store::NodeStatusQuery;
use crate::error::AppError;
use crate::models::{SecurityProfile, SecurityProfileNodeStatus};

pub struct ControllerContext {
    pub aggregator: Arc<StatusAggregator>,
    pub error_requeue: Duration,
}

async fn reconcile<K: SecurityProfile>(
    profile: Arc<K>,
    ctx: Arc<ControllerContext>,
) -> Result<Action, AppError> {
    ctx.aggregator.reconcile(&profile.profile_ref()).await?;
    Ok(Action::await_change())
}

fn error_policy<K: SecurityProfile>(
    profile: Arc<K>,
    err: &AppError,
    ctx: Arc<ControllerContext>,
) -> Action {
    tracing::warn!(
        profile = %profile.profile_ref(),
        error = %err,
        "Reconcile failed, requeueing"
    );
    Action::requeue(ctx.error_requeue)
}

/// The profile a node status record belongs to, if it is of kind `K`
pub fn owning_profile<K: SecurityProfile>(
    record: &SecurityProfileNodeStatus,
) -> Option<ObjectRef<K>> {
    if record.profile_kind != K::KIND {
        return None;
    }
    let namespace = record.metadata.namespace.as_deref()?;
    Some(ObjectRef::new(&record.profile_name).within(namespace))
}

/// Run the controller for profile kind `K` until a shutdown signal arrives
pub async fn run_controller<K: SecurityProfile>(
    client: Client,
    watch_namespace: Option<String>,
    ctx: Arc<ControllerContext>,
) {
    let (profiles, records): (Api<K>, Api<SecurityProfileNodeStatus>) = match &watch_namespace {
        Some(ns) => (
            Api::namespaced(client.clone(), ns),
            Api::namespaced(client, ns),
        ),
        None => (Api::all(client.clone()), Api::all(client)),
    };

    let selector = NodeStatusQuery::all().of_kind(K::KIND).label_selector();
    let records_of_kind = watcher::Config::default().labels(&selector);

    tracing::info!(
        kind = %K::KIND,
        namespace = ?watch_namespace,
        "Starting profile status controller"
    );

    Controller::new(profiles, watcher::Config::default())
        .watches(records, records_of_kind, |record| owning_profile::<K>(&record))
        .shutdown_on_signal()
        .run(reconcile::<K>, error_policy::<K>, ctx)
        .for_each(|res| async move {
            match res {
                Ok((profile, _)) => {
                    tracing::debug!(profile = %profile.name, "Reconciled");
                }
                Err(e) => {
                    tracing::debug!(error = %e, "Controller event failed");
                }
            }
        })
        .await;

    tracing::info!(kind = %K::KIND, "Profile status controller stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        ProfileKind, ProfileRef, ProfileState, SeccompProfile, SeccompProfileSpec,
        SecurityProfileNodeStatus, SelinuxProfile,
    };
    use crate::services::memory::InMemoryStore;
    use crate::services::store::ProfileStore;

    #[tokio::test]
    async fn test_successful_reconcile_waits_for_next_change() {
        let profile_ref = ProfileRef::new(ProfileKind::SeccompProfile, "web", "nginx");
        let store = Arc::new(InMemoryStore::new());
        store.add_profile(&profile_ref);
        let mut record = SecurityProfileNodeStatus::new(&profile_ref, "worker-1");
        record.set_state(ProfileState::InProgress).unwrap();
        store.create_node_status(&record).await.unwrap();

        let ctx = Arc::new(ControllerContext {
            aggregator: Arc::new(StatusAggregator::new(store.clone(), 3)),
            error_requeue: Duration::from_secs(15),
        });
        let mut profile = SeccompProfile::new("nginx", SeccompProfileSpec::default());
        profile.metadata.namespace = Some("web".to_string());

        let action = reconcile(Arc::new(profile), ctx).await.unwrap();

        assert_eq!(action, Action::await_change());
        assert_eq!(
            store.profile_status(&profile_ref).unwrap().status,
            Some(ProfileState::InProgress)
        );
    }

    #[test]
    fn test_owning_profile_maps_same_kind() {
        let profile = ProfileRef::new(ProfileKind::SeccompProfile, "web", "nginx");
        let record = SecurityProfileNodeStatus::new(&profile, "worker-1");

        let owner = owning_profile::<SeccompProfile>(&record).unwrap();
        assert_eq!(owner.name, "nginx");
        assert_eq!(owner.namespace.as_deref(), Some("web"));
    }

    #[test]
    fn test_owning_profile_ignores_other_kind() {
        let profile = ProfileRef::new(ProfileKind::SeccompProfile, "web", "nginx");
        let record = SecurityProfileNodeStatus::new(&profile, "worker-1");

        assert!(owning_profile::<SelinuxProfile>(&record).is_none());
    }

    #[test]
    fn test_owning_profile_requires_namespace() {
        let profile = ProfileRef::new(ProfileKind::SelinuxProfile, "web", "nginx");
        let mut record = SecurityProfileNodeStatus::new(&profile, "worker-1");
        record.metadata.namespace = None;

        assert!(owning_profile::<SelinuxProfile>(&record).is_none());
    }
}
