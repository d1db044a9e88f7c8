//! Shared fixtures for integration tests.
//!
//! Records are seeded through `NodeStatusWriter`, so every seeded record has
//! walked a legal lifecycle path and carries in-sync labels.

#![allow(dead_code)]

use std::sync::Arc;

use spo_status::config::Config;
use spo_status::models::{ProfileKind, ProfileRef, ProfileState, ProfileStatus};
use spo_status::services::{InMemoryStore, NodeStatusWriter, ProfileStore, StatusAggregator};
use spo_status::state::AppState;

pub fn seccomp(namespace: &str, name: &str) -> ProfileRef {
    ProfileRef::new(ProfileKind::SeccompProfile, namespace, name)
}

pub fn selinux(namespace: &str, name: &str) -> ProfileRef {
    ProfileRef::new(ProfileKind::SelinuxProfile, namespace, name)
}

pub fn nginx() -> ProfileRef {
    seccomp("web", "nginx")
}

/// Shortest legal path from a fresh `Pending` record to `state`
pub fn lifecycle_path(state: ProfileState) -> Vec<ProfileState> {
    match state {
        ProfileState::Pending => vec![],
        ProfileState::InProgress => vec![ProfileState::InProgress],
        ProfileState::Installed => vec![ProfileState::InProgress, ProfileState::Installed],
        ProfileState::Terminating => vec![ProfileState::Terminating],
        ProfileState::Error => vec![ProfileState::Error],
    }
}

pub fn writer(store: &Arc<InMemoryStore>, node: &str) -> NodeStatusWriter {
    NodeStatusWriter::new(store.clone(), node, 3)
}

/// Make `node`'s record for `profile` reach `state`
pub async fn seed_record(
    store: &Arc<InMemoryStore>,
    profile: &ProfileRef,
    node: &str,
    state: ProfileState,
) {
    let writer = writer(store, node);
    writer.ensure(profile).await.expect("create record");
    for step in lifecycle_path(state) {
        writer
            .transition(profile, step)
            .await
            .expect("legal transition");
    }
}

/// A store holding `profile` with one record per entry of `states`
pub async fn store_with_records(
    profile: &ProfileRef,
    states: &[ProfileState],
) -> Arc<InMemoryStore> {
    let store = Arc::new(InMemoryStore::new());
    store.add_profile(profile);
    for (i, state) in states.iter().enumerate() {
        seed_record(&store, profile, &format!("worker-{}", i), *state).await;
    }
    store
}

pub fn aggregator(store: &Arc<InMemoryStore>, max_conflict_retries: u32) -> StatusAggregator {
    let store: Arc<dyn ProfileStore> = store.clone();
    StatusAggregator::new(store, max_conflict_retries)
}

pub fn status_with(state: Option<ProfileState>) -> ProfileStatus {
    ProfileStatus {
        status: state,
        ..Default::default()
    }
}

pub fn test_config() -> Config {
    let mut config = Config::from_env();
    config.reconcile.max_conflict_retries = 3;
    config
}

pub fn build_app_state(store: Arc<InMemoryStore>) -> AppState {
    AppState::new(Arc::new(test_config()), store)
}
