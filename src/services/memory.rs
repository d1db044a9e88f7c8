//! In-memory [`ProfileStore`]
//!
//! Mirrors the API server's optimistic concurrency: every write bumps a
//! store-wide resource version, and writes based on an older version fail
//! with [`AppError::Conflict`].

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use parking_lot::RwLock;

use super::store::{NodeStatusQuery, ProfileStore, VersionedStatus};
use crate::error::{AppError, Result};
use crate::models::{ProfileKind, ProfileRef, ProfileStatus, SecurityProfileNodeStatus};

#[derive(Debug, Clone)]
struct StoredProfile {
    status: ProfileStatus,
    resource_version: u64,
}

#[derive(Debug, Default)]
struct Inner {
    records: BTreeMap<(String, String), SecurityProfileNodeStatus>,
    profiles: HashMap<ProfileRef, StoredProfile>,
    last_version: u64,
    pending_status_conflicts: u32,
    pending_record_conflicts: u32,
    status_writes: u64,
    unavailable: bool,
}

impl Inner {
    fn next_version(&mut self) -> u64 {
        self.last_version += 1;
        self.last_version
    }

    fn check_available(&self) -> Result<()> {
        if self.unavailable {
            return Err(AppError::ServiceUnavailable(
                "resource store unavailable".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct InMemoryStore {
    inner: RwLock<Inner>,
}

fn record_key(record: &SecurityProfileNodeStatus) -> Result<(String, String)> {
    let namespace = record.metadata.namespace.clone().unwrap_or_default();
    let name = record
        .metadata
        .name
        .clone()
        .ok_or_else(|| AppError::BadRequest("node status record has no name".to_string()))?;
    Ok((namespace, name))
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a profile with an empty status
    pub fn add_profile(&self, profile: &ProfileRef) {
        self.add_profile_with_status(profile, ProfileStatus::default());
    }

    pub fn add_profile_with_status(&self, profile: &ProfileRef, status: ProfileStatus) {
        let mut inner = self.inner.write();
        let resource_version = inner.next_version();
        inner.profiles.insert(
            profile.clone(),
            StoredProfile {
                status,
                resource_version,
            },
        );
    }

    pub fn remove_profile(&self, profile: &ProfileRef) {
        self.inner.write().profiles.remove(profile);
    }

    /// Current status of a profile, bypassing versioning
    pub fn profile_status(&self, profile: &ProfileRef) -> Option<ProfileStatus> {
        self.inner
            .read()
            .profiles
            .get(profile)
            .map(|p| p.status.clone())
    }

    /// Number of successful profile status writes so far
    pub fn status_writes(&self) -> u64 {
        self.inner.read().status_writes
    }

    /// Make the next `count` status writes fail as if another writer got in
    /// first. Each injected conflict also moves the profile's version.
    pub fn inject_status_conflicts(&self, count: u32) {
        self.inner.write().pending_status_conflicts = count;
    }

    /// Same as [`Self::inject_status_conflicts`] for node status record
    /// replaces; the record's version moves with each one.
    pub fn inject_record_conflicts(&self, count: u32) {
        self.inner.write().pending_record_conflicts = count;
    }

    /// Simulate the store being unreachable
    pub fn set_unavailable(&self, unavailable: bool) {
        self.inner.write().unavailable = unavailable;
    }
}

#[async_trait]
impl ProfileStore for InMemoryStore {
    async fn list_node_statuses(
        &self,
        query: &NodeStatusQuery,
    ) -> Result<Vec<SecurityProfileNodeStatus>> {
        let inner = self.inner.read();
        inner.check_available()?;
        Ok(inner
            .records
            .values()
            .filter(|r| query.matches(r))
            .cloned()
            .collect())
    }

    async fn get_node_status(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<SecurityProfileNodeStatus>> {
        let inner = self.inner.read();
        inner.check_available()?;
        Ok(inner
            .records
            .get(&(namespace.to_string(), name.to_string()))
            .cloned())
    }

    async fn create_node_status(
        &self,
        record: &SecurityProfileNodeStatus,
    ) -> Result<SecurityProfileNodeStatus> {
        let key = record_key(record)?;
        let mut inner = self.inner.write();
        inner.check_available()?;
        if inner.records.contains_key(&key) {
            return Err(AppError::Conflict(format!(
                "node status {}/{} already exists",
                key.0, key.1
            )));
        }
        let mut stored = record.clone();
        stored.metadata.resource_version = Some(inner.next_version().to_string());
        inner.records.insert(key, stored.clone());
        Ok(stored)
    }

    async fn replace_node_status(
        &self,
        record: &SecurityProfileNodeStatus,
    ) -> Result<SecurityProfileNodeStatus> {
        let key = record_key(record)?;
        let mut inner = self.inner.write();
        inner.check_available()?;
        let current = inner
            .records
            .get(&key)
            .ok_or_else(|| AppError::NotFound(format!("node status {}/{}", key.0, key.1)))?
            .clone();
        if inner.pending_record_conflicts > 0 {
            inner.pending_record_conflicts -= 1;
            let mut moved = current;
            moved.metadata.resource_version = Some(inner.next_version().to_string());
            inner.records.insert(key.clone(), moved);
            return Err(AppError::Conflict(format!(
                "node status {}/{} was modified",
                key.0, key.1
            )));
        }
        if record.metadata.resource_version.is_some()
            && record.metadata.resource_version != current.metadata.resource_version
        {
            return Err(AppError::Conflict(format!(
                "node status {}/{} was modified",
                key.0, key.1
            )));
        }
        let mut stored = record.clone();
        stored.metadata.resource_version = Some(inner.next_version().to_string());
        inner.records.insert(key, stored.clone());
        Ok(stored)
    }

    async fn delete_node_status(&self, namespace: &str, name: &str) -> Result<()> {
        let mut inner = self.inner.write();
        inner.check_available()?;
        inner
            .records
            .remove(&(namespace.to_string(), name.to_string()));
        Ok(())
    }

    async fn list_profiles(&self, kind: ProfileKind) -> Result<Vec<ProfileRef>> {
        let inner = self.inner.read();
        inner.check_available()?;
        let mut profiles: Vec<ProfileRef> = inner
            .profiles
            .keys()
            .filter(|p| p.kind == kind)
            .cloned()
            .collect();
        profiles.sort_by(|a, b| (&a.namespace, &a.name).cmp(&(&b.namespace, &b.name)));
        Ok(profiles)
    }

    async fn get_profile_status(&self, profile: &ProfileRef) -> Result<Option<VersionedStatus>> {
        let inner = self.inner.read();
        inner.check_available()?;
        Ok(inner.profiles.get(profile).map(|p| VersionedStatus {
            status: p.status.clone(),
            resource_version: Some(p.resource_version.to_string()),
        }))
    }

    async fn replace_profile_status(
        &self,
        profile: &ProfileRef,
        status: &VersionedStatus,
    ) -> Result<VersionedStatus> {
        let mut inner = self.inner.write();
        inner.check_available()?;
        if !inner.profiles.contains_key(profile) {
            return Err(AppError::NotFound(format!("profile {}", profile)));
        }

        if inner.pending_status_conflicts > 0 {
            inner.pending_status_conflicts -= 1;
            let version = inner.next_version();
            if let Some(stored) = inner.profiles.get_mut(profile) {
                stored.resource_version = version;
            }
            return Err(AppError::Conflict(format!("profile {} was modified", profile)));
        }

        let version = inner.next_version();
        let stored = inner
            .profiles
            .get_mut(profile)
            .ok_or_else(|| AppError::NotFound(format!("profile {}", profile)))?;
        if let Some(expected) = &status.resource_version {
            if *expected != stored.resource_version.to_string() {
                return Err(AppError::Conflict(format!("profile {} was modified", profile)));
            }
        }
        stored.status = status.status.clone();
        stored.resource_version = version;
        inner.status_writes += 1;

        Ok(VersionedStatus {
            status: status.status.clone(),
            resource_version: Some(version.to_string()),
        })
    }
}
