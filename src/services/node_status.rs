//! Node-side writer for node status records
//!
//! The only code that creates, transitions or deletes a record. Each writer is
//! bound to one node; it never touches another node's records and never
//! touches a profile's status.

use std::sync::Arc;

use super::store::ProfileStore;
use crate::error::{AppError, Result};
use crate::models::node_status::node_status_name;
use crate::models::{ProfileRef, ProfileState, SecurityProfileNodeStatus};

pub struct NodeStatusWriter {
    store: Arc<dyn ProfileStore>,
    node_name: String,
    max_conflict_retries: u32,
}

impl NodeStatusWriter {
    pub fn new(
        store: Arc<dyn ProfileStore>,
        node_name: impl Into<String>,
        max_conflict_retries: u32,
    ) -> Self {
        Self {
            store,
            node_name: node_name.into(),
            max_conflict_retries,
        }
    }

    pub fn node_name(&self) -> &str {
        &self.node_name
    }

    /// This node's record for `profile`, if any
    pub async fn get(&self, profile: &ProfileRef) -> Result<Option<SecurityProfileNodeStatus>> {
        self.store
            .get_node_status(&profile.namespace, &node_status_name(profile, &self.node_name))
            .await
    }

    /// Get this node's record, creating it in `Pending` when missing
    pub async fn ensure(&self, profile: &ProfileRef) -> Result<SecurityProfileNodeStatus> {
        if let Some(existing) = self.get(profile).await? {
            return Ok(existing);
        }

        let record = SecurityProfileNodeStatus::new(profile, &self.node_name);
        match self.store.create_node_status(&record).await {
            Ok(created) => {
                tracing::info!(
                    profile = %profile,
                    node = %self.node_name,
                    "Created node status record"
                );
                Ok(created)
            }
            // Lost a creation race with ourselves (e.g. a restarted agent)
            Err(e) if e.is_conflict() => self.get(profile).await?.ok_or_else(|| {
                AppError::Internal(format!(
                    "node status for {} vanished after create conflict",
                    profile
                ))
            }),
            Err(e) => Err(e),
        }
    }

    /// Move this node's record to `next`, creating it first if needed.
    ///
    /// Invalid lifecycle moves are rejected without writing.
    pub async fn transition(
        &self,
        profile: &ProfileRef,
        next: ProfileState,
    ) -> Result<SecurityProfileNodeStatus> {
        let mut attempt = 0;
        loop {
            let mut record = self.ensure(profile).await?;
            let from = record.status;
            if from == next && record.labels_in_sync() {
                return Ok(record);
            }
            record.set_state(next)?;

            match self.store.replace_node_status(&record).await {
                Ok(updated) => {
                    tracing::info!(
                        profile = %profile,
                        node = %self.node_name,
                        from = %from,
                        to = %next,
                        "Node status transitioned"
                    );
                    return Ok(updated);
                }
                Err(e) if e.is_conflict() && attempt < self.max_conflict_retries => {
                    attempt += 1;
                    tracing::debug!(attempt, "Node status write conflicted, retrying");
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Delete this node's record. A missing record is not an error.
    pub async fn remove(&self, profile: &ProfileRef) -> Result<()> {
        self.store
            .delete_node_status(&profile.namespace, &node_status_name(profile, &self.node_name))
            .await?;
        tracing::info!(
            profile = %profile,
            node = %self.node_name,
            "Removed node status record"
        );
        Ok(())
    }
}
