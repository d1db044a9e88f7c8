//! Cluster-wide status aggregation
//!
//! A reconcile pass lists every node record of a profile, folds their states
//! into the lowest common state and writes that onto the profile's status.
//! Nothing is cached between passes; a restart costs one list-and-fold.
//!
//! The list and the write are not atomic. A node agent may change a record
//! in between, in which case its change triggers another pass. Concurrent
//! writers to the same status are detected through resource versions and the
//! whole pass is retried.

use std::sync::Arc;

use serde::Serialize;

use super::store::{NodeStatusQuery, ProfileStore, VersionedStatus};
use crate::error::{AppError, Result};
use crate::models::condition::{get_condition, set_condition, SYNCED};
use crate::models::{fold_states, Condition, ConditionStatus, ProfileRef, ProfileState};

/// What a reconcile pass did
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "camelCase")]
pub enum ReconcileOutcome {
    /// No node has reported yet; the existing status was left alone
    NoRecords,
    /// The profile was deleted before its status could be written
    ProfileGone,
    Unchanged {
        state: ProfileState,
        records: usize,
    },
    Updated {
        from: Option<ProfileState>,
        to: ProfileState,
        records: usize,
    },
}

pub struct StatusAggregator {
    store: Arc<dyn ProfileStore>,
    max_conflict_retries: u32,
}

impl StatusAggregator {
    pub fn new(store: Arc<dyn ProfileStore>, max_conflict_retries: u32) -> Self {
        Self {
            store,
            max_conflict_retries,
        }
    }

    pub fn store(&self) -> &Arc<dyn ProfileStore> {
        &self.store
    }

    /// Aggregate state of a profile as the records say right now, without
    /// writing anything
    pub async fn compute(&self, profile: &ProfileRef) -> Result<Option<ProfileState>> {
        let records = self
            .store
            .list_node_statuses(&NodeStatusQuery::for_profile(profile))
            .await?;
        Ok(fold_states(records.iter().map(|r| r.status)))
    }

    /// Bring the profile's status in line with its node records
    #[tracing::instrument(skip(self, profile), fields(profile = %profile))]
    pub async fn reconcile(&self, profile: &ProfileRef) -> Result<ReconcileOutcome> {
        let mut attempt = 0;
        loop {
            match self.reconcile_once(profile).await {
                Err(e) if e.is_conflict() => {
                    attempt += 1;
                    if attempt > self.max_conflict_retries {
                        tracing::warn!(
                            attempts = attempt,
                            "Giving up on status write after repeated conflicts"
                        );
                        let err = AppError::ConflictRetriesExhausted {
                            profile: profile.to_string(),
                            attempts: attempt,
                        };
                        self.report_reconcile_error(profile, &err).await;
                        return Err(err);
                    }
                    tracing::debug!(attempt, "Status write conflicted, re-listing records");
                }
                other => return other,
            }
        }
    }

    async fn reconcile_once(&self, profile: &ProfileRef) -> Result<ReconcileOutcome> {
        let records = self
            .store
            .list_node_statuses(&NodeStatusQuery::for_profile(profile))
            .await?;

        let Some(aggregate) = fold_states(records.iter().map(|r| r.status)) else {
            tracing::debug!("No node status records yet, leaving status untouched");
            return Ok(ReconcileOutcome::NoRecords);
        };

        let Some(current) = self.store.get_profile_status(profile).await? else {
            tracing::debug!("Profile no longer exists");
            return Ok(ReconcileOutcome::ProfileGone);
        };

        let previous = current.status.status;
        let mut next = current.clone();
        next.status.status = Some(aggregate);

        // Only clear a failure marker; never add a success marker on its own.
        let had_error = get_condition(&current.status.conditions, SYNCED)
            .is_some_and(|c| c.status == ConditionStatus::False);
        if previous != Some(aggregate) || had_error {
            set_condition(&mut next.status.conditions, Condition::reconcile_success());
        }

        if next.status == current.status {
            return Ok(ReconcileOutcome::Unchanged {
                state: aggregate,
                records: records.len(),
            });
        }

        match self.store.replace_profile_status(profile, &next).await {
            Ok(_) => {}
            Err(AppError::NotFound(_)) => {
                tracing::debug!("Profile deleted before its status was written");
                return Ok(ReconcileOutcome::ProfileGone);
            }
            Err(e) => return Err(e),
        }

        if previous == Some(aggregate) {
            tracing::info!(state = %aggregate, "Cleared reconcile error");
            return Ok(ReconcileOutcome::Unchanged {
                state: aggregate,
                records: records.len(),
            });
        }

        tracing::info!(
            from = ?previous,
            to = %aggregate,
            records = records.len(),
            "Updated profile status"
        );
        Ok(ReconcileOutcome::Updated {
            from: previous,
            to: aggregate,
            records: records.len(),
        })
    }

    /// Best-effort `Synced=False` condition. The aggregate state is left as is.
    async fn report_reconcile_error(&self, profile: &ProfileRef, err: &AppError) {
        let result = async {
            let Some(current) = self.store.get_profile_status(profile).await? else {
                return Ok(());
            };
            let mut next: VersionedStatus = current;
            if set_condition(
                &mut next.status.conditions,
                Condition::reconcile_error(err.to_string()),
            ) {
                self.store.replace_profile_status(profile, &next).await?;
            }
            Ok::<_, AppError>(())
        }
        .await;

        if let Err(e) = result {
            tracing::warn!(error = %e, "Failed to record reconcile error condition");
        }
    }
}
