//! Periodic task scheduler
//!
//! A simple scheduler for running background tasks at regular intervals.
//! Add new tasks by implementing the `PeriodicTask` trait.

use async_trait::async_trait;
use futures_util::stream::{self, StreamExt};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::interval;

use super::aggregator::{ReconcileOutcome, StatusAggregator};
use crate::models::{ProfileKind, ProfileRef};

/// Trait for periodic background tasks
#[async_trait]
pub trait PeriodicTask: Send + Sync {
    /// Task name for logging
    fn name(&self) -> &'static str;

    /// How often to run (e.g., every 5 minutes)
    fn interval(&self) -> Duration;

    /// Execute the task
    async fn run(&self) -> anyhow::Result<()>;
}

/// Start all periodic tasks
pub fn start_scheduler(tasks: Vec<Box<dyn PeriodicTask>>) {
    for task in tasks {
        tokio::spawn(async move {
            run_task(task).await;
        });
    }

    tracing::info!("Periodic task scheduler started");
}

/// Run a single task on its interval
async fn run_task(task: Box<dyn PeriodicTask>) {
    let mut ticker = interval(task.interval());

    // Skip the first immediate tick
    ticker.tick().await;

    loop {
        ticker.tick().await;

        tracing::debug!(task = task.name(), "Running periodic task");

        match task.run().await {
            Ok(()) => {
                tracing::debug!(task = task.name(), "Periodic task completed");
            }
            Err(e) => {
                tracing::error!(task = task.name(), error = %e, "Periodic task failed");
            }
        }
    }
}

// ============================================================================
// Full Resync Task
// ============================================================================

/// Tally of one full resync
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ResyncSummary {
    pub profiles: usize,
    pub updated: usize,
    pub unchanged: usize,
    pub no_records: usize,
    pub gone: usize,
    pub failed: usize,
}

impl ResyncSummary {
    fn record(&mut self, result: &crate::error::Result<ReconcileOutcome>) {
        self.profiles += 1;
        match result {
            Ok(ReconcileOutcome::Updated { .. }) => self.updated += 1,
            Ok(ReconcileOutcome::Unchanged { .. }) => self.unchanged += 1,
            Ok(ReconcileOutcome::NoRecords) => self.no_records += 1,
            Ok(ReconcileOutcome::ProfileGone) => self.gone += 1,
            Err(_) => self.failed += 1,
        }
    }
}

/// Reconcile every profile of every kind, at most `concurrency` at a time.
///
/// Failures of individual profiles are logged and counted; only failing to
/// list the profiles of a kind aborts the resync.
pub async fn resync_all(
    aggregator: &StatusAggregator,
    concurrency: usize,
) -> crate::error::Result<ResyncSummary> {
    let mut profiles: Vec<ProfileRef> = Vec::new();
    for kind in ProfileKind::ALL {
        profiles.extend(aggregator.store().list_profiles(kind).await?);
    }

    let results: Vec<_> = stream::iter(profiles)
        .map(|profile| async move {
            let result = aggregator.reconcile(&profile).await;
            if let Err(e) = &result {
                tracing::warn!(profile = %profile, error = %e, "Resync of profile failed");
            }
            result
        })
        .buffer_unordered(concurrency.max(1))
        .collect()
        .await;

    let mut summary = ResyncSummary::default();
    for result in &results {
        summary.record(result);
    }
    Ok(summary)
}

/// Periodically re-folds every profile, covering missed watch events
pub struct ResyncTask {
    pub aggregator: Arc<StatusAggregator>,
    pub every: Duration,
    pub concurrency: usize,
}

#[async_trait]
impl PeriodicTask for ResyncTask {
    fn name(&self) -> &'static str {
        "profile_status_resync"
    }

    fn interval(&self) -> Duration {
        self.every
    }

    async fn run(&self) -> anyhow::Result<()> {
        let summary = resync_all(&self.aggregator, self.concurrency).await?;

        if summary.updated > 0 || summary.failed > 0 {
            tracing::info!(
                profiles = summary.profiles,
                updated = summary.updated,
                failed = summary.failed,
                "Resynced profile statuses"
            );
        }

        Ok(())
    }
}
