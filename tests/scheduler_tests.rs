//! Full resync tests
//!
//! Covers `resync_all` over every profile kind and the periodic task wrapper.

use std::sync::Arc;
use std::time::Duration;

use spo_status::error::AppError;
use spo_status::models::ProfileState::*;
use spo_status::services::scheduler::{resync_all, PeriodicTask, ResyncSummary, ResyncTask};

mod common;
use common::{aggregator, nginx, seccomp, seed_record, selinux, store_with_records};

#[tokio::test]
async fn test_resync_covers_every_kind() {
    let store = store_with_records(&nginx(), &[Installed, Installed]).await;
    let policy = selinux("web", "nginx");
    store.add_profile(&policy);
    seed_record(&store, &policy, "worker-0", InProgress).await;

    let summary = resync_all(&aggregator(&store, 3), 4).await.unwrap();

    assert_eq!(summary.profiles, 2);
    assert_eq!(summary.updated, 2);
    assert_eq!(
        store.profile_status(&nginx()).unwrap().status,
        Some(Installed)
    );
    assert_eq!(store.profile_status(&policy).unwrap().status, Some(InProgress));
}

#[tokio::test]
async fn test_resync_summary_counts_outcomes() {
    let store = store_with_records(&nginx(), &[Installed]).await;
    // no records yet
    store.add_profile(&seccomp("web", "redis"));
    let aggregator = aggregator(&store, 3);

    let first = resync_all(&aggregator, 2).await.unwrap();
    assert_eq!(
        first,
        ResyncSummary {
            profiles: 2,
            updated: 1,
            no_records: 1,
            ..Default::default()
        }
    );

    let second = resync_all(&aggregator, 2).await.unwrap();
    assert_eq!(
        second,
        ResyncSummary {
            profiles: 2,
            unchanged: 1,
            no_records: 1,
            ..Default::default()
        }
    );
}

#[tokio::test]
async fn test_resync_counts_failed_profiles() {
    let store = store_with_records(&nginx(), &[Installed]).await;
    store.inject_status_conflicts(10);

    let summary = resync_all(&aggregator(&store, 1), 1).await.unwrap();

    assert_eq!(summary.profiles, 1);
    assert_eq!(summary.failed, 1);
}

#[tokio::test]
async fn test_resync_fails_when_profiles_cannot_be_listed() {
    let store = store_with_records(&nginx(), &[Installed]).await;
    store.set_unavailable(true);

    let err = resync_all(&aggregator(&store, 3), 2).await.unwrap_err();

    assert!(matches!(err, AppError::ServiceUnavailable(_)));
}

#[tokio::test]
async fn test_resync_with_zero_concurrency_still_runs() {
    let store = store_with_records(&nginx(), &[Pending]).await;

    let summary = resync_all(&aggregator(&store, 3), 0).await.unwrap();

    assert_eq!(summary.updated, 1);
}

#[tokio::test]
async fn test_resync_task_runs_a_pass() {
    let store = store_with_records(&nginx(), &[Terminating]).await;
    let task = ResyncTask {
        aggregator: Arc::new(aggregator(&store, 3)),
        every: Duration::from_secs(60),
        concurrency: 2,
    };

    assert_eq!(task.name(), "profile_status_resync");
    assert_eq!(task.interval(), Duration::from_secs(60));
    task.run().await.unwrap();

    assert_eq!(
        store.profile_status(&nginx()).unwrap().status,
        Some(Terminating)
    );
}
