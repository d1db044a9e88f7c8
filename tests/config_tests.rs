//! Configuration tests
//!
//! Environment variables are process-global, so these tests stick to the
//! pieces that take their inputs explicitly.

use std::io::Write;
use std::path::Path;
use std::time::Duration;

use spo_status::config::kubernetes::{resolve_operator_namespace, OPERATOR_NAME};
use spo_status::config::reconcile::ReconcileConfig;

#[test]
fn test_reconcile_defaults() {
    let config = ReconcileConfig::default();

    assert_eq!(config.max_conflict_retries, 5);
    assert_eq!(config.resync_interval, Duration::from_secs(300));
    assert_eq!(config.resync_concurrency, 8);
    assert_eq!(config.error_requeue, Duration::from_secs(15));
}

#[test]
fn test_explicit_operator_namespace_wins() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "from-service-account").unwrap();

    let ns = resolve_operator_namespace(Some("spo-system".to_string()), file.path());

    assert_eq!(ns, "spo-system");
}

#[test]
fn test_operator_namespace_from_service_account() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "  security-system  ").unwrap();

    let ns = resolve_operator_namespace(None, file.path());

    assert_eq!(ns, "security-system");
}

#[test]
fn test_blank_explicit_namespace_is_ignored() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "security-system").unwrap();

    let ns = resolve_operator_namespace(Some("   ".to_string()), file.path());

    assert_eq!(ns, "security-system");
}

#[test]
fn test_operator_namespace_falls_back_to_default() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("namespace");

    assert_eq!(resolve_operator_namespace(None, &missing), OPERATOR_NAME);
}

#[test]
fn test_empty_service_account_file_falls_back() {
    let file = tempfile::NamedTempFile::new().unwrap();

    assert_eq!(
        resolve_operator_namespace(None, file.path()),
        "security-profiles-operator"
    );
}

#[test]
fn test_unreadable_path_falls_back() {
    assert_eq!(
        resolve_operator_namespace(None, Path::new("/nonexistent/namespace")),
        OPERATOR_NAME
    );
}
