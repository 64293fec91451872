//! Teardown sequencing properties, asserted against the in-memory provider.
//!
//! Time is paused so the 30s networking backoff and the 10s verification
//! interval are observed exactly without slowing the suite down.

use std::time::Duration;

use matomo_ops_core::fakes::{MemoryStackProvider, ProviderCall, ScriptedConfirm};
use matomo_ops_core::{
    CheckLevel, DestroyPath, LingeringResources, LocalArtifacts, StackStatus, TeardownConfig,
    TeardownError, TeardownSequencer,
};
use tempfile::TempDir;
use tokio::time::Instant;

/// A project checkout with all three local artifacts present.
fn project_dir() -> TempDir {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("matomo-key.pem"), "-----BEGIN KEY-----").unwrap();
    std::fs::create_dir_all(dir.path().join(".venv/lib")).unwrap();
    std::fs::create_dir_all(dir.path().join("cdk.out")).unwrap();
    std::fs::write(dir.path().join("cdk.out/manifest.json"), "{}").unwrap();
    dir
}

fn forced(project: &str, dir: &TempDir) -> TeardownConfig {
    TeardownConfig::new(project, dir.path()).with_force(true)
}

fn assert_artifacts_removed(dir: &TempDir) {
    assert!(!dir.path().join("matomo-key.pem").exists());
    assert!(!dir.path().join(".venv").exists());
    assert!(!dir.path().join("cdk.out").exists());
}

#[tokio::test(start_paused = true)]
async fn demo_bulk_destroy_succeeds() {
    let dir = project_dir();
    let provider = MemoryStackProvider::new().with_project("demo", true);
    let confirm = ScriptedConfirm::new("DELETE\n");
    let config = TeardownConfig::new("demo", dir.path());

    let report = TeardownSequencer::new(&provider, &confirm, config)
        .run()
        .await
        .unwrap();

    assert_eq!(report.path, DestroyPath::Bulk);
    assert_eq!(
        provider.destroy_all_calls(),
        vec![vec![
            "demo-networking".to_string(),
            "demo-database".to_string(),
            "demo-compute".to_string(),
        ]]
    );
    assert!(provider.destroy_calls().is_empty());
    assert!(provider.existing_stacks().is_empty());
    assert!(report.remaining.is_empty());
    assert_eq!(report.exit_code(), 0);
    assert_eq!(report.summary().failed, 0);
    assert_artifacts_removed(&dir);

    let prompts = confirm.prompts();
    assert_eq!(prompts.len(), 1);
    assert_eq!(prompts[0].0, "demo");
    assert_eq!(prompts[0].1.len(), 3);
}

#[tokio::test(start_paused = true)]
async fn demo_networking_exhausted_reports_diagnostics() {
    let dir = project_dir();
    let provider = MemoryStackProvider::new()
        .with_project("demo", true)
        .fail_bulk_destroy()
        .fail_destroy_always("demo-networking")
        .with_lingering(
            "demo-networking",
            LingeringResources {
                vpc_id: Some("vpc-0abc".to_string()),
                instance_ids: vec!["i-0123".to_string()],
                network_interface_ids: vec!["eni-0456".to_string(), "eni-0789".to_string()],
            },
        );
    let confirm = ScriptedConfirm::new("");

    let report = TeardownSequencer::new(&provider, &confirm, forced("demo", &dir))
        .run()
        .await
        .unwrap();

    assert_eq!(report.path, DestroyPath::PerStack);
    assert!(report.bulk_error.is_some());
    assert_eq!(report.remaining, vec!["demo-networking".to_string()]);
    assert_eq!(report.exit_code(), 1);

    let diagnostics = report.diagnostics.as_ref().expect("lingering probe ran");
    assert_eq!(
        diagnostics.ids().collect::<Vec<_>>(),
        vec!["i-0123", "eni-0456", "eni-0789"]
    );
    let fail_lines: Vec<&str> = report
        .lines
        .iter()
        .filter(|l| l.level == CheckLevel::Fail)
        .map(|l| l.message.as_str())
        .collect();
    assert!(fail_lines.iter().any(|m| m.contains("i-0123")));
    assert!(fail_lines.iter().any(|m| m.contains("eni-0789")));

    let networking = report
        .attempts
        .iter()
        .find(|a| a.stack == "demo-networking")
        .unwrap();
    assert_eq!(networking.attempts, 3);
    assert!(!networking.succeeded);
}

#[tokio::test(start_paused = true)]
async fn forced_run_with_nothing_deployed_is_a_no_op() {
    let dir = project_dir();
    let provider = MemoryStackProvider::new();
    let confirm = ScriptedConfirm::new("");

    let report = TeardownSequencer::new(&provider, &confirm, forced("demo", &dir))
        .run()
        .await
        .unwrap();

    assert!(report.targeted.is_empty());
    assert_eq!(report.path, DestroyPath::Skipped);
    assert!(provider.destroy_all_calls().is_empty());
    assert!(provider.destroy_calls().is_empty());
    assert!(confirm.prompts().is_empty());
    assert_eq!(report.verification_polls, 0);
    assert_eq!(report.exit_code(), 0);
    assert_artifacts_removed(&dir);
}

#[tokio::test(start_paused = true)]
async fn any_reply_other_than_delete_cancels() {
    for reply in ["", "delete", "yes", "DELETE please", "Delete\n"] {
        let dir = project_dir();
        let provider = MemoryStackProvider::new().with_project("demo", false);
        let confirm = ScriptedConfirm::new(reply);

        let report = TeardownSequencer::new(
            &provider,
            &confirm,
            TeardownConfig::new("demo", dir.path()),
        )
        .run()
        .await
        .unwrap();

        assert!(report.cancelled, "{reply:?} must cancel");
        assert_eq!(report.exit_code(), 0);
        assert!(report.cleanup.is_none());
        assert!(provider
            .calls()
            .iter()
            .all(|c| matches!(c, ProviderCall::Preflight | ProviderCall::Status(_))));
        assert_eq!(provider.existing_stacks().len(), 2);
        assert!(
            dir.path().join("matomo-key.pem").exists(),
            "cancelled runs leave local files alone"
        );
    }
}

#[tokio::test(start_paused = true)]
async fn fallback_destroys_in_dependency_order() {
    let dir = project_dir();
    let provider = MemoryStackProvider::new()
        .with_project("demo", true)
        .fail_bulk_destroy()
        .fail_destroy_always("demo-compute");
    let confirm = ScriptedConfirm::new("");

    let report = TeardownSequencer::new(&provider, &confirm, forced("demo", &dir))
        .run()
        .await
        .unwrap();

    // A failed compute destroy does not stop database or networking.
    assert_eq!(
        provider.destroy_calls(),
        vec!["demo-compute", "demo-database", "demo-networking"]
    );
    assert_eq!(
        report.attempt_order(),
        vec!["demo-compute", "demo-database", "demo-networking"]
    );
    assert_eq!(report.remaining, vec!["demo-compute".to_string()]);
    assert!(report.diagnostics.is_none());
}

#[tokio::test(start_paused = true)]
async fn fallback_skips_stacks_that_do_not_exist() {
    let dir = project_dir();
    let provider = MemoryStackProvider::new()
        .with_project("demo", false)
        .fail_bulk_destroy();
    let confirm = ScriptedConfirm::new("");

    let report = TeardownSequencer::new(&provider, &confirm, forced("demo", &dir))
        .run()
        .await
        .unwrap();

    assert_eq!(provider.destroy_calls(), vec!["demo-compute", "demo-networking"]);
    assert!(report.succeeded());
}

#[tokio::test(start_paused = true)]
async fn networking_retry_is_three_attempts_thirty_seconds_apart() {
    let dir = project_dir();
    let provider = MemoryStackProvider::new()
        .with_stack("demo-networking", StackStatus::Created)
        .fail_bulk_destroy()
        .fail_destroy_always("demo-networking");
    let confirm = ScriptedConfirm::new("");
    let start = Instant::now();

    let report = TeardownSequencer::new(&provider, &confirm, forced("demo", &dir))
        .run()
        .await
        .unwrap();

    assert_eq!(provider.destroy_calls().len(), 3);
    assert_eq!(report.verification_polls, 6);
    // 2 x 30s between destroy attempts, then 5 x 10s between polls.
    assert_eq!(start.elapsed(), Duration::from_secs(60 + 50));
}

#[tokio::test(start_paused = true)]
async fn networking_retry_stops_once_it_succeeds() {
    let dir = project_dir();
    let provider = MemoryStackProvider::new()
        .with_stack("demo-networking", StackStatus::Created)
        .fail_bulk_destroy()
        .fail_destroy("demo-networking", 1);
    let confirm = ScriptedConfirm::new("");
    let start = Instant::now();

    let report = TeardownSequencer::new(&provider, &confirm, forced("demo", &dir))
        .run()
        .await
        .unwrap();

    assert_eq!(provider.destroy_calls().len(), 2);
    assert_eq!(report.attempts[0].attempts, 2);
    assert!(report.attempts[0].succeeded);
    assert!(report.diagnostics.is_none());
    assert_eq!(start.elapsed(), Duration::from_secs(30));
    assert_eq!(report.exit_code(), 0);
}

#[tokio::test(start_paused = true)]
async fn verification_waits_out_deletion_lag() {
    let dir = project_dir();
    let provider = MemoryStackProvider::new()
        .with_project("demo", false)
        .with_deletion_lag("demo-compute", 2);
    let confirm = ScriptedConfirm::new("");
    let start = Instant::now();

    let report = TeardownSequencer::new(&provider, &confirm, forced("demo", &dir))
        .run()
        .await
        .unwrap();

    assert_eq!(report.verification_polls, 3);
    assert_eq!(start.elapsed(), Duration::from_secs(20));
    assert!(report.remaining.is_empty());
}

#[tokio::test(start_paused = true)]
async fn verification_is_bounded_when_deletion_never_completes() {
    let dir = project_dir();
    let provider = MemoryStackProvider::new()
        .with_project("demo", false)
        .with_deletion_lag("demo-compute", u32::MAX);
    let confirm = ScriptedConfirm::new("");
    let start = Instant::now();

    let report = TeardownSequencer::new(&provider, &confirm, forced("demo", &dir))
        .run()
        .await
        .unwrap();

    assert_eq!(report.verification_polls, 6);
    // One scan before the destroy, six polls after.
    assert_eq!(provider.status_calls("demo-compute"), 7);
    assert_eq!(start.elapsed(), Duration::from_secs(50));
    assert_eq!(report.remaining, vec!["demo-compute".to_string()]);
    assert_eq!(report.exit_code(), 1);
}

#[tokio::test(start_paused = true)]
async fn local_cleanup_runs_after_partial_failure() {
    let dir = project_dir();
    let provider = MemoryStackProvider::new()
        .with_project("demo", true)
        .fail_bulk_destroy()
        .fail_destroy_always("demo-database")
        .fail_destroy_always("demo-networking");
    let confirm = ScriptedConfirm::new("");

    let report = TeardownSequencer::new(&provider, &confirm, forced("demo", &dir))
        .run()
        .await
        .unwrap();

    assert_eq!(report.exit_code(), 1);
    let cleanup = report.cleanup.as_ref().expect("cleanup ran");
    assert_eq!(cleanup.removed.len(), 3);
    assert!(cleanup.is_clean());
    assert_artifacts_removed(&dir);
}

#[tokio::test(start_paused = true)]
async fn empty_lingering_probe_is_a_warning() {
    let dir = project_dir();
    let provider = MemoryStackProvider::new()
        .with_stack("demo-networking", StackStatus::Failed)
        .fail_bulk_destroy()
        .fail_destroy_always("demo-networking");
    let confirm = ScriptedConfirm::new("");

    let report = TeardownSequencer::new(
        &provider,
        &confirm,
        forced("demo", &dir).with_local_artifacts(LocalArtifacts::none()),
    )
    .run()
    .await
    .unwrap();

    assert_eq!(report.diagnostics, Some(LingeringResources::default()));
    assert!(report
        .lines
        .iter()
        .any(|l| l.level == CheckLevel::Warn && l.message.contains("no lingering")));
}

#[tokio::test]
async fn missing_credentials_abort_before_any_stack_call() {
    let dir = project_dir();
    let provider = MemoryStackProvider::new()
        .with_project("demo", true)
        .fail_preflight_credentials("ExpiredToken");
    let confirm = ScriptedConfirm::new("DELETE");

    let err = TeardownSequencer::new(&provider, &confirm, forced("demo", &dir))
        .run()
        .await
        .unwrap_err();

    match err {
        TeardownError::Precondition(source) => assert!(source.is_precondition()),
        other => panic!("expected precondition error, got {other:?}"),
    }
    assert_eq!(provider.calls(), vec![ProviderCall::Preflight]);
    assert!(dir.path().join("matomo-key.pem").exists());
}
