//! Staged teardown of a project's stacks.
//!
//! 1. Preflight the provider (fatal on failure).
//! 2. Find which of the three stacks exist.
//! 3. Unless forced, require the operator to type `DELETE`.
//! 4. Try one bulk destroy of every existing stack.
//! 5. If that fails, destroy stacks one by one in teardown order
//!    (compute, database, networking); networking is retried under
//!    `TeardownConfig::networking_retry` and probed for lingering
//!    resources once its retries run out.
//! 6. Poll until every targeted stack is gone, bounded by
//!    `TeardownConfig::verification`.
//! 7. Remove local artifacts, whatever happened on the cloud side.
//!
//! Partial failure is an expected outcome: it is recorded in the returned
//! [`TeardownReport`], never raised as an error.

use std::fmt;
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, Instrument};

use crate::cleanup::{cleanup_local_artifacts, CleanupReport};
use crate::config::TeardownConfig;
use crate::confirm::{is_confirmed, Confirm};
use crate::error::{Result, TeardownError};
use crate::obs;
use crate::provider::StackProvider;
use crate::report::{CheckLine, CheckSummary};
use crate::retry::Retried;
use crate::stack::{LingeringResources, StackRef, StackRole};

/// How the destroy phase was carried out.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DestroyPath {
    /// Nothing was destroyed (cancelled, or no stacks existed).
    Skipped,

    /// One bulk destroy removed every stack.
    Bulk,

    /// Bulk destroy failed; stacks were destroyed individually.
    PerStack,
}

/// Outcome of destroying one stack in the per-stack fallback.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DestroyAttempt {
    pub stack: String,
    pub role: StackRole,
    pub attempts: u32,
    pub succeeded: bool,
    pub last_error: Option<String>,
}

/// Everything a teardown run did and observed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeardownReport {
    pub run_id: String,
    pub project: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,

    /// The operator declined the confirmation.
    pub cancelled: bool,

    /// Stacks that existed when the run started.
    pub targeted: Vec<String>,

    pub path: DestroyPath,
    pub bulk_error: Option<String>,

    /// Per-stack attempts, in the order they were made.
    pub attempts: Vec<DestroyAttempt>,

    /// Lingering-resource probe result after networking retries ran out.
    pub diagnostics: Option<LingeringResources>,

    /// Existence polls made during verification.
    pub verification_polls: u32,

    /// Stacks still present at the end of the run.
    pub remaining: Vec<String>,

    pub cleanup: Option<CleanupReport>,

    /// Pass / warn / fail lines in the order they were produced.
    pub lines: Vec<CheckLine>,
}

impl TeardownReport {
    fn new(run_id: String, project: &str) -> Self {
        Self {
            run_id,
            project: project.to_string(),
            started_at: Utc::now(),
            finished_at: None,
            cancelled: false,
            targeted: Vec::new(),
            path: DestroyPath::Skipped,
            bulk_error: None,
            attempts: Vec::new(),
            diagnostics: None,
            verification_polls: 0,
            remaining: Vec::new(),
            cleanup: None,
            lines: Vec::new(),
        }
    }

    fn push(&mut self, line: CheckLine) {
        debug!(check = line.level.label(), message = %line.message, "status line");
        self.lines.push(line);
    }

    /// True when nothing is left behind, or the operator cancelled.
    pub fn succeeded(&self) -> bool {
        self.cancelled || self.remaining.is_empty()
    }

    /// Process exit code for this report.
    pub fn exit_code(&self) -> u8 {
        if self.succeeded() {
            0
        } else {
            1
        }
    }

    pub fn summary(&self) -> CheckSummary {
        CheckSummary::from_lines(&self.lines)
    }

    /// Per-stack attempts in the order made, by stack name.
    pub fn attempt_order(&self) -> Vec<&str> {
        self.attempts.iter().map(|a| a.stack.as_str()).collect()
    }
}

/// Stacks still present after a verification poll.
struct StillPresent(Vec<String>);

impl fmt::Display for StillPresent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "still present: {}", self.0.join(", "))
    }
}

/// Drives a teardown against a [`StackProvider`].
pub struct TeardownSequencer<'a> {
    provider: &'a dyn StackProvider,
    confirm: &'a dyn Confirm,
    config: TeardownConfig,
}

impl<'a> TeardownSequencer<'a> {
    pub fn new(
        provider: &'a dyn StackProvider,
        confirm: &'a dyn Confirm,
        config: TeardownConfig,
    ) -> Self {
        Self {
            provider,
            confirm,
            config,
        }
    }

    pub fn config(&self) -> &TeardownConfig {
        &self.config
    }

    /// Run the teardown.
    ///
    /// Returns `Err` only for precondition failures (provider preflight) and
    /// unreadable confirmation input; every other outcome is in the report.
    pub async fn run(&self) -> Result<TeardownReport> {
        let run_id = uuid::Uuid::new_v4().to_string();
        let span = obs::teardown_span(&run_id, &self.config.project_name);
        self.run_inner(run_id).instrument(span).await
    }

    async fn run_inner(&self, run_id: String) -> Result<TeardownReport> {
        let started = Instant::now();
        let project = self.config.project_name.as_str();
        let mut report = TeardownReport::new(run_id, project);

        self.provider
            .preflight()
            .await
            .map_err(TeardownError::Precondition)?;

        let existing = self.existing_stacks(&mut report).await;
        report.targeted = existing.iter().map(|s| s.name.clone()).collect();
        obs::emit_teardown_started(project, existing.len(), self.config.force);

        if !self.config.force {
            let reply = self.confirm.request(project, &report.targeted).await?;
            if !is_confirmed(&reply) {
                report.cancelled = true;
                report.push(CheckLine::warn(
                    "teardown cancelled: confirmation token not entered",
                ));
                obs::emit_teardown_cancelled(project);
                report.finished_at = Some(Utc::now());
                return Ok(report);
            }
        }

        if existing.is_empty() {
            report.push(CheckLine::pass(format!(
                "no stacks found for project '{}'; nothing to destroy",
                project
            )));
        } else {
            self.destroy(&existing, &mut report).await;
            self.verify_deleted(&existing, &mut report).await;
        }

        let cleanup = cleanup_local_artifacts(&self.config.local_artifacts);
        record_cleanup(&cleanup, &mut report);
        report.cleanup = Some(cleanup);

        if report.remaining.is_empty() {
            report.push(CheckLine::pass(format!(
                "project '{}' has no remaining stacks",
                project
            )));
        } else {
            report.push(CheckLine::fail(format!(
                "stacks remaining: {}",
                report.remaining.join(", ")
            )));
        }

        report.finished_at = Some(Utc::now());
        obs::emit_teardown_finished(
            project,
            started.elapsed().as_millis() as u64,
            report.remaining.len(),
            report.succeeded(),
        );
        Ok(report)
    }

    /// Stacks that currently exist, in creation order. A failed status lookup
    /// counts the stack as existing.
    async fn existing_stacks(&self, report: &mut TeardownReport) -> Vec<StackRef> {
        let mut existing = Vec::new();
        for stack in self.config.stacks() {
            match self.provider.stack_status(&stack.name).await {
                Ok(status) if status.exists() => {
                    info!(stack = %stack.name, status = %status, "stack present");
                    existing.push(stack);
                }
                Ok(_) => debug!(stack = %stack.name, "stack absent"),
                Err(err) => {
                    report.push(CheckLine::warn(format!(
                        "could not read status of {}: {}; treating it as present",
                        stack.name, err
                    )));
                    existing.push(stack);
                }
            }
        }
        existing
    }

    async fn destroy(&self, existing: &[StackRef], report: &mut TeardownReport) {
        let names: Vec<String> = existing.iter().map(|s| s.name.clone()).collect();

        match self.provider.destroy_all(&names).await {
            Ok(()) => {
                obs::emit_bulk_destroy(names.len(), true);
                report.path = DestroyPath::Bulk;
                report.push(CheckLine::pass(format!(
                    "bulk destroy completed for {} stack(s)",
                    names.len()
                )));
            }
            Err(err) => {
                obs::emit_bulk_destroy(names.len(), false);
                report.path = DestroyPath::PerStack;
                report.bulk_error = Some(err.to_string());
                report.push(CheckLine::warn(format!(
                    "bulk destroy failed ({}); destroying stacks individually",
                    err
                )));
                self.destroy_individually(existing, report).await;
            }
        }
    }

    async fn destroy_individually(&self, existing: &[StackRef], report: &mut TeardownReport) {
        for role in StackRole::TEARDOWN_ORDER {
            let Some(stack) = existing.iter().find(|s| s.role == role) else {
                continue;
            };

            let attempt = if role == StackRole::Networking {
                self.destroy_with_retry(stack).await
            } else {
                self.destroy_once(stack).await
            };

            if attempt.succeeded {
                report.push(CheckLine::pass(format!(
                    "destroyed {} after {} attempt(s)",
                    attempt.stack, attempt.attempts
                )));
            } else {
                report.push(CheckLine::fail(format!(
                    "failed to destroy {} after {} attempt(s): {}",
                    attempt.stack,
                    attempt.attempts,
                    attempt.last_error.as_deref().unwrap_or("unknown error")
                )));
                if role == StackRole::Networking {
                    self.probe_lingering(stack, report).await;
                }
            }
            report.attempts.push(attempt);
        }
    }

    async fn destroy_once(&self, stack: &StackRef) -> DestroyAttempt {
        let result = self.provider.destroy_stack(&stack.name).await;
        obs::emit_stack_destroy(&stack.name, 1, result.is_ok());
        DestroyAttempt {
            stack: stack.name.clone(),
            role: stack.role,
            attempts: 1,
            succeeded: result.is_ok(),
            last_error: result.err().map(|e| e.to_string()),
        }
    }

    async fn destroy_with_retry(&self, stack: &StackRef) -> DestroyAttempt {
        let provider = self.provider;
        let name = stack.name.as_str();

        let outcome = self
            .config
            .networking_retry
            .retry(name, |attempt| async move {
                let result = provider.destroy_stack(name).await;
                obs::emit_stack_destroy(name, attempt, result.is_ok());
                result
            })
            .await;

        match outcome {
            Retried::Succeeded { attempts, .. } => DestroyAttempt {
                stack: stack.name.clone(),
                role: stack.role,
                attempts,
                succeeded: true,
                last_error: None,
            },
            Retried::Exhausted {
                last_error,
                attempts,
            } => DestroyAttempt {
                stack: stack.name.clone(),
                role: stack.role,
                attempts,
                succeeded: false,
                last_error: Some(last_error.to_string()),
            },
        }
    }

    async fn probe_lingering(&self, stack: &StackRef, report: &mut TeardownReport) {
        match self.provider.lingering_resources(&stack.name).await {
            Ok(found) => {
                obs::emit_lingering_resources(
                    &stack.name,
                    found.instance_ids.len(),
                    found.network_interface_ids.len(),
                );
                let vpc = found.vpc_id.as_deref().unwrap_or("unknown VPC");
                if found.is_empty() {
                    report.push(CheckLine::warn(format!(
                        "no lingering instances or network interfaces found in {}",
                        vpc
                    )));
                } else {
                    if !found.instance_ids.is_empty() {
                        report.push(CheckLine::fail(format!(
                            "instances still in {}: {}",
                            vpc,
                            found.instance_ids.join(", ")
                        )));
                    }
                    if !found.network_interface_ids.is_empty() {
                        report.push(CheckLine::fail(format!(
                            "network interfaces still in {}: {}",
                            vpc,
                            found.network_interface_ids.join(", ")
                        )));
                    }
                }
                report.diagnostics = Some(found);
            }
            Err(err) => report.push(CheckLine::warn(format!(
                "could not probe lingering resources for {}: {}",
                stack.name, err
            ))),
        }
    }

    async fn verify_deleted(&self, targeted: &[StackRef], report: &mut TeardownReport) {
        let provider = self.provider;

        let outcome = self
            .config
            .verification
            .poll("verify-deleted", |_poll| async move {
                let mut present = Vec::new();
                for stack in targeted {
                    match provider.stack_status(&stack.name).await {
                        Ok(status) if !status.exists() => {}
                        _ => present.push(stack.name.clone()),
                    }
                }
                if present.is_empty() {
                    Ok(())
                } else {
                    Err(StillPresent(present))
                }
            })
            .await;

        report.verification_polls = outcome.attempts();
        match outcome {
            Retried::Succeeded { attempts, .. } => {
                report.push(CheckLine::pass(format!(
                    "confirmed deletion of {} stack(s) after {} check(s)",
                    targeted.len(),
                    attempts
                )));
            }
            Retried::Exhausted {
                last_error: StillPresent(present),
                attempts,
            } => {
                report.push(CheckLine::fail(format!(
                    "still present after {} check(s): {}",
                    attempts,
                    present.join(", ")
                )));
                report.remaining = present;
            }
        }
    }
}

fn record_cleanup(cleanup: &CleanupReport, report: &mut TeardownReport) {
    for path in &cleanup.removed {
        report.push(CheckLine::pass(format!("removed {}", path.display())));
    }
    for failure in &cleanup.failed {
        report.push(CheckLine::warn(format!(
            "could not remove {}: {}",
            failure.path.display(),
            failure.error
        )));
    }
}
