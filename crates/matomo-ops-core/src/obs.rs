//! Structured observability hooks for the teardown lifecycle.
//!
//! Every teardown runs inside a span tagged with a run id and the project
//! name; the functions below emit the key lifecycle events as structured
//! fields so JSON log output can be filtered by `event`.

use tracing::{info, warn, Span};

/// Span covering one teardown run.
///
/// Attach it with `tracing::Instrument` so it follows the future across
/// await points.
pub fn teardown_span(run_id: &str, project: &str) -> Span {
    tracing::info_span!("matomo_ops.teardown", run_id = %run_id, project = %project)
}

/// Emit event: teardown started.
pub fn emit_teardown_started(project: &str, existing_stacks: usize, force: bool) {
    info!(
        event = "teardown.started",
        project = %project,
        existing_stacks = existing_stacks,
        force = force,
    );
}

/// Emit event: operator declined the confirmation.
pub fn emit_teardown_cancelled(project: &str) {
    info!(event = "teardown.cancelled", project = %project);
}

/// Emit event: bulk destroy finished.
pub fn emit_bulk_destroy(stacks: usize, success: bool) {
    if success {
        info!(event = "stack.bulk_destroy", stacks = stacks, success = success);
    } else {
        warn!(event = "stack.bulk_destroy", stacks = stacks, success = success);
    }
}

/// Emit event: one per-stack destroy attempt finished.
pub fn emit_stack_destroy(stack: &str, attempt: u32, success: bool) {
    if success {
        info!(event = "stack.destroy", stack = %stack, attempt = attempt, success = success);
    } else {
        warn!(event = "stack.destroy", stack = %stack, attempt = attempt, success = success);
    }
}

/// Emit event: lingering resources found after networking retries ran out.
pub fn emit_lingering_resources(stack: &str, instances: usize, interfaces: usize) {
    warn!(
        event = "stack.lingering_resources",
        stack = %stack,
        instances = instances,
        network_interfaces = interfaces,
    );
}

/// Emit event: teardown finished.
pub fn emit_teardown_finished(project: &str, duration_ms: u64, remaining: usize, success: bool) {
    info!(
        event = "teardown.finished",
        project = %project,
        duration_ms = duration_ms,
        remaining_stacks = remaining,
        success = success,
    );
}
