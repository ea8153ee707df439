//! Structured lifecycle events for a convergence run.
//!
//! Every event carries an `event` field so log pipelines can filter on it;
//! run-scoped fields come from the enclosing [`RunSpan`].

use tracing::{info, warn};

/// RAII guard that keeps a run-scoped span entered.
///
/// ```ignore
/// let _span = RunSpan::enter("3f2c...");
/// // events below carry run_id
/// ```
pub struct RunSpan {
    _span: tracing::span::EnteredSpan,
}

impl RunSpan {
    pub fn enter(run_id: &str) -> Self {
        let span = tracing::info_span!("covforge.run", run_id = %run_id);
        Self {
            _span: span.entered(),
        }
    }
}

pub fn emit_run_started(run_id: &str, classes: usize, artifacts: usize, target: f64) {
    info!(
        event = "run.started",
        run_id = %run_id,
        classes = classes,
        artifacts = artifacts,
        target = target,
    );
}

/// Emit event: an iteration produced a snapshot.
pub fn emit_iteration_measured(iteration: u32, percentage: f64, compiled: usize, abandoned: usize) {
    info!(
        event = "iteration.measured",
        iteration = iteration,
        percentage = percentage,
        compiled = compiled,
        abandoned = abandoned,
    );
}

pub fn emit_compile_failed(artifact_id: &str, attempt: u32, summary: &str) {
    warn!(
        event = "artifact.compile_failed",
        artifact_id = %artifact_id,
        attempt = attempt,
        summary = %summary,
    );
}

/// Emit event: an artifact lineage ran out of regeneration attempts.
pub fn emit_artifact_abandoned(artifact_id: &str, attempts: u32) {
    warn!(event = "artifact.abandoned", artifact_id = %artifact_id, attempts = attempts);
}

pub fn emit_run_finished(run_id: &str, outcome: &str, iterations: usize, percentage: f64, duration_ms: u64) {
    info!(
        event = "run.finished",
        run_id = %run_id,
        outcome = %outcome,
        iterations = iterations,
        percentage = percentage,
        duration_ms = duration_ms,
    );
}

/// Emit event: a required or optional collaborator could not be reached.
pub fn emit_collaborator_unavailable(name: &str, detail: &dyn std::fmt::Display) {
    warn!(event = "collaborator.unavailable", name = %name, detail = %detail);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_events_without_subscriber() {
        let _span = RunSpan::enter("test-run");
        emit_run_started("test-run", 2, 10, 80.0);
        emit_iteration_measured(1, 42.5, 9, 1);
        emit_compile_failed("Box_getValue_BasicUsage", 1, "error: boom");
        emit_artifact_abandoned("Box_getValue_BasicUsage", 3);
        emit_run_finished("test-run", "plateaued", 3, 42.5, 1200);
        emit_collaborator_unavailable("gcov", &"not found");
    }
}
