//! Structured lifecycle events for jobs and sandbox runs.
//!
//! Every event carries an `event` field naming it, so log pipelines can
//! filter on it regardless of the human-readable message. Job runs happen
//! inside a [`job_span`] so nested events inherit the `job_id`.

use tracing::{info, warn, Span};

use crate::domain::JobStatus;

/// Span wrapping one orchestrator run.
pub fn job_span(job_id: &str) -> Span {
    tracing::info_span!("xmlforge.job", job_id = %job_id)
}

/// Emit event: a run began.
///
/// ```ignore
/// emit_job_started("3f2a...", 4, 5);
/// // logs: event=job.started job_id=3f2a... pairs=4 max_iterations=5
/// ```
pub fn emit_job_started(job_id: &str, pairs: usize, max_iterations: u32) {
    info!(
        event = "job.started",
        job_id = %job_id,
        pairs = pairs,
        max_iterations = max_iterations,
    );
}

pub fn emit_iteration_started(job_id: &str, iteration: u32, with_feedback: bool) {
    info!(
        event = "job.iteration_started",
        job_id = %job_id,
        iteration = iteration,
        with_feedback = with_feedback,
    );
}

/// Emit event: a candidate came back from the tester.
pub fn emit_iteration_scored(
    job_id: &str,
    iteration: u32,
    candidate: &str,
    accuracy: f64,
    passed: usize,
    total: usize,
) {
    info!(
        event = "job.iteration_scored",
        job_id = %job_id,
        iteration = iteration,
        candidate = %candidate,
        accuracy = accuracy,
        passed = passed,
        total = total,
    );
}

/// Emit event: the run reached a terminal status other than failed.
pub fn emit_job_finished(job_id: &str, status: JobStatus, iterations: u32, duration_ms: u64) {
    info!(
        event = "job.finished",
        job_id = %job_id,
        status = %status,
        iterations = iterations,
        duration_ms = duration_ms,
    );
}

/// Emit event: a collaborator failure ended the run (warning level).
pub fn emit_job_failed(job_id: &str, iteration: u32, error: &dyn std::fmt::Display) {
    warn!(event = "job.failed", job_id = %job_id, iteration = iteration, error = %error);
}

/// Emit event: a candidate could not be loaded.
pub fn emit_sandbox_load_failed(candidate: &str, reason: &str) {
    info!(event = "sandbox.load_failed", candidate = %candidate, reason = %reason);
}

/// Emit event: one pair failed; `reason` is the first diagnostic line.
pub fn emit_sandbox_pair_failed(pair_id: &str, reason: &str) {
    info!(event = "sandbox.pair_failed", pair_id = %pair_id, reason = %reason);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_events_without_subscriber() {
        let span = job_span("job-1");
        let _entered = span.enter();
        emit_job_started("job-1", 2, 5);
        emit_iteration_started("job-1", 1, false);
        emit_iteration_scored("job-1", 1, "abc123", 0.5, 1, 2);
        emit_job_finished("job-1", JobStatus::Completed, 1, 10);
        emit_job_failed("job-1", 1, &"[Analyzer] 500: boom");
        emit_sandbox_load_failed("abc123", "Syntax error in generated code: x");
        emit_sandbox_pair_failed("p1", "Runtime error: boom");
    }
}
