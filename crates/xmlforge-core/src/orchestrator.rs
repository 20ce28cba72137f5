//! The analyze, generate, test loop that drives one job.
//!
//! State machine:
//!
//! ```text
//! pending -> analyzing -> generating -> testing -> completed
//!                ^                          |
//!                +------- iterating <-------+   (accuracy below threshold)
//! ```
//!
//! Any collaborator error moves the job straight to `failed`. Running out of
//! iterations is still `completed`: the job keeps its last candidate and
//! score. A cancel request is honoured between iterations only.

use std::error::Error;
use std::time::Instant;

use tracing::Instrument;

use crate::collaborator::{CollaboratorError, Collaborators};
use crate::domain::{Job, JobStatus};
use crate::feedback::{self, percent};
use crate::obs;
use crate::registry::JobSlot;

/// Characters of error context kept in a failed job's message.
const MAX_TRACE_CHARS: usize = 2_000;

/// Drives jobs through their collaborators.
#[derive(Debug, Clone)]
pub struct Orchestrator {
    collaborators: Collaborators,
}

/// How a run ended short of the happy path.
enum Stop {
    Cancelled,
    Failed(CollaboratorError),
}

impl Orchestrator {
    pub fn new(collaborators: Collaborators) -> Self {
        Self { collaborators }
    }

    /// Run `job` to a terminal status and return it.
    pub async fn run_job(&self, job: Job) -> Job {
        let slot = JobSlot::new(job);
        self.run(&slot).await;
        slot.into_job()
    }

    /// Run the job held in `slot` until it completes, fails or is cancelled.
    pub async fn run(&self, slot: &JobSlot) {
        let job_id = slot.snapshot().await.id;
        self.drive(slot, &job_id)
            .instrument(obs::job_span(&job_id))
            .await
    }

    async fn drive(&self, slot: &JobSlot, job_id: &str) {
        let started = Instant::now();
        let job = slot.snapshot().await;
        obs::emit_job_started(job_id, job.pairs.len(), job.max_iterations);

        match self.iterate(slot, &job).await {
            Ok(()) => {}
            Err(Stop::Cancelled) => {
                slot.update(|job| {
                    job.status = JobStatus::Cancelled;
                    job.message = format!("Cancelled after {} iteration(s).", job.current_iteration);
                })
                .await;
            }
            Err(Stop::Failed(err)) => {
                let iteration = slot
                    .update(|job| {
                        job.status = JobStatus::Failed;
                        job.message = failure_message(&err);
                        job.current_iteration
                    })
                    .await;
                obs::emit_job_failed(job_id, iteration, &err);
                return;
            }
        }

        let (status, iterations) = slot.update(|job| (job.status, job.current_iteration)).await;
        let elapsed = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
        obs::emit_job_finished(job_id, status, iterations, elapsed);
    }

    async fn iterate(&self, slot: &JobSlot, job: &Job) -> Result<(), Stop> {
        let pairs = &job.pairs;
        let threshold = job.accuracy_threshold;
        let max_iterations = job.max_iterations;
        let mut feedback = String::new();
        let mut iteration = job.current_iteration;

        while iteration < max_iterations {
            if slot.cancel_requested() {
                return Err(Stop::Cancelled);
            }
            iteration += 1;

            let message = if feedback.is_empty() {
                "Analyzing XML pairs...".to_string()
            } else {
                format!("Re-analyzing rules with feedback (iteration {iteration})...")
            };
            slot.update(|job| {
                job.current_iteration = iteration;
                job.status = JobStatus::Analyzing;
                job.message = message;
            })
            .await;
            obs::emit_iteration_started(&job.id, iteration, !feedback.is_empty());

            let rules = self
                .collaborators
                .analyzer
                .analyze(pairs, &feedback)
                .await
                .map_err(Stop::Failed)?;
            slot.update(|job| {
                job.rule_set = Some(rules.clone());
                job.status = JobStatus::Generating;
                job.message = format!("Generating code (iteration {iteration})...");
            })
            .await;

            let candidate = self
                .collaborators
                .generator
                .generate(&rules, pairs, &feedback)
                .await
                .map_err(Stop::Failed)?
                .for_iteration(iteration);
            slot.update(|job| {
                job.candidate = Some(candidate.clone());
                job.status = JobStatus::Testing;
                job.message = format!("Testing generated code (iteration {iteration})...");
            })
            .await;

            let score = self
                .collaborators
                .tester
                .test(&candidate, pairs)
                .await
                .map_err(Stop::Failed)?;
            obs::emit_iteration_scored(
                &job.id,
                iteration,
                candidate.digest().short(),
                score.accuracy,
                score.passed_pairs,
                score.total_pairs,
            );

            let accuracy = score.accuracy;
            if accuracy >= threshold {
                slot.update(|job| {
                    job.score = Some(score);
                    job.status = JobStatus::Completed;
                    job.message = format!(
                        "Completed with {} accuracy after {iteration} iteration(s).",
                        percent(accuracy)
                    );
                })
                .await;
                return Ok(());
            }

            feedback = feedback::compile(&score, threshold);
            slot.update(|job| {
                job.score = Some(score);
                if iteration < max_iterations {
                    job.status = JobStatus::Iterating;
                    job.message = format!(
                        "Iteration {iteration} accuracy {} below threshold {} -- re-analyzing rules.",
                        percent(accuracy),
                        percent(threshold)
                    );
                }
            })
            .await;
        }

        slot.update(|job| {
            let accuracy = job
                .accuracy()
                .map(percent)
                .unwrap_or_else(|| "N/A".to_string());
            job.status = JobStatus::Completed;
            job.message = format!(
                "Completed after {} iteration(s) with {accuracy} accuracy (max iterations reached).",
                job.current_iteration
            );
        })
        .await;
        Ok(())
    }
}

/// `Error: <error>` followed by its source chain, bounded in length.
fn failure_message(err: &CollaboratorError) -> String {
    let mut trace = String::new();
    let mut source = err.source();
    while let Some(cause) = source {
        if !trace.is_empty() {
            trace.push('\n');
        }
        trace.push_str("caused by: ");
        trace.push_str(&cause.to_string());
        source = cause.source();
    }
    let trace: String = trace.chars().take(MAX_TRACE_CHARS).collect();
    format!("Error: {err}\n{trace}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborator::Service;

    #[test]
    fn test_failure_message_without_source() {
        let err = CollaboratorError::Status {
            service: Service::Generator,
            status: 400,
            detail: "Analysis must contain at least one field mapping or transformation rule.".into(),
        };
        assert_eq!(
            failure_message(&err),
            "Error: [Generator] 400: Analysis must contain at least one field mapping or transformation rule.\n"
        );
    }

    #[test]
    fn test_failure_message_includes_cause() {
        let source = serde_json::from_str::<u32>("\"x\"").unwrap_err();
        let err = CollaboratorError::Decode {
            service: Service::Tester,
            source,
        };
        let message = failure_message(&err);
        assert!(message.starts_with("Error: [Tester] invalid response: "));
        assert!(message.contains("\ncaused by: invalid type"));
    }
}
