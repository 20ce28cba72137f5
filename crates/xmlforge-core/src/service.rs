//! Job service: submit, poll, re-run and cancel jobs running in the background.

use std::sync::Arc;

use tracing::info;

use crate::domain::{DocumentPair, ForgeError, Job, JobOptions, JobSummary, Result};
use crate::orchestrator::Orchestrator;
use crate::registry::{JobRegistry, JobSlot};

/// Front door for callers; every job runs on its own tokio task.
#[derive(Debug, Clone)]
pub struct JobService {
    registry: Arc<JobRegistry>,
    orchestrator: Arc<Orchestrator>,
}

impl JobService {
    pub fn new(orchestrator: Orchestrator) -> Self {
        Self {
            registry: Arc::new(JobRegistry::new()),
            orchestrator: Arc::new(orchestrator),
        }
    }

    pub fn registry(&self) -> &JobRegistry {
        &self.registry
    }

    /// Validate and register a job, then start it in the background.
    pub async fn submit(&self, pairs: Vec<DocumentPair>, options: JobOptions) -> Result<JobSummary> {
        let job = Job::new(pairs, options)?;
        let mut summary = job.summary();
        summary.message = "Job created".to_string();

        let slot = self.registry.insert(job).await;
        if slot.try_start() {
            self.spawn(slot);
        }
        info!(job_id = %summary.job_id, "job submitted");
        Ok(summary)
    }

    /// Current state of a job.
    pub async fn get(&self, id: &str) -> Result<Job> {
        Ok(self.slot(id).await?.snapshot().await)
    }

    pub async fn list(&self) -> Vec<JobSummary> {
        self.registry.list().await
    }

    /// Start a finished job again from scratch with the same pairs and options.
    pub async fn rerun(&self, id: &str) -> Result<JobSummary> {
        let slot = self.slot(id).await?;
        if !slot.try_start() {
            return Err(ForgeError::JobRunning(id.to_string()));
        }
        let mut summary = slot
            .update(|job| {
                job.reset();
                job.summary()
            })
            .await;
        summary.message = "Job re-started".to_string();

        self.spawn(slot);
        info!(job_id = %id, "job re-run");
        Ok(summary)
    }

    /// Ask a running job to stop before its next iteration.
    pub async fn cancel(&self, id: &str) -> Result<JobSummary> {
        let slot = self.slot(id).await?;
        let mut summary = slot.snapshot().await.summary();
        if slot.is_running() {
            slot.request_cancel();
            summary.message = "Cancellation requested".to_string();
            info!(job_id = %id, "job cancellation requested");
        }
        Ok(summary)
    }

    /// Wait for the job's current run to end and return the final state.
    pub async fn wait(&self, id: &str) -> Result<Job> {
        Ok(self.slot(id).await?.wait_idle().await)
    }

    async fn slot(&self, id: &str) -> Result<Arc<JobSlot>> {
        self.registry
            .get(id)
            .await
            .ok_or_else(|| ForgeError::JobNotFound(id.to_string()))
    }

    fn spawn(&self, slot: Arc<JobSlot>) {
        let orchestrator = Arc::clone(&self.orchestrator);
        tokio::spawn(async move {
            let _release = RunGuard(Arc::clone(&slot));
            orchestrator.run(&slot).await;
        });
    }
}

/// Frees the slot when the run task ends, including by panic.
struct RunGuard(Arc<JobSlot>);

impl Drop for RunGuard {
    fn drop(&mut self) {
        self.0.finish();
    }
}
