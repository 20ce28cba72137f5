//! In-memory job registry.
//!
//! Each job lives in its own [`JobSlot`] so a background run can update it
//! while pollers read it. Locks are held only for the duration of a read or
//! an update closure, never across a collaborator call.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::{Notify, RwLock};

use crate::domain::{Job, JobSummary};

/// One job plus the flags its run is steered by.
#[derive(Debug)]
pub struct JobSlot {
    job: RwLock<Job>,
    cancel_requested: AtomicBool,
    running: AtomicBool,
    finished: Notify,
}

impl JobSlot {
    pub fn new(job: Job) -> Self {
        Self {
            job: RwLock::new(job),
            cancel_requested: AtomicBool::new(false),
            running: AtomicBool::new(false),
            finished: Notify::new(),
        }
    }

    /// A copy of the job as it is right now.
    pub async fn snapshot(&self) -> Job {
        self.job.read().await.clone()
    }

    /// Apply `f` under the write lock.
    pub async fn update<R>(&self, f: impl FnOnce(&mut Job) -> R) -> R {
        let mut job = self.job.write().await;
        f(&mut job)
    }

    pub fn into_job(self) -> Job {
        self.job.into_inner()
    }

    pub fn request_cancel(&self) {
        self.cancel_requested.store(true, Ordering::SeqCst);
    }

    pub fn cancel_requested(&self) -> bool {
        self.cancel_requested.load(Ordering::SeqCst)
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Claim the slot for a run. False when a run is already in progress.
    pub fn try_start(&self) -> bool {
        let started = self
            .running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok();
        if started {
            self.cancel_requested.store(false, Ordering::SeqCst);
        }
        started
    }

    /// Release the slot and wake everyone waiting on it.
    pub fn finish(&self) {
        self.running.store(false, Ordering::SeqCst);
        self.finished.notify_waiters();
    }

    /// Wait until no run is in progress, then return the job.
    pub async fn wait_idle(&self) -> Job {
        loop {
            let finished = self.finished.notified();
            if !self.is_running() {
                return self.snapshot().await;
            }
            finished.await;
        }
    }
}

/// All known jobs, keyed by id.
#[derive(Debug, Default)]
pub struct JobRegistry {
    jobs: RwLock<HashMap<String, Arc<JobSlot>>>,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, job: Job) -> Arc<JobSlot> {
        let id = job.id.clone();
        let slot = Arc::new(JobSlot::new(job));
        self.jobs.write().await.insert(id, Arc::clone(&slot));
        slot
    }

    pub async fn get(&self, id: &str) -> Option<Arc<JobSlot>> {
        self.jobs.read().await.get(id).cloned()
    }

    /// Summaries of every job, oldest first.
    pub async fn list(&self) -> Vec<JobSummary> {
        let slots: Vec<Arc<JobSlot>> = self.jobs.read().await.values().cloned().collect();
        let mut jobs = Vec::with_capacity(slots.len());
        for slot in slots {
            let job = slot.job.read().await;
            jobs.push((job.created_at, job.summary()));
        }
        jobs.sort_by(|a, b| a.0.cmp(&b.0).then_with(|| a.1.job_id.cmp(&b.1.job_id)));
        jobs.into_iter().map(|(_, summary)| summary).collect()
    }

    pub async fn len(&self) -> usize {
        self.jobs.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.jobs.read().await.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{DocumentPair, JobOptions, JobStatus};

    fn job() -> Job {
        Job::new(vec![DocumentPair::new("<a/>", "<a/>")], JobOptions::default()).unwrap()
    }

    #[tokio::test]
    async fn test_insert_get_list() {
        let registry = JobRegistry::new();
        assert!(registry.is_empty().await);
        let first = registry.insert(job()).await;
        let second = registry.insert(job()).await;
        assert_eq!(registry.len().await, 2);

        let id = first.snapshot().await.id;
        assert!(registry.get(&id).await.is_some());
        assert!(registry.get("missing").await.is_none());

        second
            .update(|job| job.status = JobStatus::Testing)
            .await;
        let statuses: Vec<JobStatus> = registry.list().await.iter().map(|s| s.status).collect();
        assert_eq!(statuses.len(), 2);
        assert!(statuses.contains(&JobStatus::Testing));
    }

    #[tokio::test]
    async fn test_single_run_at_a_time() {
        let slot = JobSlot::new(job());
        assert!(slot.try_start());
        assert!(!slot.try_start());
        slot.finish();
        assert!(slot.try_start());
    }

    #[tokio::test]
    async fn test_start_clears_cancel_request() {
        let slot = JobSlot::new(job());
        slot.request_cancel();
        assert!(slot.cancel_requested());
        assert!(slot.try_start());
        assert!(!slot.cancel_requested());
    }

    #[tokio::test]
    async fn test_wait_idle_returns_after_finish() {
        let slot = Arc::new(JobSlot::new(job()));
        assert!(slot.try_start());
        let waiter = {
            let slot = Arc::clone(&slot);
            tokio::spawn(async move { slot.wait_idle().await })
        };
        tokio::task::yield_now().await;
        slot.update(|job| job.status = JobStatus::Completed).await;
        slot.finish();
        let job = waiter.await.unwrap();
        assert_eq!(job.status, JobStatus::Completed);
    }
}
