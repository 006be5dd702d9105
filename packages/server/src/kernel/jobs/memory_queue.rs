//! In-process job queue used by tests and single-node development runs.
//!
//! Same semantics as [`PostgresJobQueue`](super::PostgresJobQueue): priority
//! ordering, delayed visibility, attempt bound, backoff and dead-lettering.
//! The `*_at` methods take an explicit clock so tests can step through time.

use std::collections::HashMap;
use std::sync::RwLock;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use tracing::info;

use super::job::{
    EnqueueOptions, ErrorKind, Job, JobStatus, JobType, RetryPolicy, LEASE_EXPIRED_ERROR,
};
use super::queue::{log_dead_letter, FailureOutcome, JobQueue};
use crate::common::JobId;

struct Entry {
    seq: u64,
    job: Job,
}

#[derive(Default)]
struct State {
    next_seq: u64,
    entries: HashMap<JobId, Entry>,
}

pub struct MemoryJobQueue {
    state: RwLock<State>,
    policy: RetryPolicy,
    lease: Duration,
}

impl Default for MemoryJobQueue {
    fn default() -> Self {
        Self::new(RetryPolicy::default())
    }
}

impl MemoryJobQueue {
    pub fn new(policy: RetryPolicy) -> Self {
        Self {
            state: RwLock::new(State::default()),
            policy,
            lease: Duration::seconds(60),
        }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Snapshot of every job, in enqueue order.
    pub fn jobs(&self) -> Vec<Job> {
        let state = self.state.read().unwrap_or_else(|e| e.into_inner());
        let mut entries: Vec<_> = state.entries.values().collect();
        entries.sort_by_key(|e| e.seq);
        entries.into_iter().map(|e| e.job.clone()).collect()
    }

    pub fn jobs_of_type(&self, job_type: JobType) -> Vec<Job> {
        self.jobs()
            .into_iter()
            .filter(|j| j.job_type == job_type)
            .collect()
    }

    /// Claim as if the clock read `now`.
    pub fn claim_at(&self, worker_id: &str, now: DateTime<Utc>) -> Option<Job> {
        let mut state = self.state.write().unwrap_or_else(|e| e.into_inner());

        for entry in state.entries.values_mut() {
            let job = &mut entry.job;
            if job.is_abandoned(now) {
                job.status = JobStatus::DeadLetter;
                job.last_error = Some(LEASE_EXPIRED_ERROR.to_string());
                job.error_kind = Some(ErrorKind::Retryable);
                job.dead_lettered_at = Some(now);
                job.worker_id = None;
                job.lease_expires_at = None;
                job.updated_at = now;
                log_dead_letter(job, LEASE_EXPIRED_ERROR, ErrorKind::Retryable);
            }
        }

        let id = state
            .entries
            .values()
            .filter(|e| e.job.is_claimable(now))
            // Highest priority, then oldest
            .min_by_key(|e| (-(e.job.priority as i32), e.job.created_at, e.seq))
            .map(|e| e.job.id)?;

        let entry = state.entries.get_mut(&id)?;
        let job = &mut entry.job;
        job.status = JobStatus::Running;
        job.attempts += 1;
        job.worker_id = Some(worker_id.to_string());
        job.lease_expires_at = Some(now + self.lease);
        job.updated_at = now;
        Some(job.clone())
    }

    /// Record a failure as if the clock read `now`.
    pub fn fail_at(
        &self,
        job_id: JobId,
        error: &str,
        kind: ErrorKind,
        now: DateTime<Utc>,
    ) -> Result<FailureOutcome> {
        let mut state = self.state.write().unwrap_or_else(|e| e.into_inner());
        let job = &mut state
            .entries
            .get_mut(&job_id)
            .with_context(|| format!("job {} not found", job_id))?
            .job;

        job.last_error = Some(error.to_string());
        job.error_kind = Some(kind);
        job.worker_id = None;
        job.lease_expires_at = None;
        job.updated_at = now;

        if job.can_retry(kind) {
            let retry_at = now + self.policy.backoff(job.attempts);
            job.status = JobStatus::Pending;
            job.available_at = retry_at;
            info!(job_id = %job_id, attempts = job.attempts, retry_at = %retry_at, "job scheduled for retry");
            Ok(FailureOutcome::Retrying { retry_at })
        } else {
            job.status = JobStatus::DeadLetter;
            job.dead_lettered_at = Some(now);
            log_dead_letter(job, error, kind);
            Ok(FailureOutcome::DeadLettered)
        }
    }

    fn update<F>(&self, job_id: JobId, f: F) -> Result<()>
    where
        F: FnOnce(&mut Job),
    {
        let mut state = self.state.write().unwrap_or_else(|e| e.into_inner());
        let entry = state
            .entries
            .get_mut(&job_id)
            .with_context(|| format!("job {} not found", job_id))?;
        f(&mut entry.job);
        Ok(())
    }
}

#[async_trait]
impl JobQueue for MemoryJobQueue {
    async fn enqueue_raw(
        &self,
        job_type: JobType,
        args: serde_json::Value,
        options: EnqueueOptions,
    ) -> Result<JobId> {
        let job = Job::new(job_type, args, &options, &self.policy);
        let id = job.id;

        let mut state = self.state.write().unwrap_or_else(|e| e.into_inner());
        let seq = state.next_seq;
        state.next_seq += 1;
        state.entries.insert(id, Entry { seq, job });

        info!(job_id = %id, job_type = %job_type, priority = options.priority, "job enqueued");
        Ok(id)
    }

    async fn claim(&self, worker_id: &str) -> Result<Option<Job>> {
        Ok(self.claim_at(worker_id, Utc::now()))
    }

    async fn mark_succeeded(&self, job_id: JobId) -> Result<()> {
        self.update(job_id, |job| {
            job.status = JobStatus::Succeeded;
            job.lease_expires_at = None;
            job.updated_at = Utc::now();
        })
    }

    async fn mark_failed(
        &self,
        job_id: JobId,
        error: &str,
        kind: ErrorKind,
    ) -> Result<FailureOutcome> {
        self.fail_at(job_id, error, kind, Utc::now())
    }

    async fn cancel(&self, job_id: JobId) -> Result<bool> {
        let mut state = self.state.write().unwrap_or_else(|e| e.into_inner());
        match state.entries.get_mut(&job_id) {
            Some(entry) if entry.job.status == JobStatus::Pending => {
                entry.job.status = JobStatus::Cancelled;
                entry.job.error_kind = Some(ErrorKind::Cancelled);
                entry.job.updated_at = Utc::now();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn heartbeat(&self, job_id: JobId) -> Result<()> {
        let lease = self.lease;
        self.update(job_id, |job| {
            if job.status == JobStatus::Running {
                job.lease_expires_at = Some(Utc::now() + lease);
            }
        })
    }

    async fn find(&self, job_id: JobId) -> Result<Option<Job>> {
        let state = self.state.read().unwrap_or_else(|e| e.into_inner());
        Ok(state.entries.get(&job_id).map(|e| e.job.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kernel::jobs::JobQueueExt;
    use serde_json::json;

    #[tokio::test]
    async fn claims_highest_priority_first_then_fifo() {
        let queue = MemoryJobQueue::default();
        let low = queue
            .enqueue_raw(JobType::RenderVideo, json!({}), EnqueueOptions::default())
            .await
            .unwrap();
        let high = queue
            .enqueue_raw(
                JobType::PublishVideo,
                json!({}),
                EnqueueOptions::builder().priority(10).build(),
            )
            .await
            .unwrap();
        let low_later = queue
            .enqueue_raw(JobType::RenderVideo, json!({}), EnqueueOptions::default())
            .await
            .unwrap();

        let order: Vec<JobId> = (0..3)
            .filter_map(|_| queue.claim_at("w", Utc::now()))
            .map(|j| j.id)
            .collect();
        assert_eq!(order, vec![high, low, low_later]);
    }

    #[tokio::test]
    async fn delayed_jobs_wait_for_their_time() {
        let queue = MemoryJobQueue::default();
        let now = Utc::now();
        queue
            .enqueue_raw(
                JobType::ScheduleVideo,
                json!({}),
                EnqueueOptions::at(now + Duration::hours(1)),
            )
            .await
            .unwrap();

        assert!(queue.claim_at("w", now).is_none());
        assert!(queue.claim_at("w", now + Duration::hours(1)).is_some());
    }

    #[tokio::test]
    async fn retry_then_dead_letter_after_max_attempts() {
        let queue = MemoryJobQueue::new(RetryPolicy::with_max_attempts(2));
        let id = queue
            .enqueue_raw(JobType::RenderVideo, json!({}), EnqueueOptions::default())
            .await
            .unwrap();
        let mut now = Utc::now();

        let first = queue.claim_at("w", now).unwrap();
        assert_eq!(first.attempts, 1);
        let outcome = queue.fail_at(id, "boom", ErrorKind::Retryable, now).unwrap();
        assert_eq!(
            outcome,
            FailureOutcome::Retrying {
                retry_at: now + Duration::seconds(1)
            }
        );
        assert!(queue.claim_at("w", now).is_none());

        now += Duration::seconds(1);
        let second = queue.claim_at("w", now).unwrap();
        assert_eq!(second.attempts, 2);
        let outcome = queue.fail_at(id, "boom", ErrorKind::Retryable, now).unwrap();
        assert_eq!(outcome, FailureOutcome::DeadLettered);

        let dead = queue.find(id).await.unwrap().unwrap();
        assert_eq!(dead.status, JobStatus::DeadLetter);
        assert_eq!(dead.last_error.as_deref(), Some("boom"));
        assert!(queue.claim_at("w", now + Duration::days(30)).is_none());
    }

    #[tokio::test]
    async fn non_retryable_failure_dead_letters_immediately() {
        let queue = MemoryJobQueue::default();
        let id = queue
            .enqueue_raw(JobType::OptimizeContent, json!({}), EnqueueOptions::default())
            .await
            .unwrap();
        queue.claim_at("w", Utc::now()).unwrap();

        let outcome = queue
            .mark_failed(id, "Failed to parse AI response", ErrorKind::NonRetryable)
            .await
            .unwrap();
        assert_eq!(outcome, FailureOutcome::DeadLettered);
    }

    #[tokio::test]
    async fn only_pending_jobs_can_be_cancelled() {
        let queue = MemoryJobQueue::default();
        let pending = queue
            .enqueue_raw(JobType::RenderVideo, json!({}), EnqueueOptions::default())
            .await
            .unwrap();
        assert!(queue.cancel(pending).await.unwrap());
        assert!(queue.claim_at("w", Utc::now()).is_none());

        let running = queue
            .enqueue_raw(JobType::RenderVideo, json!({}), EnqueueOptions::default())
            .await
            .unwrap();
        queue.claim_at("w", Utc::now()).unwrap();
        assert!(!queue.cancel(running).await.unwrap());
    }

    #[tokio::test]
    async fn expired_lease_is_reclaimed() {
        let queue = MemoryJobQueue::default();
        let id = queue
            .enqueue_raw(JobType::RenderVideo, json!({}), EnqueueOptions::default())
            .await
            .unwrap();
        let now = Utc::now();
        queue.claim_at("crashed", now).unwrap();

        assert!(queue.claim_at("other", now + Duration::seconds(30)).is_none());
        let reclaimed = queue.claim_at("other", now + Duration::seconds(61)).unwrap();
        assert_eq!(reclaimed.id, id);
        assert_eq!(reclaimed.attempts, 2);
        assert_eq!(reclaimed.worker_id.as_deref(), Some("other"));
    }

    #[tokio::test]
    async fn expired_final_lease_is_dead_lettered() {
        let queue = MemoryJobQueue::new(RetryPolicy::with_max_attempts(1));
        let id = queue
            .enqueue_raw(JobType::RenderVideo, json!({}), EnqueueOptions::default())
            .await
            .unwrap();
        let now = Utc::now();
        queue.claim_at("crashed", now).unwrap();

        assert!(queue.claim_at("other", now + Duration::seconds(30)).is_none());
        assert_eq!(queue.find(id).await.unwrap().unwrap().status, JobStatus::Running);

        assert!(queue.claim_at("other", now + Duration::days(30)).is_none());
        let dead = queue.find(id).await.unwrap().unwrap();
        assert_eq!(dead.status, JobStatus::DeadLetter);
        assert_eq!(dead.attempts, 1);
        assert_eq!(dead.last_error.as_deref(), Some(LEASE_EXPIRED_ERROR));
        assert!(dead.dead_lettered_at.is_some());
        assert!(dead.lease_expires_at.is_none());
    }

    #[derive(serde::Serialize)]
    struct Ping {
        value: u32,
    }

    impl crate::kernel::jobs::CommandMeta for Ping {
        fn job_type(&self) -> JobType {
            JobType::BatchGenerate
        }

        fn priority(&self) -> i16 {
            3
        }
    }

    #[tokio::test]
    async fn typed_enqueue_serializes_payload() {
        let queue = MemoryJobQueue::default();
        let id = queue.enqueue(Ping { value: 7 }).await.unwrap();
        let job = queue.find(id).await.unwrap().unwrap();
        assert_eq!(job.job_type, JobType::BatchGenerate);
        assert_eq!(job.priority, 3);
        assert_eq!(job.args, json!({"value": 7}));
    }
}
