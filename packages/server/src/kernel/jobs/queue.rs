//! Job queue abstraction and its PostgreSQL implementation.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::PgPool;
use tracing::{error, info};

use super::job::{EnqueueOptions, ErrorKind, Job, JobType, RetryPolicy, LEASE_EXPIRED_ERROR};
use crate::common::JobId;

/// What `mark_failed` did with the job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureOutcome {
    /// Back to pending, visible again at `retry_at`.
    Retrying { retry_at: DateTime<Utc> },
    /// No attempts left or the error is permanent.
    DeadLettered,
}

/// Metadata for typed job payloads.
///
/// Each payload struct names its job type so it can be enqueued without
/// repeating the type at every call site.
pub trait CommandMeta {
    fn job_type(&self) -> JobType;

    /// Default priority for this payload. Higher runs sooner.
    fn priority(&self) -> i16 {
        0
    }
}

/// Trait for job queue operations.
#[async_trait]
pub trait JobQueue: Send + Sync {
    /// Persist a pending job. `options.run_at` delays visibility.
    async fn enqueue_raw(
        &self,
        job_type: JobType,
        args: serde_json::Value,
        options: EnqueueOptions,
    ) -> Result<JobId>;

    /// Claim the next visible job for `worker_id`, bumping its attempt counter.
    ///
    /// Two concurrent claims never return the same job.
    async fn claim(&self, worker_id: &str) -> Result<Option<Job>>;

    async fn mark_succeeded(&self, job_id: JobId) -> Result<()>;

    /// Record a failed dispatch. Retries with backoff while `kind` is
    /// retryable and attempts remain, otherwise dead-letters the job.
    async fn mark_failed(&self, job_id: JobId, error: &str, kind: ErrorKind)
        -> Result<FailureOutcome>;

    /// Cancel a pending job. Returns false for running or finished jobs.
    async fn cancel(&self, job_id: JobId) -> Result<bool>;

    /// Extend the lease of a running job.
    async fn heartbeat(&self, job_id: JobId) -> Result<()>;

    async fn find(&self, job_id: JobId) -> Result<Option<Job>>;
}

/// Typed helpers on top of [`JobQueue`].
#[async_trait]
pub trait JobQueueExt: JobQueue {
    /// Enqueue a payload for immediate execution.
    async fn enqueue<C>(&self, command: C) -> Result<JobId>
    where
        C: Serialize + CommandMeta + Send + Sync,
    {
        let options = EnqueueOptions::builder().priority(command.priority()).build();
        self.enqueue_with(command, options).await
    }

    /// Schedule a payload for execution at `run_at`.
    async fn schedule<C>(&self, command: C, run_at: DateTime<Utc>) -> Result<JobId>
    where
        C: Serialize + CommandMeta + Send + Sync,
    {
        let options = EnqueueOptions::builder()
            .priority(command.priority())
            .run_at(run_at)
            .build();
        self.enqueue_with(command, options).await
    }

    async fn enqueue_with<C>(&self, command: C, options: EnqueueOptions) -> Result<JobId>
    where
        C: Serialize + CommandMeta + Send + Sync,
    {
        let args = serde_json::to_value(&command)
            .with_context(|| format!("failed to serialize {} payload", command.job_type()))?;
        self.enqueue_raw(command.job_type(), args, options).await
    }
}

impl<Q: JobQueue + ?Sized> JobQueueExt for Q {}

pub(crate) fn log_dead_letter(job: &Job, error: &str, kind: ErrorKind) {
    error!(
        job_id = %job.id,
        job_type = %job.job_type,
        attempts = job.attempts,
        max_attempts = job.max_attempts,
        error_kind = ?kind,
        error = %error,
        "job moved to dead letter"
    );
}

/// PostgreSQL-backed job queue.
pub struct PostgresJobQueue {
    pool: PgPool,
    policy: RetryPolicy,
    lease_ms: i64,
}

impl PostgresJobQueue {
    pub fn new(pool: PgPool, policy: RetryPolicy) -> Self {
        Self {
            pool,
            policy,
            lease_ms: 60_000, // 1 minute
        }
    }

    /// Create with a custom lease duration.
    pub fn with_lease_duration(mut self, lease_ms: i64) -> Self {
        self.lease_ms = lease_ms;
        self
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl JobQueue for PostgresJobQueue {
    async fn enqueue_raw(
        &self,
        job_type: JobType,
        args: serde_json::Value,
        options: EnqueueOptions,
    ) -> Result<JobId> {
        let job = Job::new(job_type, args, &options, &self.policy)
            .insert(&self.pool)
            .await?;

        info!(
            job_id = %job.id,
            job_type = %job.job_type,
            priority = job.priority,
            available_at = %job.available_at,
            "job enqueued"
        );

        Ok(job.id)
    }

    async fn claim(&self, worker_id: &str) -> Result<Option<Job>> {
        for job in Job::dead_letter_abandoned(&self.pool).await? {
            log_dead_letter(&job, LEASE_EXPIRED_ERROR, ErrorKind::Retryable);
        }
        Job::claim_next(worker_id, self.lease_ms, &self.pool).await
    }

    async fn mark_succeeded(&self, job_id: JobId) -> Result<()> {
        Job::mark_succeeded(job_id, &self.pool).await
    }

    async fn mark_failed(
        &self,
        job_id: JobId,
        error: &str,
        kind: ErrorKind,
    ) -> Result<FailureOutcome> {
        let job = Job::find_by_id(job_id, &self.pool)
            .await?
            .with_context(|| format!("job {} not found", job_id))?;

        if job.can_retry(kind) {
            let retry_at = Utc::now() + self.policy.backoff(job.attempts);
            Job::reschedule(job_id, error, kind, retry_at, &self.pool).await?;
            info!(
                job_id = %job_id,
                attempts = job.attempts,
                retry_at = %retry_at,
                "job scheduled for retry"
            );
            Ok(FailureOutcome::Retrying { retry_at })
        } else {
            Job::dead_letter(job_id, error, kind, &self.pool).await?;
            log_dead_letter(&job, error, kind);
            Ok(FailureOutcome::DeadLettered)
        }
    }

    async fn cancel(&self, job_id: JobId) -> Result<bool> {
        Job::cancel(job_id, &self.pool).await
    }

    async fn heartbeat(&self, job_id: JobId) -> Result<()> {
        Job::extend_lease(job_id, self.lease_ms, &self.pool).await
    }

    async fn find(&self, job_id: JobId) -> Result<Option<Job>> {
        Job::find_by_id(job_id, &self.pool).await
    }
}
