//! Job model for background pipeline work.

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use std::fmt;
use std::str::FromStr;
use typed_builder::TypedBuilder;

use crate::common::JobId;

// ============================================================================
// Enums
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, Default)]
#[sqlx(type_name = "job_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    #[default]
    Pending,
    Running,
    Succeeded,
    DeadLetter,
    Cancelled,
}

impl JobStatus {
    /// Dead, succeeded and cancelled jobs are never dispatched again.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobStatus::Succeeded | JobStatus::DeadLetter | JobStatus::Cancelled
        )
    }
}

/// The kind of work a job performs. One processor is registered per type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "job_type", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum JobType {
    GenerateContent,
    RenderVideo,
    ScheduleVideo,
    PublishVideo,
    OptimizeContent,
    BatchGenerate,
}

impl JobType {
    pub const ALL: [JobType; 6] = [
        JobType::GenerateContent,
        JobType::RenderVideo,
        JobType::ScheduleVideo,
        JobType::PublishVideo,
        JobType::OptimizeContent,
        JobType::BatchGenerate,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            JobType::GenerateContent => "generate_content",
            JobType::RenderVideo => "render_video",
            JobType::ScheduleVideo => "schedule_video",
            JobType::PublishVideo => "publish_video",
            JobType::OptimizeContent => "optimize_content",
            JobType::BatchGenerate => "batch_generate",
        }
    }
}

impl fmt::Display for JobType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        JobType::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| format!("unknown job type: {}", s))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, Default)]
#[sqlx(type_name = "error_kind", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Transient error - will retry if attempts remain
    #[default]
    Retryable,
    /// Permanent error - will not retry
    NonRetryable,
    /// Job was cancelled by user/system
    Cancelled,
    /// Job was interrupted by graceful shutdown - will retry
    Shutdown,
}

impl ErrorKind {
    /// Whether this error kind should trigger a retry
    pub fn should_retry(&self) -> bool {
        matches!(self, ErrorKind::Retryable | ErrorKind::Shutdown)
    }
}

// ============================================================================
// Retry policy
// ============================================================================

/// Attempt bound and exponential backoff shared by every queue implementation.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: i32,
    pub backoff_base: Duration,
    pub backoff_cap: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff_base: Duration::seconds(1),
            backoff_cap: Duration::hours(1),
        }
    }
}

impl RetryPolicy {
    pub fn with_max_attempts(max_attempts: i32) -> Self {
        Self {
            max_attempts,
            ..Default::default()
        }
    }

    /// Delay before the next dispatch after `attempts` failed dispatches.
    ///
    /// `min(base * 2^(attempts - 1), cap)`: 1s, 2s, 4s, ... up to one hour.
    pub fn backoff(&self, attempts: i32) -> Duration {
        let exponent = attempts.saturating_sub(1).clamp(0, 30) as u32;
        let base_ms = self.backoff_base.num_milliseconds().max(0);
        let delay_ms = base_ms.saturating_mul(2i64.saturating_pow(exponent));
        Duration::milliseconds(delay_ms).min(self.backoff_cap)
    }
}

// ============================================================================
// Enqueue options
// ============================================================================

/// Per-job overrides supplied at enqueue time.
#[derive(Debug, Clone, Default, TypedBuilder, Serialize, Deserialize)]
pub struct EnqueueOptions {
    /// Higher runs sooner.
    #[builder(default)]
    #[serde(default)]
    pub priority: i16,

    /// Earliest dispatch time. `None` means now.
    #[builder(default, setter(strip_option))]
    #[serde(default)]
    pub run_at: Option<DateTime<Utc>>,

    /// Falls back to the queue's retry policy when unset.
    #[builder(default, setter(strip_option))]
    #[serde(default)]
    pub max_attempts: Option<i32>,
}

impl EnqueueOptions {
    pub fn delayed(delay: Duration) -> Self {
        Self {
            run_at: Some(Utc::now() + delay),
            ..Default::default()
        }
    }

    pub fn at(run_at: DateTime<Utc>) -> Self {
        Self {
            run_at: Some(run_at),
            ..Default::default()
        }
    }
}

// ============================================================================
// Job Model
// ============================================================================

#[derive(FromRow, Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    pub job_type: JobType,
    pub args: serde_json::Value,
    pub priority: i16,
    pub status: JobStatus,

    // Delivery accounting
    pub attempts: i32,
    pub max_attempts: i32,
    pub available_at: DateTime<Utc>,

    // Lease management
    pub worker_id: Option<String>,
    pub lease_expires_at: Option<DateTime<Utc>>,

    // Error tracking
    pub last_error: Option<String>,
    pub error_kind: Option<ErrorKind>,
    pub dead_lettered_at: Option<DateTime<Utc>>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// `last_error` of a job whose worker stopped renewing its final lease.
pub const LEASE_EXPIRED_ERROR: &str = "lease expired on final attempt";

const JOB_COLUMNS: &str = "id, job_type, args, priority, status, attempts, max_attempts, \
    available_at, worker_id, lease_expires_at, last_error, error_kind, dead_lettered_at, \
    created_at, updated_at";

impl Job {
    /// Build a pending job. `policy` supplies `max_attempts` when the options don't.
    pub fn new(
        job_type: JobType,
        args: serde_json::Value,
        options: &EnqueueOptions,
        policy: &RetryPolicy,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: JobId::new(),
            job_type,
            args,
            priority: options.priority,
            status: JobStatus::Pending,
            attempts: 0,
            max_attempts: options.max_attempts.unwrap_or(policy.max_attempts).max(1),
            available_at: options.run_at.unwrap_or(now),
            worker_id: None,
            lease_expires_at: None,
            last_error: None,
            error_kind: None,
            dead_lettered_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Whether a worker may claim this job at `now`.
    ///
    /// Pending jobs become visible once `available_at` has passed. Running jobs
    /// whose lease expired are reclaimable. Either way attempts must remain.
    pub fn is_claimable(&self, now: DateTime<Utc>) -> bool {
        if self.attempts >= self.max_attempts {
            return false;
        }
        match self.status {
            JobStatus::Pending => self.available_at <= now,
            JobStatus::Running => self.lease_expires_at.is_some_and(|lease| lease < now),
            _ => false,
        }
    }

    /// A running job whose worker vanished during its last allowed attempt.
    /// Claims skip it, so the queue dead-letters it instead.
    pub fn is_abandoned(&self, now: DateTime<Utc>) -> bool {
        self.status == JobStatus::Running
            && self.attempts >= self.max_attempts
            && self.lease_expires_at.is_some_and(|lease| lease < now)
    }

    /// Whether a failure of the current dispatch should be retried.
    pub fn can_retry(&self, kind: ErrorKind) -> bool {
        kind.should_retry() && self.attempts < self.max_attempts
    }

    pub fn is_final_attempt(&self) -> bool {
        self.attempts >= self.max_attempts
    }

    // ========================================================================
    // Persistence
    // ========================================================================

    pub async fn insert(&self, pool: &PgPool) -> Result<Self> {
        let job = sqlx::query_as::<_, Self>(&format!(
            r#"
            INSERT INTO jobs (id, job_type, args, priority, status, attempts, max_attempts,
                              available_at, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING {JOB_COLUMNS}
            "#
        ))
        .bind(self.id)
        .bind(self.job_type)
        .bind(&self.args)
        .bind(self.priority)
        .bind(self.status)
        .bind(self.attempts)
        .bind(self.max_attempts)
        .bind(self.available_at)
        .bind(self.created_at)
        .bind(self.updated_at)
        .fetch_one(pool)
        .await
        .context("failed to insert job")?;

        Ok(job)
    }

    pub async fn find_by_id(id: JobId, pool: &PgPool) -> Result<Option<Self>> {
        let job = sqlx::query_as::<_, Self>(&format!(
            "SELECT {JOB_COLUMNS} FROM jobs WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(pool)
        .await?;

        Ok(job)
    }

    /// Claim the next job atomically using FOR UPDATE SKIP LOCKED.
    ///
    /// Also recovers running jobs whose lease expired. The attempt counter is
    /// bumped in the same statement so a claim always consumes an attempt.
    pub async fn claim_next(
        worker_id: &str,
        lease_duration_ms: i64,
        pool: &PgPool,
    ) -> Result<Option<Self>> {
        let job = sqlx::query_as::<_, Self>(&format!(
            r#"
            WITH next_job AS (
                SELECT id
                FROM jobs
                WHERE attempts < max_attempts
                  AND (
                      (status = 'pending' AND available_at <= NOW())
                      OR (status = 'running' AND lease_expires_at < NOW())
                  )
                ORDER BY priority DESC, created_at ASC, id ASC
                LIMIT 1
                FOR UPDATE SKIP LOCKED
            )
            UPDATE jobs
            SET
                status = 'running',
                attempts = attempts + 1,
                lease_expires_at = NOW() + ($1 || ' milliseconds')::INTERVAL,
                worker_id = $2,
                updated_at = NOW()
            WHERE id IN (SELECT id FROM next_job)
            RETURNING {JOB_COLUMNS}
            "#
        ))
        .bind(lease_duration_ms.to_string())
        .bind(worker_id)
        .fetch_optional(pool)
        .await?;

        Ok(job)
    }

    /// Dead-letter running jobs whose lease expired on their final attempt.
    pub async fn dead_letter_abandoned(pool: &PgPool) -> Result<Vec<Self>> {
        let jobs = sqlx::query_as::<_, Self>(&format!(
            r#"
            UPDATE jobs
            SET status = 'dead_letter',
                last_error = $1,
                error_kind = 'retryable',
                dead_lettered_at = NOW(),
                worker_id = NULL,
                lease_expires_at = NULL,
                updated_at = NOW()
            WHERE status = 'running'
              AND attempts >= max_attempts
              AND lease_expires_at < NOW()
            RETURNING {JOB_COLUMNS}
            "#
        ))
        .bind(LEASE_EXPIRED_ERROR)
        .fetch_all(pool)
        .await
        .context("failed to dead-letter abandoned jobs")?;

        Ok(jobs)
    }

    pub async fn mark_succeeded(id: JobId, pool: &PgPool) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE jobs
            SET status = 'succeeded',
                lease_expires_at = NULL,
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .execute(pool)
        .await?;

        Ok(())
    }

    /// Put a failed job back in the queue, visible again at `retry_at`.
    pub async fn reschedule(
        id: JobId,
        error: &str,
        kind: ErrorKind,
        retry_at: DateTime<Utc>,
        pool: &PgPool,
    ) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE jobs
            SET status = 'pending',
                available_at = $1,
                last_error = $2,
                error_kind = $3,
                worker_id = NULL,
                lease_expires_at = NULL,
                updated_at = NOW()
            WHERE id = $4
            "#,
        )
        .bind(retry_at)
        .bind(error)
        .bind(kind)
        .bind(id)
        .execute(pool)
        .await?;

        Ok(())
    }

    pub async fn dead_letter(id: JobId, error: &str, kind: ErrorKind, pool: &PgPool) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE jobs
            SET status = 'dead_letter',
                last_error = $1,
                error_kind = $2,
                dead_lettered_at = NOW(),
                lease_expires_at = NULL,
                updated_at = NOW()
            WHERE id = $3
            "#,
        )
        .bind(error)
        .bind(kind)
        .bind(id)
        .execute(pool)
        .await?;

        Ok(())
    }

    /// Cancel a pending job. Running jobs are left alone.
    pub async fn cancel(id: JobId, pool: &PgPool) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE jobs
            SET status = 'cancelled',
                error_kind = 'cancelled',
                updated_at = NOW()
            WHERE id = $1 AND status = 'pending'
            "#,
        )
        .bind(id)
        .execute(pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Extend the lease for a running job (heartbeat)
    pub async fn extend_lease(id: JobId, lease_duration_ms: i64, pool: &PgPool) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE jobs
            SET lease_expires_at = NOW() + ($1 || ' milliseconds')::INTERVAL,
                updated_at = NOW()
            WHERE id = $2 AND status = 'running'
            "#,
        )
        .bind(lease_duration_ms.to_string())
        .bind(id)
        .execute(pool)
        .await?;

        Ok(())
    }

    /// Newest jobs first, optionally filtered by status.
    pub async fn list_recent(
        status: Option<JobStatus>,
        limit: i64,
        pool: &PgPool,
    ) -> Result<Vec<Self>> {
        let jobs = sqlx::query_as::<_, Self>(&format!(
            r#"
            SELECT {JOB_COLUMNS}
            FROM jobs
            WHERE ($1::job_status IS NULL OR status = $1)
            ORDER BY created_at DESC
            LIMIT $2
            "#
        ))
        .bind(status)
        .bind(limit)
        .fetch_all(pool)
        .await?;

        Ok(jobs)
    }
}
