//! Job runner: a pool of workers draining the queue.
//!
//! ```text
//! JobRunner::start(shutdown)
//!     │
//!     └─► N × worker loop
//!             ├─► claim (JobQueue)
//!             ├─► execute via JobRegistry, heartbeat while running
//!             └─► mark succeeded / failed (queue decides retry or dead letter)
//! ```
//!
//! Each worker runs one job at a time. Cancelling the shutdown token stops the
//! loops after their in-flight job finishes.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use futures::future::join_all;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::job::{ErrorKind, Job};
use super::queue::{FailureOutcome, JobQueue};
use super::registry::SharedJobRegistry;
use crate::common::{pipeline_error, PipelineErrorKind};
use crate::kernel::ServerDeps;

/// Configuration for the job runner.
#[derive(Debug, Clone)]
pub struct JobRunnerConfig {
    pub worker_count: usize,
    /// How long an idle worker sleeps before polling again
    pub poll_interval: Duration,
    /// How often a running job's lease is extended
    pub heartbeat_interval: Duration,
    /// Prefix for worker ids; each worker appends its index
    pub worker_id_prefix: String,
}

impl Default for JobRunnerConfig {
    fn default() -> Self {
        Self {
            worker_count: 4,
            poll_interval: Duration::from_secs(1),
            heartbeat_interval: Duration::from_secs(20),
            worker_id_prefix: format!("runner-{}", Uuid::new_v4()),
        }
    }
}

/// Background service that processes jobs from the queue.
#[derive(Clone)]
pub struct JobRunner {
    job_queue: Arc<dyn JobQueue>,
    registry: SharedJobRegistry,
    deps: Arc<ServerDeps>,
    config: JobRunnerConfig,
}

/// Handle to the spawned workers.
pub struct RunnerHandle {
    shutdown: CancellationToken,
    workers: Vec<JoinHandle<()>>,
}

impl RunnerHandle {
    /// Stop claiming and wait for in-flight jobs to finish.
    pub async fn shutdown(self) {
        self.shutdown.cancel();
        for result in join_all(self.workers).await {
            if let Err(e) = result {
                error!(error = %e, "job worker panicked");
            }
        }
    }
}

impl JobRunner {
    pub fn new(
        job_queue: Arc<dyn JobQueue>,
        registry: SharedJobRegistry,
        deps: Arc<ServerDeps>,
        config: JobRunnerConfig,
    ) -> Self {
        Self {
            job_queue,
            registry,
            deps,
            config,
        }
    }

    /// Spawn `worker_count` workers. They stop when `shutdown` is cancelled.
    pub fn start(&self, shutdown: CancellationToken) -> RunnerHandle {
        let count = self.config.worker_count.max(1);
        info!(
            workers = count,
            poll_interval_ms = self.config.poll_interval.as_millis() as u64,
            "job runner starting"
        );

        let workers = (0..count)
            .map(|index| {
                let runner = self.clone();
                let token = shutdown.clone();
                let worker_id = format!("{}-{}", self.config.worker_id_prefix, index);
                tokio::spawn(async move { runner.worker_loop(worker_id, token).await })
            })
            .collect();

        RunnerHandle { shutdown, workers }
    }

    async fn worker_loop(&self, worker_id: String, shutdown: CancellationToken) {
        debug!(worker_id = %worker_id, "job worker started");

        while !shutdown.is_cancelled() {
            match self.run_next_job(&worker_id).await {
                Ok(Some(_)) => continue,
                Ok(None) => {}
                Err(e) => error!(worker_id = %worker_id, error = %e, "failed to claim job"),
            }

            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = tokio::time::sleep(self.config.poll_interval) => {}
            }
        }

        debug!(worker_id = %worker_id, "job worker stopped");
    }

    /// Claim and execute one job. Returns the job as it was claimed, or
    /// `None` when nothing was visible.
    pub async fn run_next_job(&self, worker_id: &str) -> Result<Option<Job>> {
        let Some(job) = self.job_queue.claim(worker_id).await? else {
            return Ok(None);
        };

        debug!(
            job_id = %job.id,
            job_type = %job.job_type,
            attempt = job.attempts,
            worker_id = %worker_id,
            "executing job"
        );

        let result = self.execute_with_heartbeat(&job).await;
        self.record_result(&job, result).await;

        Ok(Some(job))
    }

    /// Run jobs until none is visible. Returns how many were executed.
    ///
    /// Jobs that fail and go back to pending with a backoff delay are not
    /// visible yet, so this terminates.
    pub async fn run_until_idle(&self) -> Result<usize> {
        let worker_id = format!("{}-inline", self.config.worker_id_prefix);
        let mut executed = 0;
        while self.run_next_job(&worker_id).await?.is_some() {
            executed += 1;
        }
        Ok(executed)
    }

    async fn execute_with_heartbeat(&self, job: &Job) -> Result<()> {
        let queue = self.job_queue.clone();
        let job_id = job.id;
        let interval_duration = self.config.heartbeat_interval;
        let stop = CancellationToken::new();

        let heartbeat_stop = stop.clone();
        let heartbeat = tokio::spawn(async move {
            let mut interval = tokio::time::interval(interval_duration);
            interval.tick().await; // Skip first immediate tick

            loop {
                tokio::select! {
                    _ = heartbeat_stop.cancelled() => break,
                    _ = interval.tick() => {
                        if let Err(e) = queue.heartbeat(job_id).await {
                            warn!(job_id = %job_id, error = %e, "heartbeat failed");
                        }
                    }
                }
            }
        });

        let result = self.registry.execute(job, self.deps.clone()).await;

        stop.cancel();
        let _ = heartbeat.await;

        result
    }

    async fn record_result(&self, job: &Job, result: Result<()>) {
        let job_id = job.id;
        match result {
            Ok(()) => {
                info!(job_id = %job_id, job_type = %job.job_type, "job succeeded");
                if let Err(e) = self.job_queue.mark_succeeded(job_id).await {
                    error!(job_id = %job_id, error = %e, "failed to mark job as succeeded");
                }
            }
            Err(e) => {
                let kind = classify_error(&e);
                let message = format!("{:#}", e);
                warn!(
                    job_id = %job_id,
                    job_type = %job.job_type,
                    attempt = job.attempts,
                    error_kind = ?kind,
                    error = %message,
                    "job failed"
                );

                match self.job_queue.mark_failed(job_id, &message, kind).await {
                    Ok(FailureOutcome::Retrying { retry_at }) => {
                        debug!(job_id = %job_id, retry_at = %retry_at, "job will be retried");
                    }
                    Ok(FailureOutcome::DeadLettered) => {}
                    Err(mark_err) => {
                        error!(job_id = %job_id, error = %mark_err, "failed to mark job as failed")
                    }
                }
            }
        }
    }
}

/// Classify an error to determine retry behavior.
///
/// Typed [`PipelineError`](crate::common::PipelineError)s decide directly.
/// Anything else falls back to message heuristics: validation, lookup and
/// parse failures are permanent, everything else is retried.
pub fn classify_error(error: &anyhow::Error) -> ErrorKind {
    if let Some(pipeline) = pipeline_error(error) {
        return match pipeline.kind() {
            PipelineErrorKind::Transient => ErrorKind::Retryable,
            PipelineErrorKind::Configuration | PipelineErrorKind::Data => ErrorKind::NonRetryable,
        };
    }

    let error_str = error.to_string().to_lowercase();

    if error_str.contains("not found")
        || error_str.contains("invalid")
        || error_str.contains("permission denied")
        || error_str.contains("unauthorized")
        || error_str.contains("forbidden")
    {
        return ErrorKind::NonRetryable;
    }

    if error_str.contains("deserialize") || error_str.contains("parse") {
        return ErrorKind::NonRetryable;
    }

    ErrorKind::Retryable
}
