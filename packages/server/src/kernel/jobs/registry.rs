//! Job registry for deserializing and executing jobs.
//!
//! The registry maps each [`JobType`] to a typed handler. When the runner
//! claims a job it looks up the handler, deserializes the JSON payload into
//! the handler's payload struct and runs it.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use anyhow::Result;
use serde::de::DeserializeOwned;

use super::job::{Job, JobType};
use crate::common::{JobId, PipelineError};
use crate::kernel::ServerDeps;

/// Dispatch details handed to every handler.
#[derive(Debug, Clone, Copy)]
pub struct JobContext {
    pub job_id: JobId,
    /// 1-based dispatch counter.
    pub attempt: i32,
    pub max_attempts: i32,
}

impl JobContext {
    pub fn for_job(job: &Job) -> Self {
        Self {
            job_id: job.id,
            attempt: job.attempts,
            max_attempts: job.max_attempts,
        }
    }

    /// True when a failure of this dispatch will not be retried.
    pub fn is_final_attempt(&self) -> bool {
        self.attempt >= self.max_attempts
    }
}

type BoxedHandler = Box<
    dyn Fn(
            serde_json::Value,
            JobContext,
            Arc<ServerDeps>,
        ) -> Pin<Box<dyn Future<Output = Result<()>> + Send>>
        + Send
        + Sync,
>;

/// Registry that maps job types to handlers.
///
/// ```ignore
/// let mut registry = JobRegistry::new();
/// registry.register::<RenderVideoJob, _, _>(JobType::RenderVideo, |job, ctx, deps| async move {
///     render::render_video(job, ctx, &deps).await
/// });
/// ```
#[derive(Default)]
pub struct JobRegistry {
    handlers: HashMap<JobType, BoxedHandler>,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the handler for `job_type`, replacing any previous one.
    pub fn register<J, F, Fut>(&mut self, job_type: JobType, handler: F)
    where
        J: DeserializeOwned + Send + 'static,
        F: Fn(J, JobContext, Arc<ServerDeps>) -> Fut + Send + Sync + Clone + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        let boxed: BoxedHandler = Box::new(move |value, ctx, deps| {
            let handler = handler.clone();
            Box::pin(async move {
                let job: J = serde_json::from_value(value).map_err(|e| {
                    PipelineError::data(format!("failed to deserialize {} payload: {}", job_type, e))
                })?;
                handler(job, ctx, deps).await
            })
        });

        self.handlers.insert(job_type, boxed);
    }

    /// Execute a claimed job with its registered handler.
    pub async fn execute(&self, job: &Job, deps: Arc<ServerDeps>) -> Result<()> {
        let handler = self.handlers.get(&job.job_type).ok_or_else(|| {
            PipelineError::configuration(format!("no handler registered for {}", job.job_type))
        })?;

        handler(job.args.clone(), JobContext::for_job(job), deps).await
    }

    pub fn is_registered(&self, job_type: JobType) -> bool {
        self.handlers.contains_key(&job_type)
    }

    pub fn registered_types(&self) -> Vec<JobType> {
        self.handlers.keys().copied().collect()
    }
}

/// Thread-safe registry wrapped in Arc.
pub type SharedJobRegistry = Arc<JobRegistry>;
