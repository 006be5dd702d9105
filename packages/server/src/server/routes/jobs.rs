use axum::extract::Extension;
use axum::http::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::common::{JobId, PipelineError};
use crate::kernel::jobs::{EnqueueOptions, Job, JobType};
use crate::server::app::AppState;
use crate::server::error::ApiResult;
use crate::server::extract::{Json, Path};

#[derive(Debug, Deserialize)]
pub struct EnqueueJobRequest {
    pub job_type: JobType,
    #[serde(default)]
    pub args: Value,
    #[serde(flatten)]
    pub options: EnqueueOptions,
}

#[derive(Debug, Serialize)]
pub struct JobAccepted {
    pub job_id: JobId,
}

/// `POST /jobs` - enqueue a raw job payload.
pub async fn enqueue_job(
    Extension(state): Extension<AppState>,
    Json(request): Json<EnqueueJobRequest>,
) -> ApiResult<(StatusCode, Json<JobAccepted>)> {
    let job_id = state
        .deps
        .job_queue
        .enqueue_raw(request.job_type, request.args, request.options)
        .await?;
    Ok((StatusCode::ACCEPTED, Json(JobAccepted { job_id })))
}

/// `GET /jobs/:id`
pub async fn get_job(
    Extension(state): Extension<AppState>,
    Path(job_id): Path<JobId>,
) -> ApiResult<Json<Job>> {
    let job = state
        .deps
        .job_queue
        .find(job_id)
        .await?
        .ok_or_else(|| PipelineError::not_found("job", job_id))?;
    Ok(Json(job))
}

/// `DELETE /jobs/:id` - cancel a job that has not started.
pub async fn cancel_job(
    Extension(state): Extension<AppState>,
    Path(job_id): Path<JobId>,
) -> ApiResult<StatusCode> {
    let queue = &state.deps.job_queue;
    if queue.cancel(job_id).await? {
        return Ok(StatusCode::NO_CONTENT);
    }

    let job = queue
        .find(job_id)
        .await?
        .ok_or_else(|| PipelineError::not_found("job", job_id))?;
    Err(PipelineError::data(format!(
        "job {} is {:?} and can no longer be cancelled",
        job.id, job.status
    ))
    .into())
}
