use axum::extract::Extension;
use axum::http::StatusCode;
use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::common::{Frequency, OwnerId, Platform, ScheduledPostId, VideoId};
use crate::domains::scheduling::activities::{
    cancel_scheduled_post, create_scheduled_post, list_due_posts, list_scheduled_posts,
    plan_bulk_schedule, schedule_bulk, scheduling_analytics, update_scheduled_post,
    NewScheduledPost, PlannedPost, SchedulingAnalytics,
};
use crate::domains::scheduling::{PostUpdate, ScheduledPost};
use crate::server::app::AppState;
use crate::server::error::ApiResult;
use crate::server::extract::{Json, Path, Query};

#[derive(Debug, Deserialize)]
pub struct OwnerQuery {
    pub owner_id: OwnerId,
}

#[derive(Debug, Deserialize)]
pub struct BulkPlanRequest {
    pub video_ids: Vec<VideoId>,
    pub platforms: Vec<Platform>,
    pub start: DateTime<Utc>,
    #[serde(default)]
    pub frequency: Frequency,
}

#[derive(Debug, Deserialize)]
pub struct BulkScheduleRequest {
    pub owner_id: OwnerId,
    pub posts: Vec<PlannedPost>,
}

pub async fn create(
    Extension(state): Extension<AppState>,
    Json(input): Json<NewScheduledPost>,
) -> ApiResult<(StatusCode, Json<ScheduledPost>)> {
    let post = create_scheduled_post(&state.deps, input).await?;
    Ok((StatusCode::CREATED, Json(post)))
}

pub async fn list(
    Extension(state): Extension<AppState>,
    Query(query): Query<OwnerQuery>,
) -> ApiResult<Json<Vec<ScheduledPost>>> {
    Ok(Json(list_scheduled_posts(&state.deps, query.owner_id).await?))
}

pub async fn due(Extension(state): Extension<AppState>) -> ApiResult<Json<Vec<ScheduledPost>>> {
    Ok(Json(list_due_posts(&state.deps, Utc::now()).await?))
}

pub async fn update(
    Extension(state): Extension<AppState>,
    Path(post_id): Path<ScheduledPostId>,
    Json(update): Json<PostUpdate>,
) -> ApiResult<Json<ScheduledPost>> {
    Ok(Json(update_scheduled_post(&state.deps, post_id, update).await?))
}

pub async fn cancel(
    Extension(state): Extension<AppState>,
    Path(post_id): Path<ScheduledPostId>,
) -> ApiResult<StatusCode> {
    cancel_scheduled_post(&state.deps, post_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn bulk_plan(Json(request): Json<BulkPlanRequest>) -> Json<Vec<PlannedPost>> {
    Json(plan_bulk_schedule(
        &request.video_ids,
        &request.platforms,
        request.start,
        request.frequency,
    ))
}

pub async fn bulk_create(
    Extension(state): Extension<AppState>,
    Json(request): Json<BulkScheduleRequest>,
) -> ApiResult<(StatusCode, Json<Vec<ScheduledPost>>)> {
    let posts = schedule_bulk(&state.deps, request.owner_id, request.posts).await?;
    Ok((StatusCode::CREATED, Json(posts)))
}

pub async fn analytics(
    Extension(state): Extension<AppState>,
    Query(query): Query<OwnerQuery>,
) -> ApiResult<Json<SchedulingAnalytics>> {
    Ok(Json(
        scheduling_analytics(&state.deps, query.owner_id, Utc::now()).await?,
    ))
}
