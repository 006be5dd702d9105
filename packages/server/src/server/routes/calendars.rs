use axum::extract::Extension;
use axum::http::StatusCode;
use chrono::Utc;

use super::scheduled_posts::OwnerQuery;
use crate::common::CalendarId;
use crate::domains::scheduling::activities::{
    create_calendar, delete_calendar, list_calendars, update_calendar, CalendarUpdate, NewCalendar,
};
use crate::domains::scheduling::PublishingCalendar;
use crate::server::app::AppState;
use crate::server::error::ApiResult;
use crate::server::extract::{Json, Path, Query};

pub async fn create(
    Extension(state): Extension<AppState>,
    Json(input): Json<NewCalendar>,
) -> ApiResult<(StatusCode, Json<PublishingCalendar>)> {
    let calendar = create_calendar(&state.deps, input, Utc::now()).await?;
    Ok((StatusCode::CREATED, Json(calendar)))
}

pub async fn list(
    Extension(state): Extension<AppState>,
    Query(query): Query<OwnerQuery>,
) -> ApiResult<Json<Vec<PublishingCalendar>>> {
    Ok(Json(list_calendars(&state.deps, query.owner_id).await?))
}

pub async fn update(
    Extension(state): Extension<AppState>,
    Path(calendar_id): Path<CalendarId>,
    Json(update): Json<CalendarUpdate>,
) -> ApiResult<Json<PublishingCalendar>> {
    Ok(Json(
        update_calendar(&state.deps, calendar_id, update, Utc::now()).await?,
    ))
}

pub async fn delete(
    Extension(state): Extension<AppState>,
    Path(calendar_id): Path<CalendarId>,
) -> ApiResult<StatusCode> {
    delete_calendar(&state.deps, calendar_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
