use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::info;

use crate::common::{CalendarId, Frequency, OwnerId, PipelineError, Platform, SeriesId};
use crate::domains::scheduling::models::{PublishingCalendar, TimeSlot};
use crate::domains::scheduling::recurrence::next_scheduled_at;
use crate::kernel::ServerDeps;

#[derive(Debug, Clone, Deserialize)]
pub struct NewCalendar {
    pub owner_id: OwnerId,
    #[serde(default)]
    pub series_id: Option<SeriesId>,
    #[serde(default)]
    pub frequency: Frequency,
    pub time_slots: Vec<TimeSlot>,
    pub platforms: Vec<Platform>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CalendarUpdate {
    #[serde(default)]
    pub series_id: Option<SeriesId>,
    #[serde(default)]
    pub frequency: Option<Frequency>,
    #[serde(default)]
    pub time_slots: Option<Vec<TimeSlot>>,
    #[serde(default)]
    pub platforms: Option<Vec<Platform>>,
    #[serde(default)]
    pub active: Option<bool>,
}

fn normalize_platforms(mut platforms: Vec<Platform>) -> Result<Vec<Platform>, PipelineError> {
    platforms.sort();
    platforms.dedup();
    if platforms.is_empty() {
        return Err(PipelineError::data("at least one platform is required"));
    }
    Ok(platforms)
}

pub async fn create_calendar(
    deps: &ServerDeps,
    input: NewCalendar,
    now: DateTime<Utc>,
) -> Result<PublishingCalendar> {
    let platforms = normalize_platforms(input.platforms)?;
    let next = next_scheduled_at(input.frequency, &input.time_slots, now)?;

    if let Some(series_id) = input.series_id {
        deps.store
            .find_series(series_id)
            .await?
            .ok_or_else(|| PipelineError::not_found("series", series_id))?;
    }

    let calendar = PublishingCalendar {
        id: CalendarId::new(),
        owner_id: input.owner_id,
        series_id: input.series_id,
        frequency: input.frequency,
        time_slots: input.time_slots,
        platforms,
        active: true,
        next_scheduled_at: next,
        created_at: now,
        updated_at: now,
    };
    deps.store.insert_calendar(&calendar).await?;

    info!(
        calendar_id = %calendar.id,
        owner_id = %calendar.owner_id,
        next_scheduled_at = %calendar.next_scheduled_at,
        "publishing calendar created"
    );
    Ok(calendar)
}

pub async fn list_calendars(deps: &ServerDeps, owner_id: OwnerId) -> Result<Vec<PublishingCalendar>> {
    deps.store.calendars_for_owner(owner_id).await
}

/// Apply `update` and recompute the next fire time from `now`.
pub async fn update_calendar(
    deps: &ServerDeps,
    calendar_id: CalendarId,
    update: CalendarUpdate,
    now: DateTime<Utc>,
) -> Result<PublishingCalendar> {
    let mut calendar = deps
        .store
        .find_calendar(calendar_id)
        .await?
        .ok_or_else(|| PipelineError::not_found("calendar", calendar_id))?;

    if let Some(series_id) = update.series_id {
        deps.store
            .find_series(series_id)
            .await?
            .ok_or_else(|| PipelineError::not_found("series", series_id))?;
        calendar.series_id = Some(series_id);
    }
    if let Some(frequency) = update.frequency {
        calendar.frequency = frequency;
    }
    if let Some(slots) = update.time_slots {
        calendar.time_slots = slots;
    }
    if let Some(platforms) = update.platforms {
        calendar.platforms = normalize_platforms(platforms)?;
    }
    if let Some(active) = update.active {
        calendar.active = active;
    }

    calendar.next_scheduled_at = next_scheduled_at(calendar.frequency, &calendar.time_slots, now)?;
    calendar.updated_at = now;
    deps.store.save_calendar(&calendar).await?;

    info!(
        calendar_id = %calendar.id,
        active = calendar.active,
        next_scheduled_at = %calendar.next_scheduled_at,
        "publishing calendar updated"
    );
    Ok(calendar)
}

pub async fn delete_calendar(deps: &ServerDeps, calendar_id: CalendarId) -> Result<()> {
    if !deps.store.delete_calendar(calendar_id).await? {
        return Err(PipelineError::not_found("calendar", calendar_id).into());
    }
    info!(calendar_id = %calendar_id, "publishing calendar deleted");
    Ok(())
}
