use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::PgPool;

use crate::common::{CalendarId, Frequency, OwnerId, PipelineError, Platform, SeriesId};

/// A weekly slot. `day_of_week` uses 0 = Sunday ... 6 = Saturday and is only
/// consulted by weekly calendars.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeSlot {
    pub day_of_week: u32,
    pub hour: u32,
    pub minute: u32,
}

impl TimeSlot {
    pub fn new(day_of_week: u32, hour: u32, minute: u32) -> Self {
        Self {
            day_of_week,
            hour,
            minute,
        }
    }

    pub fn validate(&self) -> Result<(), PipelineError> {
        if self.day_of_week > 6 {
            return Err(PipelineError::data(format!(
                "day_of_week must be 0-6, got {}",
                self.day_of_week
            )));
        }
        if self.hour > 23 {
            return Err(PipelineError::data(format!("hour must be 0-23, got {}", self.hour)));
        }
        if self.minute > 59 {
            return Err(PipelineError::data(format!(
                "minute must be 0-59, got {}",
                self.minute
            )));
        }
        Ok(())
    }
}

/// Recurring publishing cadence. Each time `next_scheduled_at` passes, a new
/// video is generated for the series and scheduled to `platforms`.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct PublishingCalendar {
    pub id: CalendarId,
    pub owner_id: OwnerId,
    pub series_id: Option<SeriesId>,
    pub frequency: Frequency,
    #[sqlx(json)]
    pub time_slots: Vec<TimeSlot>,
    #[sqlx(json)]
    pub platforms: Vec<Platform>,
    pub active: bool,
    pub next_scheduled_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PublishingCalendar {
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.active && self.next_scheduled_at <= now
    }

    // ========================================================================
    // Persistence
    // ========================================================================

    pub async fn insert(&self, pool: &PgPool) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO publishing_calendars (id, owner_id, series_id, frequency, time_slots,
                                              platforms, active, next_scheduled_at, created_at,
                                              updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(self.id)
        .bind(self.owner_id)
        .bind(self.series_id)
        .bind(self.frequency)
        .bind(Json(&self.time_slots))
        .bind(Json(&self.platforms))
        .bind(self.active)
        .bind(self.next_scheduled_at)
        .bind(self.created_at)
        .bind(self.updated_at)
        .execute(pool)
        .await
        .context("failed to insert publishing calendar")?;

        Ok(())
    }

    pub async fn find_by_id(id: CalendarId, pool: &PgPool) -> Result<Option<Self>> {
        let calendar =
            sqlx::query_as::<_, Self>("SELECT * FROM publishing_calendars WHERE id = $1")
                .bind(id)
                .fetch_optional(pool)
                .await?;

        Ok(calendar)
    }

    pub async fn find_by_owner(owner_id: OwnerId, pool: &PgPool) -> Result<Vec<Self>> {
        let calendars = sqlx::query_as::<_, Self>(
            "SELECT * FROM publishing_calendars WHERE owner_id = $1 ORDER BY created_at ASC",
        )
        .bind(owner_id)
        .fetch_all(pool)
        .await?;

        Ok(calendars)
    }

    pub async fn find_due(now: DateTime<Utc>, pool: &PgPool) -> Result<Vec<Self>> {
        let calendars = sqlx::query_as::<_, Self>(
            r#"
            SELECT * FROM publishing_calendars
            WHERE active AND next_scheduled_at <= $1
            ORDER BY next_scheduled_at ASC
            "#,
        )
        .bind(now)
        .fetch_all(pool)
        .await?;

        Ok(calendars)
    }

    /// Move `next_scheduled_at` from `expected` to `next`.
    ///
    /// Returns false when another scheduler already advanced it.
    pub async fn advance(
        id: CalendarId,
        expected: DateTime<Utc>,
        next: DateTime<Utc>,
        pool: &PgPool,
    ) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE publishing_calendars
            SET next_scheduled_at = $3, updated_at = NOW()
            WHERE id = $1 AND next_scheduled_at = $2
            "#,
        )
        .bind(id)
        .bind(expected)
        .bind(next)
        .execute(pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn update(&self, pool: &PgPool) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE publishing_calendars
            SET series_id = $2,
                frequency = $3,
                time_slots = $4,
                platforms = $5,
                active = $6,
                next_scheduled_at = $7,
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(self.id)
        .bind(self.series_id)
        .bind(self.frequency)
        .bind(Json(&self.time_slots))
        .bind(Json(&self.platforms))
        .bind(self.active)
        .bind(self.next_scheduled_at)
        .execute(pool)
        .await
        .with_context(|| format!("failed to update calendar {}", self.id))?;

        Ok(())
    }

    pub async fn delete(id: CalendarId, pool: &PgPool) -> Result<bool> {
        let result = sqlx::query("DELETE FROM publishing_calendars WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
