use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;

use crate::common::{Frequency, OwnerId, SeriesId};

/// A themed run of videos published on a cadence.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Series {
    pub id: SeriesId,
    pub owner_id: OwnerId,
    pub title: String,
    pub description: Option<String>,
    pub frequency: Frequency,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Series {
    pub fn new(
        owner_id: OwnerId,
        title: impl Into<String>,
        description: Option<String>,
        frequency: Frequency,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: SeriesId::new(),
            owner_id,
            title: title.into(),
            description,
            frequency,
            created_at: now,
            updated_at: now,
        }
    }

    pub async fn insert(&self, pool: &PgPool) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO series (id, owner_id, title, description, frequency, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(self.id)
        .bind(self.owner_id)
        .bind(&self.title)
        .bind(&self.description)
        .bind(self.frequency)
        .bind(self.created_at)
        .bind(self.updated_at)
        .execute(pool)
        .await
        .context("failed to insert series")?;

        Ok(())
    }

    pub async fn find_by_id(id: SeriesId, pool: &PgPool) -> Result<Option<Self>> {
        let series = sqlx::query_as::<_, Self>("SELECT * FROM series WHERE id = $1")
            .bind(id)
            .fetch_optional(pool)
            .await?;

        Ok(series)
    }

    /// Delete a series together with its videos and their scheduled posts.
    pub async fn delete(id: SeriesId, pool: &PgPool) -> Result<bool> {
        let result = sqlx::query("DELETE FROM series WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
