//! Production wiring shared by the server and CLI binaries.

use std::sync::Arc;

use anyhow::{Context, Result};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

use crate::config::Config;
use crate::kernel::jobs::{PostgresJobQueue, RetryPolicy};
use crate::kernel::platforms::{InstagramClient, PlatformRegistry, YouTubeClient};
use crate::kernel::{
    ElevenLabsClient, FfmpegRenderer, LocalMediaStorage, OpenAiAdapter, PipelineSettings,
    PostgresStore, ServerDeps,
};

/// Connect to Postgres and run pending migrations.
pub async fn connect_database(config: &Config) -> Result<PgPool> {
    tracing::info!("Connecting to database...");
    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(&config.database_url)
        .await
        .context("Failed to connect to database")?;
    tracing::info!("Database connected");

    tracing::info!("Running database migrations...");
    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .context("Failed to run migrations")?;
    tracing::info!("Migrations complete");

    Ok(pool)
}

/// Postgres store and queue plus the real provider adapters.
pub fn production_deps(config: &Config, pool: PgPool) -> Result<Arc<ServerDeps>> {
    let store = Arc::new(PostgresStore::new(pool.clone()));
    let job_queue = Arc::new(PostgresJobQueue::new(
        pool,
        RetryPolicy::with_max_attempts(config.job_max_attempts),
    ));

    let openai = Arc::new(OpenAiAdapter::new(config.openai_api_key.clone())?);
    let voice = Arc::new(ElevenLabsClient::new(config.elevenlabs_api_key.clone())?);
    let media_storage = Arc::new(LocalMediaStorage::new(
        config.media_dir.clone(),
        config.media_base_url.clone(),
    ));
    let renderer = Arc::new(FfmpegRenderer::new(
        config.ffmpeg_path.clone(),
        config.media_dir.join("work"),
        media_storage.clone(),
    ));

    let mut platforms = PlatformRegistry::new();
    platforms.register(Arc::new(YouTubeClient::new(
        config.youtube_access_token.clone(),
    )?));
    platforms.register(Arc::new(InstagramClient::new(
        config.instagram_access_token.clone(),
        config.instagram_account_id.clone(),
    )?));

    let mut settings = PipelineSettings {
        adapter_timeout: config.adapter_timeout,
        ..PipelineSettings::default()
    };
    if let Some(voice_id) = &config.elevenlabs_voice_id {
        settings.default_voice_id = voice_id.clone();
    }

    Ok(Arc::new(ServerDeps::new(
        store,
        job_queue,
        openai.clone(),
        openai,
        voice,
        media_storage,
        renderer,
        platforms,
        settings,
    )))
}
