use std::env;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use dotenvy::dotenv;

/// Application configuration loaded from environment variables.
///
/// Provider credentials are optional: the server starts without them and the
/// affected adapters fail with a configuration error when called.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub port: u16,
    pub worker_count: usize,
    pub job_poll_interval: Duration,
    pub job_max_attempts: i32,
    pub media_dir: PathBuf,
    pub media_base_url: String,
    pub openai_api_key: Option<String>,
    pub elevenlabs_api_key: Option<String>,
    pub elevenlabs_voice_id: Option<String>,
    pub instagram_access_token: Option<String>,
    pub instagram_account_id: Option<String>,
    pub youtube_access_token: Option<String>,
    pub ffmpeg_path: String,
    pub adapter_timeout: Duration,
}

fn optional(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn parsed<T: std::str::FromStr>(name: &str, default: T) -> Result<T>
where
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match optional(name) {
        Some(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("{} must be a valid number", name)),
        None => Ok(default),
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        // Load .env file if present (development)
        let _ = dotenv();

        let port: u16 = parsed("PORT", 8080)?;

        Ok(Self {
            database_url: env::var("DATABASE_URL").context("DATABASE_URL must be set")?,
            port,
            worker_count: parsed("WORKER_COUNT", 4)?,
            job_poll_interval: Duration::from_millis(parsed("JOB_POLL_INTERVAL_MS", 1000)?),
            job_max_attempts: parsed("JOB_MAX_ATTEMPTS", 3)?,
            media_dir: optional("MEDIA_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("./media")),
            media_base_url: optional("MEDIA_BASE_URL")
                .unwrap_or_else(|| format!("http://localhost:{}/media", port)),
            openai_api_key: optional("OPENAI_API_KEY"),
            elevenlabs_api_key: optional("ELEVENLABS_API_KEY"),
            elevenlabs_voice_id: optional("ELEVENLABS_VOICE_ID"),
            instagram_access_token: optional("INSTAGRAM_ACCESS_TOKEN"),
            instagram_account_id: optional("INSTAGRAM_ACCOUNT_ID"),
            youtube_access_token: optional("YOUTUBE_ACCESS_TOKEN"),
            ffmpeg_path: optional("FFMPEG_PATH").unwrap_or_else(|| "ffmpeg".to_string()),
            adapter_timeout: Duration::from_secs(parsed("ADAPTER_TIMEOUT_SECS", 120)?),
        })
    }
}
