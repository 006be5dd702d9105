// Trait definitions for dependency injection
//
// These are INFRASTRUCTURE traits only - no business logic.
// Pipeline steps are domain functions that call these traits.
//
// Naming convention: Base* for trait names (e.g., BaseAI, BaseRenderer)
//
// Implementations return `PipelineError`s inside `anyhow::Error` so the job
// runner can tell transient failures from permanent ones.

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::common::{Caption, ContentOptimization, Platform};

// =============================================================================
// AI Trait (script, prompts, hashtags, optimization, topics)
// =============================================================================

#[async_trait]
pub trait BaseAI: Send + Sync {
    /// Narration script for a video about `topic`, sized for `duration_secs`.
    async fn generate_script(&self, topic: &str, duration_secs: u32) -> Result<String>;

    /// One image prompt per scene of `script`, in order.
    async fn generate_image_prompts(&self, script: &str) -> Result<Vec<String>>;

    /// Hashtags for `topic` within `niche`, without the leading '#'.
    async fn generate_hashtags(&self, topic: &str, niche: &str) -> Result<Vec<String>>;

    /// Rewrite title, description and hashtags for one platform.
    ///
    /// Non-JSON provider output is a data error.
    async fn optimize_for_platform(
        &self,
        content: &str,
        platform: Platform,
    ) -> Result<ContentOptimization>;

    /// Trending video topics for `niche`, best first.
    async fn discover_topics(&self, niche: &str) -> Result<Vec<String>>;
}

// =============================================================================
// Image Generation Trait
// =============================================================================

#[async_trait]
pub trait BaseImageGenerator: Send + Sync {
    /// Generate one image and return its URL.
    async fn generate_image(&self, prompt: &str) -> Result<String>;
}

// =============================================================================
// Voice Synthesis Trait
// =============================================================================

#[async_trait]
pub trait BaseVoiceSynthesizer: Send + Sync {
    /// Synthesize `text` with `voice_id`. Returns encoded audio (mp3).
    async fn synthesize_voice(&self, text: &str, voice_id: &str) -> Result<Vec<u8>>;
}

// =============================================================================
// Media Storage Trait
// =============================================================================

#[async_trait]
pub trait BaseMediaStorage: Send + Sync {
    /// Persist `bytes` and return a public URL. `extension` has no dot.
    async fn store_media(&self, bytes: Vec<u8>, extension: &str) -> Result<String>;
}

// =============================================================================
// Renderer Trait
// =============================================================================

/// One still image shown for `duration_secs`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderSegment {
    pub image_url: String,
    pub duration_secs: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderRequest {
    pub segments: Vec<RenderSegment>,
    pub audio_url: Option<String>,
    pub captions: Vec<Caption>,
    pub template: String,
}

impl RenderRequest {
    pub fn total_duration(&self) -> f64 {
        self.segments.iter().map(|s| s.duration_secs).sum()
    }
}

#[async_trait]
pub trait BaseRenderer: Send + Sync {
    /// Render the final video and return its URL.
    async fn render_video(&self, request: &RenderRequest) -> Result<String>;
}
