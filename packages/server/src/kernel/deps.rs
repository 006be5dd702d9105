//! Server dependencies for job handlers and routes (using traits for testability)
//!
//! This module provides the central dependency container used by all domain
//! activities. All external services use trait abstractions so tests can swap
//! in the mocks from `test_dependencies`.

use std::sync::Arc;
use std::time::Duration;

use super::jobs::JobQueue;
use super::platforms::{PlatformRegistry, PollPolicy};
use super::store::PipelineStore;
use super::{BaseAI, BaseImageGenerator, BaseMediaStorage, BaseRenderer, BaseVoiceSynthesizer};

/// URL used in place of an image the provider failed to generate.
pub const PLACEHOLDER_IMAGE_URL: &str =
    "https://placeholder.com/400x300?text=Image+Generation+Failed";

/// Tunables for the pipeline steps.
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    /// Images generated per video.
    pub max_images: usize,
    /// Images generated per video inside a batch.
    pub batch_max_images: usize,
    /// Concurrent image generation calls per video.
    pub image_concurrency: usize,
    /// Pause between topics of a batch.
    pub batch_item_delay: Duration,
    /// Deadline for a single adapter call.
    pub adapter_timeout: Duration,
    pub render_timeout: Duration,
    pub poll_policy: PollPolicy,
    pub script_duration_secs: u32,
    pub default_voice_id: String,
    pub template: String,
    pub placeholder_image_url: String,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            max_images: 5,
            batch_max_images: 3,
            image_concurrency: 3,
            batch_item_delay: Duration::from_secs(2),
            adapter_timeout: Duration::from_secs(120),
            render_timeout: Duration::from_secs(15 * 60),
            poll_policy: PollPolicy::default(),
            script_duration_secs: 60,
            default_voice_id: "21m00Tcm4TlvDq8ikWAM".to_string(),
            template: "vertical".to_string(),
            placeholder_image_url: PLACEHOLDER_IMAGE_URL.to_string(),
        }
    }
}

/// Server dependencies accessible to job handlers and routes.
#[derive(Clone)]
pub struct ServerDeps {
    pub store: Arc<dyn PipelineStore>,
    pub job_queue: Arc<dyn JobQueue>,
    pub ai: Arc<dyn BaseAI>,
    pub images: Arc<dyn BaseImageGenerator>,
    pub voice: Arc<dyn BaseVoiceSynthesizer>,
    pub media_storage: Arc<dyn BaseMediaStorage>,
    pub renderer: Arc<dyn BaseRenderer>,
    /// Platform → publishing client.
    pub platforms: PlatformRegistry,
    pub settings: PipelineSettings,
}

impl ServerDeps {
    /// Create new ServerDeps with the given dependencies
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        store: Arc<dyn PipelineStore>,
        job_queue: Arc<dyn JobQueue>,
        ai: Arc<dyn BaseAI>,
        images: Arc<dyn BaseImageGenerator>,
        voice: Arc<dyn BaseVoiceSynthesizer>,
        media_storage: Arc<dyn BaseMediaStorage>,
        renderer: Arc<dyn BaseRenderer>,
        platforms: PlatformRegistry,
        settings: PipelineSettings,
    ) -> Self {
        Self {
            store,
            job_queue,
            ai,
            images,
            voice,
            media_storage,
            renderer,
            platforms,
            settings,
        }
    }
}
