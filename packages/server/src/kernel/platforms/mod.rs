//! Social platform publishing clients.
//!
//! Every platform follows the same three-step protocol: submit the media
//! (creating a container), poll until the platform has processed it, then
//! publish the container. [`PlatformRegistry`] is the lookup table the
//! publish orchestrator dispatches through.

mod instagram;
mod polling;
mod youtube;

pub use instagram::{format_caption, InstagramClient};
pub use polling::{wait_until_ready, PollPolicy};
pub use youtube::YouTubeClient;

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::common::Platform;

/// What gets submitted to a platform.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PublishableMedia {
    pub video_url: String,
    pub thumbnail_url: Option<String>,
    pub title: String,
    pub description: String,
    pub hashtags: Vec<String>,
}

/// Processing state of a submitted container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MediaStatus {
    InProgress,
    Finished,
    Error(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublishedMedia {
    pub id: String,
    pub permalink: String,
}

#[async_trait]
pub trait PlatformClient: Send + Sync {
    fn platform(&self) -> Platform;

    /// Upload or register the media. Returns the container id.
    async fn submit_media(&self, media: &PublishableMedia) -> Result<String>;

    async fn poll_status(&self, container_id: &str) -> Result<MediaStatus>;

    /// Make a processed container public.
    async fn publish(&self, container_id: &str) -> Result<PublishedMedia>;
}

/// Platform → client lookup table.
#[derive(Clone, Default)]
pub struct PlatformRegistry {
    clients: HashMap<Platform, Arc<dyn PlatformClient>>,
}

impl PlatformRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a client under the platform it reports.
    pub fn register(&mut self, client: Arc<dyn PlatformClient>) {
        self.clients.insert(client.platform(), client);
    }

    pub fn with(mut self, client: Arc<dyn PlatformClient>) -> Self {
        self.register(client);
        self
    }

    pub fn get(&self, platform: Platform) -> Option<Arc<dyn PlatformClient>> {
        self.clients.get(&platform).cloned()
    }

    pub fn platforms(&self) -> Vec<Platform> {
        let mut platforms: Vec<Platform> = self.clients.keys().copied().collect();
        platforms.sort();
        platforms
    }
}
