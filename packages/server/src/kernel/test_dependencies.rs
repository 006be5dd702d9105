// TestDependencies - mock implementations for testing
//
// Provides mock adapters plus the in-memory store and queue, wired into a
// ServerDeps for handler and route tests.

use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;

use super::jobs::{MemoryJobQueue, RetryPolicy};
use super::openai::parse_optimization;
use super::platforms::{
    MediaStatus, PlatformClient, PlatformRegistry, PollPolicy, PublishableMedia, PublishedMedia,
};
use super::store::MemoryStore;
use super::{
    BaseAI, BaseImageGenerator, BaseMediaStorage, BaseRenderer, BaseVoiceSynthesizer,
    PipelineSettings, RenderRequest, ServerDeps,
};
use crate::common::{ContentOptimization, PipelineError, PipelineErrorKind, Platform};

fn lock<T>(m: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|e| e.into_inner())
}

/// A failure a mock should raise.
#[derive(Debug, Clone)]
pub struct MockFailure {
    pub kind: PipelineErrorKind,
    pub message: String,
}

impl MockFailure {
    pub fn transient(message: impl Into<String>) -> Self {
        Self {
            kind: PipelineErrorKind::Transient,
            message: message.into(),
        }
    }

    pub fn data(message: impl Into<String>) -> Self {
        Self {
            kind: PipelineErrorKind::Data,
            message: message.into(),
        }
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self {
            kind: PipelineErrorKind::Configuration,
            message: message.into(),
        }
    }

    pub fn to_error(&self) -> anyhow::Error {
        let err = match self.kind {
            PipelineErrorKind::Transient => PipelineError::transient(&self.message),
            PipelineErrorKind::Data => PipelineError::data(&self.message),
            PipelineErrorKind::Configuration => PipelineError::configuration(&self.message),
        };
        err.into()
    }
}

/// Failures handed out one per call, then success.
#[derive(Default)]
struct FailureQueue(Mutex<VecDeque<MockFailure>>);

impl FailureQueue {
    fn push(&self, failure: MockFailure, times: usize) {
        let mut queue = lock(&self.0);
        for _ in 0..times {
            queue.push_back(failure.clone());
        }
    }

    fn next(&self) -> Result<()> {
        match lock(&self.0).pop_front() {
            Some(failure) => Err(failure.to_error()),
            None => Ok(()),
        }
    }
}

// =============================================================================
// Mock AI
// =============================================================================

pub struct MockAI {
    script: Mutex<String>,
    prompts: Mutex<Vec<String>>,
    hashtags: Mutex<Vec<String>>,
    topics: Mutex<Vec<String>>,
    optimization_response: Mutex<Option<String>>,
    script_failures: FailureQueue,
    calls: Mutex<Vec<String>>,
}

impl MockAI {
    pub fn new() -> Self {
        Self {
            script: Mutex::new("Octopuses have three hearts. They can taste with their arms!".into()),
            prompts: Mutex::new(
                (1..=5)
                    .map(|i| format!("scene {} of an octopus reef", i))
                    .collect(),
            ),
            hashtags: Mutex::new(vec!["octopus".into(), "ocean".into(), "facts".into()]),
            topics: Mutex::new(vec!["Why octopuses have blue blood".into()]),
            optimization_response: Mutex::new(None),
            script_failures: FailureQueue::default(),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn with_script(self, script: impl Into<String>) -> Self {
        *lock(&self.script) = script.into();
        self
    }

    pub fn with_prompts(self, prompts: Vec<&str>) -> Self {
        *lock(&self.prompts) = prompts.into_iter().map(String::from).collect();
        self
    }

    pub fn with_topics(self, topics: Vec<&str>) -> Self {
        *lock(&self.topics) = topics.into_iter().map(String::from).collect();
        self
    }

    /// Raw provider text returned for every platform optimization.
    pub fn with_optimization_response(self, raw: impl Into<String>) -> Self {
        *lock(&self.optimization_response) = Some(raw.into());
        self
    }

    /// Fail the next `times` script generations.
    pub fn failing_script(self, failure: MockFailure, times: usize) -> Self {
        self.script_failures.push(failure, times);
        self
    }

    /// Names of the methods called, in order.
    pub fn calls(&self) -> Vec<String> {
        lock(&self.calls).clone()
    }

    pub fn call_count(&self, method: &str) -> usize {
        lock(&self.calls).iter().filter(|c| *c == method).count()
    }

    fn record(&self, method: &str) {
        lock(&self.calls).push(method.to_string());
    }
}

impl Default for MockAI {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BaseAI for MockAI {
    async fn generate_script(&self, _topic: &str, _duration_secs: u32) -> Result<String> {
        self.record("generate_script");
        self.script_failures.next()?;
        Ok(lock(&self.script).clone())
    }

    async fn generate_image_prompts(&self, _script: &str) -> Result<Vec<String>> {
        self.record("generate_image_prompts");
        Ok(lock(&self.prompts).clone())
    }

    async fn generate_hashtags(&self, _topic: &str, _niche: &str) -> Result<Vec<String>> {
        self.record("generate_hashtags");
        Ok(lock(&self.hashtags).clone())
    }

    async fn optimize_for_platform(
        &self,
        content: &str,
        platform: Platform,
    ) -> Result<ContentOptimization> {
        self.record("optimize_for_platform");
        let raw = lock(&self.optimization_response).clone();
        match raw {
            Some(raw) => parse_optimization(&raw),
            None => Ok(ContentOptimization {
                title: format!("{} cut", platform),
                description: content.chars().take(40).collect(),
                hashtags: vec![platform.to_string()],
            }),
        }
    }

    async fn discover_topics(&self, _niche: &str) -> Result<Vec<String>> {
        self.record("discover_topics");
        Ok(lock(&self.topics).clone())
    }
}

// =============================================================================
// Mock Image Generator
// =============================================================================

/// Returns `https://images.test/{n}.png`; fails for prompts containing a
/// configured marker. Tracks peak concurrency.
pub struct MockImageGenerator {
    failing_markers: Mutex<HashSet<String>>,
    calls: Mutex<Vec<String>>,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
    latency: Duration,
}

impl MockImageGenerator {
    pub fn new() -> Self {
        Self {
            failing_markers: Mutex::new(HashSet::new()),
            calls: Mutex::new(Vec::new()),
            in_flight: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
            latency: Duration::from_millis(5),
        }
    }

    /// Fail every prompt containing `marker`.
    pub fn failing_on(self, marker: impl Into<String>) -> Self {
        lock(&self.failing_markers).insert(marker.into());
        self
    }

    pub fn prompts(&self) -> Vec<String> {
        lock(&self.calls).clone()
    }

    pub fn call_count(&self) -> usize {
        lock(&self.calls).len()
    }

    pub fn peak_concurrency(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

impl Default for MockImageGenerator {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BaseImageGenerator for MockImageGenerator {
    async fn generate_image(&self, prompt: &str) -> Result<String> {
        let n = {
            let mut calls = lock(&self.calls);
            calls.push(prompt.to_string());
            calls.len()
        };
        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(current, Ordering::SeqCst);
        tokio::time::sleep(self.latency).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        let fails = lock(&self.failing_markers)
            .iter()
            .any(|m| prompt.contains(m.as_str()));
        if fails {
            return Err(PipelineError::transient(format!("image provider rejected '{}'", prompt)).into());
        }
        Ok(format!("https://images.test/{}.png", n))
    }
}

// =============================================================================
// Mock Voice / Storage / Renderer
// =============================================================================

#[derive(Default)]
pub struct MockVoiceSynthesizer {
    calls: Mutex<Vec<(String, String)>>,
}

impl MockVoiceSynthesizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// (text, voice_id) pairs received.
    pub fn calls(&self) -> Vec<(String, String)> {
        lock(&self.calls).clone()
    }
}

#[async_trait]
impl BaseVoiceSynthesizer for MockVoiceSynthesizer {
    async fn synthesize_voice(&self, text: &str, voice_id: &str) -> Result<Vec<u8>> {
        lock(&self.calls).push((text.to_string(), voice_id.to_string()));
        Ok(b"ID3-mock-audio".to_vec())
    }
}

#[derive(Default)]
pub struct MockMediaStorage {
    stored: Mutex<Vec<(usize, String)>>,
}

impl MockMediaStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stored_count(&self) -> usize {
        lock(&self.stored).len()
    }
}

#[async_trait]
impl BaseMediaStorage for MockMediaStorage {
    async fn store_media(&self, bytes: Vec<u8>, extension: &str) -> Result<String> {
        let mut stored = lock(&self.stored);
        stored.push((bytes.len(), extension.to_string()));
        Ok(format!("https://media.test/{}.{}", stored.len(), extension))
    }
}

#[derive(Default)]
pub struct MockRenderer {
    requests: Mutex<Vec<RenderRequest>>,
    failures: FailureQueue,
}

impl MockRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing(self, failure: MockFailure, times: usize) -> Self {
        self.failures.push(failure, times);
        self
    }

    pub fn requests(&self) -> Vec<RenderRequest> {
        lock(&self.requests).clone()
    }
}

#[async_trait]
impl BaseRenderer for MockRenderer {
    async fn render_video(&self, request: &RenderRequest) -> Result<String> {
        let n = {
            let mut requests = lock(&self.requests);
            requests.push(request.clone());
            requests.len()
        };
        self.failures.next()?;
        Ok(format!("https://cdn.test/video-{}.mp4", n))
    }
}

// =============================================================================
// Mock Platform Client
// =============================================================================

/// Scripted behaviour of a [`MockPlatformClient`].
#[derive(Debug, Clone)]
pub enum PlatformBehavior {
    Succeed,
    FailSubmit(MockFailure),
    /// Container processing ends in an error status.
    ProcessingError(String),
    /// Never leaves the in-progress state.
    NeverReady,
}

pub struct MockPlatformClient {
    platform: Platform,
    behavior: PlatformBehavior,
    submissions: Mutex<Vec<PublishableMedia>>,
    polls: AtomicUsize,
    published: AtomicUsize,
}

impl MockPlatformClient {
    pub fn new(platform: Platform, behavior: PlatformBehavior) -> Self {
        Self {
            platform,
            behavior,
            submissions: Mutex::new(Vec::new()),
            polls: AtomicUsize::new(0),
            published: AtomicUsize::new(0),
        }
    }

    pub fn succeeding(platform: Platform) -> Self {
        Self::new(platform, PlatformBehavior::Succeed)
    }

    pub fn submissions(&self) -> Vec<PublishableMedia> {
        lock(&self.submissions).clone()
    }

    pub fn poll_count(&self) -> usize {
        self.polls.load(Ordering::SeqCst)
    }

    pub fn publish_count(&self) -> usize {
        self.published.load(Ordering::SeqCst)
    }

    pub fn permalink(platform: Platform, container_id: &str) -> String {
        format!("https://{}.test/{}", platform, container_id)
    }
}

#[async_trait]
impl PlatformClient for MockPlatformClient {
    fn platform(&self) -> Platform {
        self.platform
    }

    async fn submit_media(&self, media: &PublishableMedia) -> Result<String> {
        if let PlatformBehavior::FailSubmit(failure) = &self.behavior {
            return Err(failure.to_error());
        }
        let mut submissions = lock(&self.submissions);
        submissions.push(media.clone());
        Ok(format!("{}-container-{}", self.platform, submissions.len()))
    }

    async fn poll_status(&self, _container_id: &str) -> Result<MediaStatus> {
        self.polls.fetch_add(1, Ordering::SeqCst);
        Ok(match &self.behavior {
            PlatformBehavior::ProcessingError(reason) => MediaStatus::Error(reason.clone()),
            PlatformBehavior::NeverReady => MediaStatus::InProgress,
            _ => MediaStatus::Finished,
        })
    }

    async fn publish(&self, container_id: &str) -> Result<PublishedMedia> {
        self.published.fetch_add(1, Ordering::SeqCst);
        Ok(PublishedMedia {
            id: container_id.to_string(),
            permalink: Self::permalink(self.platform, container_id),
        })
    }
}

// =============================================================================
// TestDependencies
// =============================================================================

pub struct TestDependencies {
    pub store: Arc<MemoryStore>,
    pub job_queue: Arc<MemoryJobQueue>,
    pub ai: Arc<MockAI>,
    pub images: Arc<MockImageGenerator>,
    pub voice: Arc<MockVoiceSynthesizer>,
    pub media_storage: Arc<MockMediaStorage>,
    pub renderer: Arc<MockRenderer>,
    pub platforms: Vec<Arc<MockPlatformClient>>,
    pub settings: PipelineSettings,
}

impl TestDependencies {
    /// Succeeding mocks for YouTube and Instagram, no batch delay and a
    /// fast poller.
    pub fn new() -> Self {
        let settings = PipelineSettings {
            batch_item_delay: Duration::ZERO,
            poll_policy: PollPolicy {
                max_attempts: 3,
                interval: Duration::from_millis(1),
                call_timeout: Duration::from_secs(5),
            },
            ..PipelineSettings::default()
        };

        Self {
            store: Arc::new(MemoryStore::new()),
            job_queue: Arc::new(MemoryJobQueue::new(RetryPolicy::default())),
            ai: Arc::new(MockAI::new()),
            images: Arc::new(MockImageGenerator::new()),
            voice: Arc::new(MockVoiceSynthesizer::new()),
            media_storage: Arc::new(MockMediaStorage::new()),
            renderer: Arc::new(MockRenderer::new()),
            platforms: vec![
                Arc::new(MockPlatformClient::succeeding(Platform::Youtube)),
                Arc::new(MockPlatformClient::succeeding(Platform::Instagram)),
            ],
            settings,
        }
    }

    pub fn mock_ai(mut self, ai: MockAI) -> Self {
        self.ai = Arc::new(ai);
        self
    }

    pub fn mock_images(mut self, images: MockImageGenerator) -> Self {
        self.images = Arc::new(images);
        self
    }

    pub fn mock_renderer(mut self, renderer: MockRenderer) -> Self {
        self.renderer = Arc::new(renderer);
        self
    }

    /// Replace the client for `client.platform()`.
    pub fn mock_platform(mut self, client: MockPlatformClient) -> Self {
        self.platforms.retain(|c| c.platform() != client.platform());
        self.platforms.push(Arc::new(client));
        self
    }

    pub fn without_platform(mut self, platform: Platform) -> Self {
        self.platforms.retain(|c| c.platform() != platform);
        self
    }

    pub fn retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.job_queue = Arc::new(MemoryJobQueue::new(policy));
        self
    }

    pub fn settings(mut self, settings: PipelineSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn platform(&self, platform: Platform) -> Option<Arc<MockPlatformClient>> {
        self.platforms.iter().find(|c| c.platform() == platform).cloned()
    }

    /// Build a ServerDeps sharing these mocks.
    pub fn deps(&self) -> Arc<ServerDeps> {
        let mut platforms = PlatformRegistry::new();
        for client in &self.platforms {
            platforms.register(client.clone());
        }

        Arc::new(ServerDeps::new(
            self.store.clone(),
            self.job_queue.clone(),
            self.ai.clone(),
            self.images.clone(),
            self.voice.clone(),
            self.media_storage.clone(),
            self.renderer.clone(),
            platforms,
            self.settings.clone(),
        ))
    }

    pub fn into_deps(self) -> Arc<ServerDeps> {
        self.deps()
    }
}

impl Default for TestDependencies {
    fn default() -> Self {
        Self::new()
    }
}
