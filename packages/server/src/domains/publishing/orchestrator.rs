//! Per-platform fan-out of a publish.
//!
//! ```text
//! publish(video, [youtube, instagram])
//!     ├─► youtube:   submit → wait_until_ready → publish ─┐
//!     └─► instagram: submit → wait_until_ready → publish ─┴─► PublishReport
//! ```
//!
//! Platforms run concurrently and fail independently. The report is the only
//! output; callers decide what the video status becomes.

use std::collections::BTreeMap;
use std::sync::Arc;

use anyhow::Result;
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::common::{PipelineError, Platform, PlatformOutcome};
use crate::domains::videos::models::Video;
use crate::kernel::platforms::{wait_until_ready, PlatformClient, PublishableMedia};
use crate::kernel::{with_deadline, ServerDeps};

/// Longest description sent to a platform.
const MAX_DESCRIPTION_CHARS: usize = 2000;

/// Outcome of one publish, per platform.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PublishReport {
    pub outcomes: BTreeMap<Platform, PlatformOutcome>,
}

impl PublishReport {
    pub fn any_succeeded(&self) -> bool {
        self.outcomes.values().any(|o| o.success)
    }

    /// Permalinks of the platforms that succeeded.
    pub fn published_links(&self) -> BTreeMap<Platform, String> {
        self.outcomes
            .iter()
            .filter_map(|(p, o)| o.url.clone().filter(|_| o.success).map(|url| (*p, url)))
            .collect()
    }

    /// One line naming every failed platform and its error.
    pub fn failure_summary(&self) -> Option<String> {
        let failures: Vec<String> = self
            .outcomes
            .iter()
            .filter(|(_, o)| !o.success)
            .map(|(p, o)| format!("{}: {}", p, o.error.as_deref().unwrap_or("unknown error")))
            .collect();
        (!failures.is_empty()).then(|| failures.join("; "))
    }
}

/// What a platform receives for `video`. Platform-specific optimizations win
/// over the generic title, script and hashtags.
pub fn publishable_media(video: &Video, platform: Platform) -> Option<PublishableMedia> {
    let video_url = video.video_url.clone()?;
    let optimized = video.platform_optimizations.get(&platform);

    let title = optimized
        .map(|o| o.title.clone())
        .filter(|t| !t.trim().is_empty())
        .unwrap_or_else(|| video.title.clone());
    let description = optimized
        .map(|o| o.description.clone())
        .filter(|d| !d.trim().is_empty())
        .unwrap_or_else(|| video.script.trim().chars().take(MAX_DESCRIPTION_CHARS).collect());
    let hashtags = optimized
        .map(|o| o.hashtags.clone())
        .filter(|h| !h.is_empty())
        .unwrap_or_else(|| video.hashtags.clone());

    Some(PublishableMedia {
        video_url,
        thumbnail_url: video.thumbnail_url.clone(),
        title,
        description,
        hashtags,
    })
}

/// Publish `video` to every platform in `platforms`.
///
/// Never fails as a whole: a missing client, a missing `video_url` or any
/// platform error is recorded for that platform only.
pub async fn publish(deps: &ServerDeps, video: &Video, platforms: &[Platform]) -> PublishReport {
    let mut targets = platforms.to_vec();
    targets.sort();
    targets.dedup();

    let attempts = targets.into_iter().map(|platform| async move {
        let outcome = match (deps.platforms.get(platform), publishable_media(video, platform)) {
            (None, _) => PlatformOutcome::failed(format!("no client configured for {}", platform)),
            (_, None) => PlatformOutcome::failed("video has no rendered file"),
            (Some(client), Some(media)) => match publish_one(deps, client, &media).await {
                Ok(permalink) => PlatformOutcome::published(permalink),
                Err(e) => PlatformOutcome::failed(format!("{:#}", e)),
            },
        };

        if outcome.success {
            info!(video_id = %video.id, %platform, url = ?outcome.url, "published");
        } else {
            warn!(video_id = %video.id, %platform, error = ?outcome.error, "publish failed");
        }
        (platform, outcome)
    });

    PublishReport {
        outcomes: join_all(attempts).await.into_iter().collect(),
    }
}

async fn publish_one(
    deps: &ServerDeps,
    client: Arc<dyn PlatformClient>,
    media: &PublishableMedia,
) -> Result<String> {
    let timeout = deps.settings.adapter_timeout;
    let platform = client.platform();

    let container_id = with_deadline(
        &format!("{} submit", platform),
        timeout,
        client.submit_media(media),
    )
    .await?;

    wait_until_ready(client.as_ref(), &container_id, deps.settings.poll_policy).await?;

    let published = with_deadline(
        &format!("{} publish", platform),
        timeout,
        client.publish(&container_id),
    )
    .await?;

    if published.permalink.is_empty() {
        return Err(PipelineError::data(format!("{} returned no permalink", platform)).into());
    }
    Ok(published.permalink)
}
