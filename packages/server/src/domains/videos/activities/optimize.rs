use std::collections::BTreeMap;

use anyhow::Result;
use tracing::debug;

use super::load_video;
use crate::common::{ContentOptimization, PipelineError, Platform, VideoId};
use crate::kernel::{with_deadline, ServerDeps};

/// Rewrite title, description and hashtags for each platform and store them
/// on the video. Results are saved after every platform.
///
/// Malformed provider output is a data error and stops the run.
pub async fn optimize_content(
    video_id: VideoId,
    platforms: &[Platform],
    deps: &ServerDeps,
) -> Result<BTreeMap<Platform, ContentOptimization>> {
    if platforms.is_empty() {
        return Err(PipelineError::data("at least one platform is required").into());
    }

    let mut video = load_video(deps, video_id).await?;
    let content = if video.script.trim().is_empty() {
        video.title.clone()
    } else {
        video.script.clone()
    };

    for platform in platforms {
        let optimization = with_deadline(
            "optimize_for_platform",
            deps.settings.adapter_timeout,
            deps.ai.optimize_for_platform(&content, *platform),
        )
        .await?;

        debug!(video_id = %video.id, %platform, title = %optimization.title, "content optimized");
        video.platform_optimizations.insert(*platform, optimization);
        deps.store.save_video(&video).await?;
    }

    Ok(video
        .platform_optimizations
        .into_iter()
        .filter(|(p, _)| platforms.contains(p))
        .collect())
}
