use anyhow::Result;
use futures::stream::{self, StreamExt};
use tracing::{debug, info, warn};

use super::{is_final_failure, load_video, mark_video_failed};
use crate::common::PipelineError;
use crate::domains::videos::jobs::{GenerateContentJob, RenderVideoJob};
use crate::domains::videos::models::{MediaItem, Narration, Video, VideoStatus};
use crate::domains::videos::timestamps::estimate_timestamps;
use crate::kernel::jobs::{JobContext, JobQueueExt};
use crate::kernel::{with_deadline, ServerDeps};

pub fn thumbnail_prompt(title: &str) -> String {
    format!(
        "Create a professional thumbnail for a video titled \"{}\". Bold text overlay, \
         high contrast, eye-catching design, optimized for social media.",
        title
    )
}

/// `generate_content` job: produce every missing generated field, then hand
/// off to rendering.
pub async fn generate_content(
    job: GenerateContentJob,
    ctx: JobContext,
    deps: &ServerDeps,
) -> Result<()> {
    let mut video = load_video(deps, job.video_id).await?;

    match video.status {
        VideoStatus::Draft | VideoStatus::Processing | VideoStatus::Failed => {}
        status => {
            info!(video_id = %video.id, %status, "video already generated, skipping");
            return Ok(());
        }
    }

    video
        .transition_to(VideoStatus::Processing)
        .map_err(PipelineError::from)?;
    deps.store.save_video(&video).await?;

    if let Err(e) = run_generation(&mut video, deps.settings.max_images, deps).await {
        if is_final_failure(&e, &ctx) {
            mark_video_failed(deps, &mut video, &e).await;
        }
        return Err(e);
    }

    let render_job = deps
        .job_queue
        .enqueue(RenderVideoJob {
            video_id: video.id,
            follow_up: job.follow_up,
        })
        .await?;

    info!(video_id = %video.id, render_job_id = %render_job, "content generated, render queued");
    Ok(())
}

/// Run the generation steps in order, skipping any whose output is already
/// present and persisting after each one.
pub async fn run_generation(video: &mut Video, max_images: usize, deps: &ServerDeps) -> Result<()> {
    let settings = &deps.settings;
    let timeout = settings.adapter_timeout;

    if video.script.trim().is_empty() {
        let script = with_deadline(
            "generate_script",
            timeout,
            deps.ai.generate_script(&video.title, settings.script_duration_secs),
        )
        .await?;
        video.script = script;
        deps.store.save_video(video).await?;
        debug!(video_id = %video.id, "script generated");
    }

    if video.media.is_empty() {
        let mut prompts = with_deadline(
            "generate_image_prompts",
            timeout,
            deps.ai.generate_image_prompts(&video.script),
        )
        .await?;
        if prompts.is_empty() {
            prompts.push(video.title.clone());
        }
        prompts.truncate(max_images);

        video.media = generate_images(&prompts, deps)
            .await
            .into_iter()
            .map(MediaItem::generated_image)
            .collect();
        deps.store.save_video(video).await?;
        debug!(video_id = %video.id, images = video.media.len(), "images generated");
    }

    if video.narration.is_none() {
        let voice_id = settings.default_voice_id.clone();
        let audio = with_deadline(
            "synthesize_voice",
            timeout,
            deps.voice.synthesize_voice(&video.script, &voice_id),
        )
        .await?;
        let audio_url = with_deadline(
            "store_media",
            timeout,
            deps.media_storage.store_media(audio, "mp3"),
        )
        .await?;

        video.narration = Some(Narration {
            voice_id,
            text: video.script.clone(),
            audio_url,
        });
        video.captions = estimate_timestamps(&video.script);
        deps.store.save_video(video).await?;
        debug!(video_id = %video.id, captions = video.captions.len(), "narration generated");
    } else if video.captions.is_empty() {
        video.captions = estimate_timestamps(&video.script);
        deps.store.save_video(video).await?;
    }

    if video.hashtags.is_empty() {
        video.hashtags = with_deadline(
            "generate_hashtags",
            timeout,
            deps.ai.generate_hashtags(&video.title, "general"),
        )
        .await?;
        deps.store.save_video(video).await?;
    }

    if video.thumbnail_url.is_none() {
        let url = with_deadline(
            "generate_thumbnail",
            timeout,
            deps.images.generate_image(&thumbnail_prompt(&video.title)),
        )
        .await?;
        video.thumbnail_url = Some(url);
        deps.store.save_video(video).await?;
    }

    Ok(())
}

/// One URL per prompt, in prompt order. A failed image becomes the
/// placeholder URL.
async fn generate_images(prompts: &[String], deps: &ServerDeps) -> Vec<String> {
    let settings = &deps.settings;

    stream::iter(prompts.iter().cloned())
        .map(|prompt: String| async move {
            match with_deadline(
                "generate_image",
                settings.adapter_timeout,
                deps.images.generate_image(&prompt),
            )
            .await
            {
                Ok(url) => url,
                Err(e) => {
                    warn!(prompt = %prompt, error = %e, "image generation failed, using placeholder");
                    settings.placeholder_image_url.clone()
                }
            }
        })
        .buffered(settings.image_concurrency.max(1))
        .collect()
        .await
}
