//! Video rendering through the `ffmpeg` binary.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, info};
use uuid::Uuid;

use super::{BaseMediaStorage, BaseRenderer, RenderRequest};
use crate::common::{Caption, PipelineError};

/// Output geometry of a named template.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TemplateSpec {
    pub width: u32,
    pub height: u32,
    pub fps: u32,
}

impl TemplateSpec {
    /// Unknown names fall back to the vertical short-form layout.
    pub fn named(template: &str) -> Self {
        match template {
            "landscape" | "youtube" => Self {
                width: 1920,
                height: 1080,
                fps: 30,
            },
            "square" => Self {
                width: 1080,
                height: 1080,
                fps: 30,
            },
            _ => Self {
                width: 1080,
                height: 1920,
                fps: 30,
            },
        }
    }
}

/// [`BaseRenderer`] that shells out to ffmpeg and stores the result through
/// [`BaseMediaStorage`].
pub struct FfmpegRenderer {
    ffmpeg_path: String,
    work_dir: PathBuf,
    storage: Arc<dyn BaseMediaStorage>,
}

impl FfmpegRenderer {
    pub fn new(
        ffmpeg_path: impl Into<String>,
        work_dir: impl Into<PathBuf>,
        storage: Arc<dyn BaseMediaStorage>,
    ) -> Self {
        Self {
            ffmpeg_path: ffmpeg_path.into(),
            work_dir: work_dir.into(),
            storage,
        }
    }
}

fn srt_time(seconds: f64) -> String {
    let total_ms = (seconds.max(0.0) * 1000.0).round() as u64;
    let (hours, rest) = (total_ms / 3_600_000, total_ms % 3_600_000);
    let (minutes, rest) = (rest / 60_000, rest % 60_000);
    let (secs, ms) = (rest / 1000, rest % 1000);
    format!("{:02}:{:02}:{:02},{:03}", hours, minutes, secs, ms)
}

/// SubRip subtitles for the captions, numbered from 1.
pub fn srt_content(captions: &[Caption]) -> String {
    captions
        .iter()
        .enumerate()
        .map(|(i, c)| {
            format!(
                "{}\n{} --> {}\n{}\n",
                i + 1,
                srt_time(c.start_time),
                srt_time(c.end_time),
                c.text
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Arguments for one ffmpeg invocation rendering `request` to `output`.
///
/// Inputs are the segment images (looped for their duration) followed by the
/// optional narration track. Segments are scaled to the template, concatenated
/// and optionally burned with `subtitles`.
pub fn build_ffmpeg_args(
    request: &RenderRequest,
    subtitles: Option<&Path>,
    output: &Path,
) -> Vec<String> {
    let spec = TemplateSpec::named(&request.template);
    let mut args: Vec<String> = vec!["-y".into()];

    for segment in &request.segments {
        args.extend([
            "-loop".into(),
            "1".into(),
            "-t".into(),
            format!("{:.3}", segment.duration_secs),
            "-i".into(),
            segment.image_url.clone(),
        ]);
    }
    if let Some(audio) = &request.audio_url {
        args.extend(["-i".into(), audio.clone()]);
    }

    let mut filters: Vec<String> = request
        .segments
        .iter()
        .enumerate()
        .map(|(i, _)| {
            format!(
                "[{i}:v]scale={w}:{h}:force_original_aspect_ratio=increase,crop={w}:{h},setsar=1,fps={fps}[v{i}]",
                w = spec.width,
                h = spec.height,
                fps = spec.fps,
            )
        })
        .collect();

    let labels: String = (0..request.segments.len())
        .map(|i| format!("[v{}]", i))
        .collect();
    let concat_out = if subtitles.is_some() { "[cat]" } else { "[outv]" };
    filters.push(format!(
        "{}concat=n={}:v=1:a=0{}",
        labels,
        request.segments.len(),
        concat_out
    ));
    if let Some(srt) = subtitles {
        filters.push(format!("[cat]subtitles='{}'[outv]", srt.display()));
    }

    args.extend([
        "-filter_complex".into(),
        filters.join(";"),
        "-map".into(),
        "[outv]".into(),
    ]);
    if request.audio_url.is_some() {
        args.extend([
            "-map".into(),
            format!("{}:a", request.segments.len()),
            "-c:a".into(),
            "aac".into(),
            "-shortest".into(),
        ]);
    }
    args.extend([
        "-c:v".into(),
        "libx264".into(),
        "-preset".into(),
        "medium".into(),
        "-crf".into(),
        "23".into(),
        "-pix_fmt".into(),
        "yuv420p".into(),
        output.display().to_string(),
    ]);
    args
}

#[async_trait]
impl BaseRenderer for FfmpegRenderer {
    async fn render_video(&self, request: &RenderRequest) -> Result<String> {
        if request.segments.is_empty() {
            return Err(PipelineError::data("cannot render a video without segments").into());
        }

        tokio::fs::create_dir_all(&self.work_dir)
            .await
            .with_context(|| format!("Failed to create work dir {}", self.work_dir.display()))?;

        let job = Uuid::new_v4();
        let output = self.work_dir.join(format!("{}.mp4", job));
        let srt = if request.captions.is_empty() {
            None
        } else {
            let path = self.work_dir.join(format!("{}.srt", job));
            tokio::fs::write(&path, srt_content(&request.captions))
                .await
                .context("Failed to write subtitles")?;
            Some(path)
        };

        let args = build_ffmpeg_args(request, srt.as_deref(), &output);
        debug!(segments = request.segments.len(), duration = request.total_duration(), "running ffmpeg");

        let result = Command::new(&self.ffmpeg_path)
            .args(&args)
            .kill_on_drop(true)
            .output()
            .await;

        let rendered: Result<Vec<u8>> = match result {
            Err(e) => Err(PipelineError::configuration(format!(
                "failed to start {}: {}",
                self.ffmpeg_path, e
            ))
            .into()),
            Ok(out) if !out.status.success() => {
                let stderr = String::from_utf8_lossy(&out.stderr);
                let tail: String = stderr.lines().rev().take(5).collect::<Vec<_>>().join(" | ");
                Err(PipelineError::transient(format!("ffmpeg exited with {}: {}", out.status, tail)).into())
            }
            Ok(_) => tokio::fs::read(&output)
                .await
                .context("Failed to read rendered video"),
        };

        if let Some(path) = &srt {
            let _ = tokio::fs::remove_file(path).await;
        }
        let _ = tokio::fs::remove_file(&output).await;

        let url = self.storage.store_media(rendered?, "mp4").await?;
        info!(%url, "video rendered");
        Ok(url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kernel::RenderSegment;

    fn request(audio: bool) -> RenderRequest {
        RenderRequest {
            segments: vec![
                RenderSegment {
                    image_url: "https://img/1.png".into(),
                    duration_secs: 3.0,
                },
                RenderSegment {
                    image_url: "https://img/2.png".into(),
                    duration_secs: 4.5,
                },
            ],
            audio_url: audio.then(|| "https://media/n.mp3".to_string()),
            captions: vec![],
            template: "vertical".into(),
        }
    }

    #[test]
    fn srt_is_numbered_with_millisecond_times() {
        let captions = vec![
            Caption {
                text: "Hello world".into(),
                start_time: 0.0,
                end_time: 0.8,
            },
            Caption {
                text: "Again".into(),
                start_time: 61.25,
                end_time: 3700.0,
            },
        ];
        assert_eq!(
            srt_content(&captions),
            "1\n00:00:00,000 --> 00:00:00,800\nHello world\n\n2\n00:01:01,250 --> 01:01:40,000\nAgain\n"
        );
    }

    #[test]
    fn args_loop_each_image_and_map_audio() {
        let args = build_ffmpeg_args(&request(true), None, Path::new("/tmp/out.mp4"));
        let joined = args.join(" ");

        assert!(joined.contains("-loop 1 -t 3.000 -i https://img/1.png"));
        assert!(joined.contains("-loop 1 -t 4.500 -i https://img/2.png"));
        assert!(joined.contains("-i https://media/n.mp3"));
        assert!(joined.contains("[v0][v1]concat=n=2:v=1:a=0[outv]"));
        assert!(joined.contains("-map 2:a"));
        assert_eq!(args.last().map(String::as_str), Some("/tmp/out.mp4"));
    }

    #[test]
    fn subtitles_are_chained_after_concat() {
        let args = build_ffmpeg_args(
            &request(false),
            Some(Path::new("/tmp/s.srt")),
            Path::new("/tmp/out.mp4"),
        );
        let joined = args.join(" ");
        assert!(joined.contains("concat=n=2:v=1:a=0[cat];[cat]subtitles='/tmp/s.srt'[outv]"));
        assert!(!joined.contains("-shortest"));
    }

    #[test]
    fn unknown_template_is_vertical() {
        assert_eq!(TemplateSpec::named("whatever").height, 1920);
        assert_eq!(TemplateSpec::named("landscape").width, 1920);
    }
}
