//! Videos domain - generation, rendering, scheduling and publishing of a
//! single video.
//!
//! # Components
//!
//! - `models/` - Video entity and its status state machine
//! - `activities/` - Pipeline steps (generate, render, schedule, publish, optimize, batch)
//! - `jobs` - Job payloads and handler registration
//! - `timestamps` - Caption timing from narration text

pub mod activities;
pub mod jobs;
pub mod models;
pub mod timestamps;

pub use jobs::{
    register_video_jobs, BatchGenerateJob, FollowUp, GenerateContentJob, OptimizeContentJob,
    PublishVideoJob, RenderVideoJob, ScheduleVideoJob,
};
pub use models::{MediaItem, Narration, TransitionError, Video, VideoStatus};
pub use timestamps::estimate_timestamps;
