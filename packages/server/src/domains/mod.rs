// Business domains
pub mod publishing;
pub mod scheduling;
pub mod series;
pub mod videos;

use crate::kernel::jobs::JobRegistry;

/// Registry with a handler for every job type.
pub fn job_registry() -> JobRegistry {
    let mut registry = JobRegistry::new();
    videos::register_video_jobs(&mut registry);
    registry
}
