//! Publishing domain - fan-out of a rendered video to social platforms.

pub mod orchestrator;

pub use orchestrator::{publish, publishable_media, PublishReport};
