// HTTP routes
pub mod calendars;
pub mod health;
pub mod jobs;
pub mod scheduled_posts;
pub mod series;
pub mod videos;

pub use health::*;
