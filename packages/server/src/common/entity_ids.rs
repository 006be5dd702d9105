//! Typed ids for every persisted entity.

pub use super::id::Id;

// ============================================================================
// Entity marker types
// ============================================================================

/// Marker for background jobs.
pub struct BackgroundJob;

/// Marker for videos.
pub struct Video;

/// Marker for video series.
pub struct Series;

/// Marker for one-shot scheduled posts.
pub struct ScheduledPost;

/// Marker for recurring publishing calendars.
pub struct PublishingCalendar;

/// Marker for the owning user. Owners are trusted input.
pub struct Owner;

// ============================================================================
// Type aliases
// ============================================================================

pub type JobId = Id<BackgroundJob>;
pub type VideoId = Id<Video>;
pub type SeriesId = Id<Series>;
pub type ScheduledPostId = Id<ScheduledPost>;
pub type CalendarId = Id<PublishingCalendar>;
pub type OwnerId = Id<Owner>;
