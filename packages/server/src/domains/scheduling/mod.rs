//! Scheduling domain - when videos get published.
//!
//! - `models/` - ScheduledPost and PublishingCalendar
//! - `recurrence` - next fire time of a calendar
//! - `activities/` - post and calendar management, bulk planning, due scans

pub mod activities;
pub mod models;
pub mod recurrence;

pub use models::{PostUpdate, PublishingCalendar, ScheduledPost, ScheduledPostStatus, TimeSlot};
pub use recurrence::next_scheduled_at;
