pub mod calendar;
pub mod scheduled_post;

pub use calendar::{PublishingCalendar, TimeSlot};
pub use scheduled_post::{PostUpdate, ScheduledPost, ScheduledPostStatus};
