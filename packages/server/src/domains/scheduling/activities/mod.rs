//! Scheduling activities: one-shot posts, recurring calendars, bulk planning
//! and the periodic due scans.

mod bulk;
mod calendars;
mod due_scan;
mod posts;

pub use bulk::{plan_bulk_schedule, schedule_bulk, scheduling_analytics, PlannedPost, SchedulingAnalytics};
pub use calendars::{
    create_calendar, delete_calendar, list_calendars, update_calendar, CalendarUpdate, NewCalendar,
};
pub use due_scan::{process_due_calendars, process_due_posts, DueScanSummary};
pub use posts::{
    cancel_scheduled_post, create_scheduled_post, list_due_posts, list_scheduled_posts,
    update_scheduled_post, NewScheduledPost,
};
