pub mod status;
pub mod video;

pub use status::{TransitionError, VideoStatus};
pub use video::{MediaItem, MediaKind, MediaSource, Narration, Video};
