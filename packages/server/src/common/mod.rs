// Common types shared by the kernel and the domains

pub mod entity_ids;
pub mod error;
pub mod id;
pub mod types;

pub use entity_ids::*;
pub use error::{pipeline_error, pipeline_error_kind, PipelineError, PipelineErrorKind};
pub use id::Id;
pub use types::*;
