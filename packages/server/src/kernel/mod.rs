//! Kernel module - server infrastructure and dependencies.

pub mod deadline;
pub mod deps;
pub mod elevenlabs;
pub mod ffmpeg;
pub mod http;
pub mod jobs;
pub mod media_storage;
pub mod openai;
pub mod platforms;
pub mod scheduled_tasks;
pub mod store;
pub mod test_dependencies;
pub mod traits;

pub use deadline::with_deadline;
pub use deps::{PipelineSettings, ServerDeps, PLACEHOLDER_IMAGE_URL};
pub use elevenlabs::ElevenLabsClient;
pub use ffmpeg::FfmpegRenderer;
pub use media_storage::LocalMediaStorage;
pub use openai::OpenAiAdapter;
pub use scheduled_tasks::PublishScheduler;
pub use store::{MemoryStore, PipelineStore, PostgresStore};
pub use test_dependencies::TestDependencies;
pub use traits::*;
