//! Durable background job infrastructure.
//!
//! - [`Job`] - job model and its SQL
//! - [`JobQueue`] - enqueue / claim / ack / fail, with [`PostgresJobQueue`]
//!   for production and [`MemoryJobQueue`] for tests
//! - [`JobRegistry`] - job type to typed handler
//! - [`JobRunner`] - pool of workers draining the queue
//!
//! ```text
//! API / scheduler / processor
//!     │
//!     └─► JobQueue::enqueue (pending, available_at)
//!
//! JobRunner worker
//!     ├─► JobQueue::claim (attempts += 1, lease)
//!     ├─► JobRegistry::execute (deserialize + handler)
//!     └─► mark_succeeded | mark_failed (retry with backoff or dead letter)
//! ```
//!
//! Processors live in their domains; this module only provides the plumbing.

mod job;
mod memory_queue;
mod queue;
mod registry;
mod runner;

pub use job::{
    EnqueueOptions, ErrorKind, Job, JobStatus, JobType, RetryPolicy, LEASE_EXPIRED_ERROR,
};
pub use memory_queue::MemoryJobQueue;
pub use queue::{CommandMeta, FailureOutcome, JobQueue, JobQueueExt, PostgresJobQueue};
pub use registry::{JobContext, JobRegistry, SharedJobRegistry};
pub use runner::{classify_error, JobRunner, JobRunnerConfig, RunnerHandle};
