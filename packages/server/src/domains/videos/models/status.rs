//! Video lifecycle state machine.
//!
//! ```text
//! draft ─► processing ─► completed ─► scheduled ─► publishing ─► published
//!              │   ▲          │  ▲        │   ▲          │
//!              │   └──┐       │  └────────┘   │          │
//!              ▼      │       ▼               │          ▼
//!            failed ──┴─────────────────────────────── failed
//! ```
//!
//! Pure decision logic, no IO.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::common::PipelineError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type, Default)]
#[sqlx(type_name = "video_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum VideoStatus {
    #[default]
    Draft,
    Processing,
    Completed,
    Scheduled,
    Publishing,
    Published,
    Failed,
}

impl VideoStatus {
    /// Whether `self → next` is a legal edge.
    pub fn can_transition_to(self, next: VideoStatus) -> bool {
        use VideoStatus::*;
        matches!(
            (self, next),
            (Draft, Processing)
                | (Processing, Processing)
                | (Processing, Completed)
                | (Processing, Failed)
                | (Completed, Scheduled)
                | (Completed, Publishing)
                | (Completed, Failed)
                | (Scheduled, Scheduled)
                | (Scheduled, Publishing)
                | (Scheduled, Completed)
                | (Scheduled, Failed)
                | (Publishing, Published)
                | (Publishing, Failed)
                | (Failed, Processing)
                | (Failed, Draft)
        )
    }

    pub fn is_terminal(self) -> bool {
        self == VideoStatus::Published
    }

    pub fn as_str(self) -> &'static str {
        match self {
            VideoStatus::Draft => "draft",
            VideoStatus::Processing => "processing",
            VideoStatus::Completed => "completed",
            VideoStatus::Scheduled => "scheduled",
            VideoStatus::Publishing => "publishing",
            VideoStatus::Published => "published",
            VideoStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for VideoStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransitionError {
    #[error("invalid video status transition from {from} to {to}")]
    Invalid { from: VideoStatus, to: VideoStatus },

    #[error("video cannot be completed without a video_url")]
    MissingVideoUrl,
}

impl From<TransitionError> for PipelineError {
    fn from(err: TransitionError) -> Self {
        PipelineError::data(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::VideoStatus::*;
    use super::*;

    const ALL: [VideoStatus; 7] = [
        Draft, Processing, Completed, Scheduled, Publishing, Published, Failed,
    ];

    #[test]
    fn happy_path_is_allowed() {
        let path = [Draft, Processing, Completed, Scheduled, Publishing, Published];
        for pair in path.windows(2) {
            assert!(pair[0].can_transition_to(pair[1]), "{} -> {}", pair[0], pair[1]);
        }
    }

    #[test]
    fn published_is_terminal() {
        for next in ALL {
            assert!(!Published.can_transition_to(next));
        }
    }

    #[test]
    fn published_is_only_reachable_from_publishing() {
        for from in ALL {
            assert_eq!(from.can_transition_to(Published), from == Publishing);
        }
    }

    #[test]
    fn cannot_skip_generation() {
        assert!(!Draft.can_transition_to(Completed));
        assert!(!Draft.can_transition_to(Scheduled));
        assert!(!Draft.can_transition_to(Publishing));
        assert!(!Processing.can_transition_to(Publishing));
    }

    #[test]
    fn retry_edges_leave_failed() {
        assert!(Failed.can_transition_to(Processing));
        assert!(Failed.can_transition_to(Draft));
        assert!(!Failed.can_transition_to(Completed));
        assert!(!Failed.can_transition_to(Published));
    }

    #[test]
    fn work_in_progress_states_can_fail() {
        for from in [Processing, Completed, Scheduled, Publishing] {
            assert!(from.can_transition_to(Failed));
        }
        assert!(!Draft.can_transition_to(Failed));
    }
}
