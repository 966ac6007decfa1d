use crate::phase::RunPhase;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Per-state job counts reported by the scheduler at a point in time.
///
/// Recomputed on every poll; never persisted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobCounts {
    pub pending: u32,
    pub running: u32,
    pub succeeded: u32,
    pub failed: u32,
}

impl JobCounts {
    pub fn total(&self) -> u32 {
        self.pending + self.running + self.succeeded + self.failed
    }

    pub fn in_flight(&self) -> u32 {
        self.pending + self.running
    }
}

impl fmt::Display for JobCounts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Pending {} Running {} Succeeded {} Failed {}",
            self.pending, self.running, self.succeeded, self.failed
        )
    }
}

/// Snapshot of the run handed to callers: the derived phase, the counts it
/// was derived from, and a human-readable summary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusReport {
    pub phase: RunPhase,
    pub counts: JobCounts,
    pub message: String,
}

impl StatusReport {
    pub fn new(phase: RunPhase, counts: JobCounts, message: impl Into<String>) -> Self {
        StatusReport {
            phase,
            counts,
            message: message.into(),
        }
    }
}
