//! Job state machine
//!
//! `Running` is the only non-terminal state. Every other state is final and a
//! job never returns to `Running` once it has left it.

use serde::{Deserialize, Serialize};

/// Possible states of a supervised job
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobState {
    /// Process is alive (or its exit has not been observed yet)
    Running,

    /// Process exited on its own with the given exit code
    Completed(i32),

    /// Process-level failure (wait error, fatal signal, unkillable on stop)
    Failed(String),

    /// Process exited cooperatively within the grace period of a stop request
    Stopped,

    /// Process was force-killed after the grace period elapsed
    Killed,
}

impl JobState {
    /// Check if this is a terminal state (cannot transition further)
    pub fn is_terminal(&self) -> bool {
        !self.is_running()
    }

    /// Check if job is currently running
    pub fn is_running(&self) -> bool {
        matches!(self, JobState::Running)
    }

    /// Check if the job finished with exit code 0
    pub fn is_success(&self) -> bool {
        matches!(self, JobState::Completed(0))
    }

    /// Exit code, for jobs that completed on their own
    pub fn exit_code(&self) -> Option<i32> {
        match self {
            JobState::Completed(code) => Some(*code),
            _ => None,
        }
    }

    /// Failure reason, for failed jobs
    pub fn reason(&self) -> Option<&str> {
        match self {
            JobState::Failed(reason) => Some(reason),
            _ => None,
        }
    }

    /// Get display name for the state
    pub fn display_name(&self) -> &'static str {
        match self {
            JobState::Running => "Running",
            JobState::Completed(_) => "Completed",
            JobState::Failed(_) => "Failed",
            JobState::Stopped => "Stopped",
            JobState::Killed => "Killed",
        }
    }
}

impl std::fmt::Display for JobState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobState::Completed(code) => write!(f, "Completed (exit {})", code),
            JobState::Failed(reason) => write!(f, "Failed: {}", reason),
            other => write!(f, "{}", other.display_name()),
        }
    }
}
