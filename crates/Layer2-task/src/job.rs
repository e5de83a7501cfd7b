//! Job definition and types

use crate::executor::StopSignal;
use crate::log::SharedOutput;
use crate::state::JobState;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tokio::sync::{mpsc, watch};

/// Internal identifier for a job
///
/// Monotonic per supervisor, so it stays unique even when the OS reuses a pid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct JobId(pub u64);

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "job-{}", self.0)
    }
}

/// Progress of a stop request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub(crate) enum StopPhase {
    #[default]
    None,
    /// Termination signal sent, waiting out the grace period
    Terminating,
    /// Kill signal sent
    Killing,
}

/// A supervised process and everything known about it
#[derive(Debug)]
pub struct JobRecord {
    pub id: JobId,

    pub pid: u32,

    /// Task this job was started from
    pub unique_name: String,

    /// Command line as resolved at start
    pub command: String,

    /// Extra arguments supplied by the caller
    pub args: Vec<String>,

    pub working_dir: PathBuf,

    pub state: JobState,

    pub started_at: DateTime<Utc>,

    pub ended_at: Option<DateTime<Utc>>,

    pub(crate) output: SharedOutput,

    pub(crate) stop_phase: StopPhase,

    /// Terminal state captured when the process exited, before the pipes drain
    pub(crate) observed_exit: Option<JobState>,

    /// Signals for the watcher that owns the child
    pub(crate) control: mpsc::UnboundedSender<StopSignal>,

    /// Flips to true once the watcher has recorded the exit
    pub(crate) done: watch::Receiver<bool>,
}

impl JobRecord {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        id: JobId,
        pid: u32,
        unique_name: impl Into<String>,
        command: impl Into<String>,
        args: Vec<String>,
        working_dir: PathBuf,
        output: SharedOutput,
        control: mpsc::UnboundedSender<StopSignal>,
        done: watch::Receiver<bool>,
    ) -> Self {
        Self {
            id,
            pid,
            unique_name: unique_name.into(),
            command: command.into(),
            args,
            working_dir,
            state: JobState::Running,
            started_at: Utc::now(),
            ended_at: None,
            output,
            stop_phase: StopPhase::None,
            observed_exit: None,
            control,
            done,
        }
    }

    pub fn is_running(&self) -> bool {
        self.state.is_running()
    }

    /// Move to a terminal state. Returns false if the job already finished.
    pub(crate) fn finish(&mut self, state: JobState) -> bool {
        if self.state.is_terminal() || state.is_running() {
            return false;
        }
        self.state = state;
        self.ended_at = Some(Utc::now());
        true
    }

    pub fn output(&self) -> &SharedOutput {
        &self.output
    }

    /// Snapshot of the externally visible fields
    pub fn summary(&self) -> JobSummary {
        let output = self.output.read();
        JobSummary {
            id: self.id,
            pid: self.pid,
            unique_name: self.unique_name.clone(),
            command: self.command.clone(),
            args: self.args.clone(),
            working_dir: self.working_dir.clone(),
            state: self.state.clone(),
            started_at: self.started_at,
            ended_at: self.ended_at,
            total_lines: output.total_lines(),
            truncated: output.is_truncated(),
        }
    }
}

/// Owned view of a job, safe to hand out of the table lock
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobSummary {
    pub id: JobId,
    pub pid: u32,
    pub unique_name: String,
    pub command: String,
    pub args: Vec<String>,
    pub working_dir: PathBuf,
    pub state: JobState,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub total_lines: usize,
    pub truncated: bool,
}


#[cfg(test)]
mod tests {
    use super::test_support::record;
    use super::*;

    #[test]
    fn test_finish_is_monotonic() {
        let mut job = record(1, 100, "build");
        assert!(job.is_running());

        assert!(job.finish(JobState::Stopped));
        assert!(job.ended_at.is_some());

        assert!(!job.finish(JobState::Killed));
        assert_eq!(job.state, JobState::Stopped);
    }

    #[test]
    fn test_finish_rejects_running() {
        let mut job = record(1, 100, "build");
        assert!(!job.finish(JobState::Running));
        assert!(job.ended_at.is_none());
    }

    #[test]
    fn test_summary_reflects_output() {
        let job = record(7, 4242, "test");
        job.output.write().push_stdout("ok");

        let summary = job.summary();
        assert_eq!(summary.id, JobId(7));
        assert_eq!(summary.pid, 4242);
        assert_eq!(summary.total_lines, 1);
        assert_eq!(summary.state, JobState::Running);
        assert_eq!(JobId(7).to_string(), "job-7");
    }
}
