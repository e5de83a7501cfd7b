//! # taskd-task
//!
//! Job supervision for taskd.
//! Launches task processes, captures their output and stops them on request.
//!
//! ## Features
//!
//! - Non-blocking start with one watcher task per job
//! - Bounded stdout/stderr capture with truncation tracking
//! - Graceful stop with SIGTERM, escalating to SIGKILL after a grace period
//! - Pluggable launch backends and task resolution

pub mod executor;
pub mod job;
pub mod log;
pub mod resolver;
pub mod state;
pub mod supervisor;
pub mod table;

// Supervisor
pub use supervisor::{
    JobStats, JobSupervisor, OutputResult, StartOutcome, StopOutcome, SupervisorConfig,
};

// Jobs
pub use job::{JobId, JobRecord, JobSummary};
pub use state::JobState;
pub use table::JobTable;

// Launch + resolution
pub use executor::{LaunchRequest, LaunchedProcess, Launcher, LocalLauncher, StopSignal};
pub use resolver::{ResolvedTask, StaticResolver, TaskResolver};

// Output capture
pub use log::{OutputBuffer, OutputLine, OutputSnapshot, OutputStream, SharedOutput};
