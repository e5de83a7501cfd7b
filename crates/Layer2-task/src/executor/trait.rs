//! Launcher trait

use std::path::PathBuf;
use taskd_foundation::Result;
use tokio::process::Child;

/// What to spawn and where
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchRequest {
    /// Command line (split into program and arguments by the launcher)
    pub command: String,

    /// Extra arguments appended after the command's own
    pub args: Vec<String>,

    pub working_dir: PathBuf,
}

impl LaunchRequest {
    pub fn new(command: impl Into<String>, working_dir: impl Into<PathBuf>) -> Self {
        Self {
            command: command.into(),
            args: Vec::new(),
            working_dir: working_dir.into(),
        }
    }

    pub fn with_args(mut self, args: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }
}

/// A freshly spawned process with its pipes still attached
#[derive(Debug)]
pub struct LaunchedProcess {
    pub pid: u32,

    pub child: Child,

    /// The process leads its own process group, so signals go to the group
    pub process_group: bool,
}

/// Launcher trait - implement to add new process backends
///
/// `launch` must return without waiting for the process; it is called from
/// inside the runtime and only spawns.
pub trait Launcher: Send + Sync {
    /// Spawn the process described by `request`
    fn launch(&self, request: &LaunchRequest) -> Result<LaunchedProcess>;

    /// Check if the launcher can be used on this host
    fn is_available(&self) -> bool;

    /// Get launcher name
    fn name(&self) -> &'static str;
}
