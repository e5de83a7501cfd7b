//! Task resolution seam between discovery/policy and the supervisor

use std::collections::HashMap;
use std::path::PathBuf;

/// A task ready to launch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedTask {
    pub unique_name: String,

    /// Full command line, e.g. `make build`
    pub command: String,

    /// Arguments placed after the command and before caller arguments
    pub args: Vec<String>,

    pub working_dir: PathBuf,

    /// Whether policy permits running this task
    pub allowlisted: bool,
}

impl ResolvedTask {
    pub fn new(
        unique_name: impl Into<String>,
        command: impl Into<String>,
        working_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            unique_name: unique_name.into(),
            command: command.into(),
            args: Vec::new(),
            working_dir: working_dir.into(),
            allowlisted: false,
        }
    }

    pub fn with_args(mut self, args: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn allowlisted(mut self, allowlisted: bool) -> Self {
        self.allowlisted = allowlisted;
        self
    }
}

/// Maps a unique task name to something runnable
pub trait TaskResolver: Send + Sync {
    /// `None` when no task has this name
    fn resolve(&self, unique_name: &str) -> Option<ResolvedTask>;
}

/// Fixed set of tasks, for embedding and tests
#[derive(Debug, Clone, Default)]
pub struct StaticResolver {
    tasks: HashMap<String, ResolvedTask>,
}

impl StaticResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_task(mut self, task: ResolvedTask) -> Self {
        self.tasks.insert(task.unique_name.clone(), task);
        self
    }
}

impl TaskResolver for StaticResolver {
    fn resolve(&self, unique_name: &str) -> Option<ResolvedTask> {
        self.tasks.get(unique_name).cloned()
    }
}
