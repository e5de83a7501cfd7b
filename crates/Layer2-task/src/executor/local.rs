//! Local launcher - spawns task processes directly on the host

use super::r#trait::{LaunchRequest, LaunchedProcess, Launcher};
use std::process::Stdio;
use taskd_foundation::{Error, Result};
use tokio::process::{Child, Command};
use tracing::debug;

/// Signal sent to a running job on stop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopSignal {
    /// Cooperative termination (SIGTERM on Unix)
    Terminate,
    /// Forced termination (SIGKILL on Unix)
    Kill,
}

/// Launcher that runs tasks directly on the host
///
/// On Unix each job leads its own process group, and stop signals go to the group.
#[derive(Debug, Clone, Default)]
pub struct LocalLauncher;

impl LocalLauncher {
    pub fn new() -> Self {
        Self
    }

    fn build_command(&self, program: &str, args: &[String], request: &LaunchRequest) -> Command {
        let mut cmd = Command::new(program);
        cmd.args(args)
            .current_dir(&request.working_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        #[cfg(unix)]
        cmd.process_group(0);

        cmd
    }
}

impl Launcher for LocalLauncher {
    fn launch(&self, request: &LaunchRequest) -> Result<LaunchedProcess> {
        if !request.working_dir.is_dir() {
            return Err(Error::launch(format!(
                "working directory '{}' does not exist or is not a directory",
                request.working_dir.display()
            )));
        }

        let argv = build_argv(&request.command, &request.args)?;
        let (program, args) = argv
            .split_first()
            .ok_or_else(|| Error::launch("empty command"))?;

        debug!(
            "Spawning '{}' with {} args in {}",
            program,
            args.len(),
            request.working_dir.display()
        );

        let child = self
            .build_command(program, args, request)
            .spawn()
            .map_err(|e| describe_spawn_error(program, e))?;

        let pid = child
            .id()
            .ok_or_else(|| Error::launch(format!("'{}' exited before a pid was assigned", program)))?;

        Ok(LaunchedProcess {
            pid,
            child,
            process_group: cfg!(unix),
        })
    }

    fn is_available(&self) -> bool {
        true
    }

    fn name(&self) -> &'static str {
        "local"
    }
}

/// Split `command` shell-style and append `extra` verbatim
pub fn build_argv(command: &str, extra: &[String]) -> Result<Vec<String>> {
    let mut argv = shlex::split(command)
        .ok_or_else(|| Error::launch(format!("unbalanced quoting in command '{}'", command)))?;
    if argv.is_empty() {
        return Err(Error::launch("empty command"));
    }
    argv.extend(extra.iter().cloned());
    Ok(argv)
}

fn describe_spawn_error(program: &str, err: std::io::Error) -> Error {
    match err.kind() {
        std::io::ErrorKind::NotFound => {
            Error::launch(format!("executable '{}' not found", program))
        }
        std::io::ErrorKind::PermissionDenied => {
            Error::launch(format!("permission denied executing '{}'", program))
        }
        _ => Error::launch(format!("failed to spawn '{}': {}", program, err)),
    }
}

/// Send a stop signal to a launched process (or its group)
///
/// A process that is already gone is not an error.
#[cfg(unix)]
pub fn deliver_signal(child: &mut Child, pid: u32, process_group: bool, signal: StopSignal) -> Result<()> {
    use nix::errno::Errno;
    use nix::sys::signal::{kill, killpg, Signal};
    use nix::unistd::Pid;

    // Reaped already; the pid may have been reused
    if child.id().is_none() {
        return Ok(());
    }

    let sig = match signal {
        StopSignal::Terminate => Signal::SIGTERM,
        StopSignal::Kill => Signal::SIGKILL,
    };
    let target = Pid::from_raw(pid as i32);

    let sent = if process_group {
        killpg(target, sig)
    } else {
        kill(target, sig)
    };

    match sent {
        Ok(()) | Err(Errno::ESRCH) => Ok(()),
        Err(e) => Err(Error::Internal(format!(
            "Failed to send {:?} to {}: {}",
            sig, pid, e
        ))),
    }
}

#[cfg(not(unix))]
pub fn deliver_signal(child: &mut Child, _pid: u32, _process_group: bool, signal: StopSignal) -> Result<()> {
    // No cooperative termination here; both signals end the process
    debug!("Stopping process with {:?}", signal);
    match child.start_kill() {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::InvalidInput => Ok(()),
        Err(e) => Err(Error::Internal(format!("Failed to kill process: {}", e))),
    }
}
