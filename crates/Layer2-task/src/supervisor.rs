//! Job Supervisor - starts, tracks, queries and stops task processes
//!
//! Each job gets a watcher task that owns its `Child`. The watcher reads
//! both pipes into the job's output buffer, applies stop signals sent over
//! a control channel, and records the terminal state when the process exits.
//! Start returns as soon as the process is spawned.

use crate::executor::{deliver_signal, LaunchRequest, Launcher, LocalLauncher, StopSignal};
use crate::job::{JobId, JobRecord, JobSummary, StopPhase};
use crate::log::{OutputBuffer, OutputStream, SharedOutput};
use crate::resolver::TaskResolver;
use crate::state::JobState;
use crate::table::JobTable;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use taskd_foundation::{Error, Result, SupervisorSettings};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Child;
use tokio::sync::{mpsc, watch, RwLock};
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

// ============================================================================
// Configuration
// ============================================================================

#[derive(Debug, Clone)]
pub struct SupervisorConfig {
    /// Lines retained per job
    pub max_output_lines: usize,

    /// Bytes kept per line
    pub max_line_bytes: usize,

    /// Grace period when a stop request does not give one
    pub default_grace_period: Duration,

    /// How long to wait for exit after the kill signal
    pub kill_confirm_timeout: Duration,

    /// How long to keep reading pipes after the process exits
    pub output_drain_timeout: Duration,

    pub max_concurrent_jobs: usize,

    /// Finished jobs kept for status queries
    pub max_finished_jobs: usize,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self::from(&SupervisorSettings::default())
    }
}

impl From<&SupervisorSettings> for SupervisorConfig {
    fn from(settings: &SupervisorSettings) -> Self {
        Self {
            max_output_lines: settings.max_output_lines(),
            max_line_bytes: settings.max_line_bytes(),
            default_grace_period: Duration::from_secs(settings.default_grace_period_secs()),
            kill_confirm_timeout: Duration::from_millis(settings.kill_confirm_timeout_ms()),
            output_drain_timeout: Duration::from_millis(settings.output_drain_timeout_ms()),
            max_concurrent_jobs: settings.max_concurrent_jobs(),
            max_finished_jobs: settings.max_finished_jobs(),
        }
    }
}

impl SupervisorConfig {
    pub fn with_max_output_lines(mut self, lines: usize) -> Self {
        self.max_output_lines = lines.max(1);
        self
    }

    pub fn with_max_line_bytes(mut self, bytes: usize) -> Self {
        self.max_line_bytes = bytes.max(1);
        self
    }

    pub fn with_default_grace_period(mut self, grace: Duration) -> Self {
        self.default_grace_period = grace;
        self
    }

    pub fn with_kill_confirm_timeout(mut self, timeout: Duration) -> Self {
        self.kill_confirm_timeout = timeout;
        self
    }

    pub fn with_max_concurrent_jobs(mut self, max: usize) -> Self {
        self.max_concurrent_jobs = max;
        self
    }

    pub fn with_max_finished_jobs(mut self, max: usize) -> Self {
        self.max_finished_jobs = max;
        self
    }
}

// ============================================================================
// Results
// ============================================================================

/// Returned by `start` once the process exists
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StartOutcome {
    pub job_id: JobId,
    pub pid: u32,
    pub unique_name: String,
    pub state: JobState,
}

/// Returned by `stop`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StopOutcome {
    pub job_id: JobId,
    pub pid: u32,

    /// State after the stop sequence (or the prior state if already finished)
    pub state: JobState,

    pub message: String,

    pub grace_period_used: Duration,

    pub already_finished: bool,
}

/// Returned by `output`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputResult {
    pub job_id: JobId,
    pub pid: u32,
    pub lines: Vec<String>,
    pub total_lines: usize,
    pub retained_lines: usize,
    pub truncated: bool,

    /// Only set when requested and lines were evicted
    pub truncation_notice: Option<String>,
}

/// Job counts by state
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JobStats {
    pub total: usize,
    pub running: usize,
    pub completed: usize,
    pub failed: usize,
    pub stopped: usize,
    pub killed: usize,
}

// ============================================================================
// Supervisor
// ============================================================================

/// Owns every job started through it
#[derive(Clone)]
pub struct JobSupervisor {
    table: Arc<RwLock<JobTable>>,
    resolver: Arc<dyn TaskResolver>,
    launcher: Arc<dyn Launcher>,
    config: Arc<SupervisorConfig>,
    next_id: Arc<AtomicU64>,
    watchers: Arc<Mutex<JoinSet<()>>>,
}

impl JobSupervisor {
    pub fn new(resolver: Arc<dyn TaskResolver>, config: SupervisorConfig) -> Self {
        Self::with_launcher(resolver, Arc::new(LocalLauncher::new()), config)
    }

    pub fn with_launcher(
        resolver: Arc<dyn TaskResolver>,
        launcher: Arc<dyn Launcher>,
        config: SupervisorConfig,
    ) -> Self {
        Self {
            table: Arc::new(RwLock::new(JobTable::new(config.max_finished_jobs))),
            resolver,
            launcher,
            config: Arc::new(config),
            next_id: Arc::new(AtomicU64::new(1)),
            watchers: Arc::new(Mutex::new(JoinSet::new())),
        }
    }

    pub fn config(&self) -> &SupervisorConfig {
        &self.config
    }

    // ========================================================================
    // Start
    // ========================================================================

    /// Launch a task and return immediately with its pid
    ///
    /// `args` are appended after the task's own command and arguments.
    pub async fn start(&self, unique_name: &str, args: Vec<String>) -> Result<StartOutcome> {
        let task = self
            .resolver
            .resolve(unique_name)
            .ok_or_else(|| Error::TaskNotFound(unique_name.to_string()))?;

        if !task.allowlisted {
            warn!("Refusing to start task '{}': not allowlisted", unique_name);
            return Err(Error::NotAllowlisted(unique_name.to_string()));
        }

        let mut full_args = task.args.clone();
        full_args.extend(args.iter().cloned());
        let request = LaunchRequest {
            command: task.command.clone(),
            args: full_args,
            working_dir: task.working_dir.clone(),
        };

        // Limit check, spawn and insert happen under one write lock
        let mut table = self.table.write().await;
        let running = table.running_count();
        if running >= self.config.max_concurrent_jobs {
            return Err(Error::JobLimitReached(self.config.max_concurrent_jobs));
        }

        let launched = self.launcher.launch(&request)?;
        let id = JobId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let pid = launched.pid;

        let output = OutputBuffer::shared(self.config.max_output_lines, self.config.max_line_bytes);
        let (control_tx, control_rx) = mpsc::unbounded_channel();
        let (done_tx, done_rx) = watch::channel(false);

        table.insert(JobRecord::new(
            id,
            pid,
            task.unique_name.clone(),
            task.command.clone(),
            args,
            task.working_dir.clone(),
            Arc::clone(&output),
            control_tx,
            done_rx,
        ));
        let evicted = table.evict_finished();
        drop(table);

        if !evicted.is_empty() {
            debug!("Evicted {} finished jobs", evicted.len());
        }

        let watcher = Watcher {
            id,
            pid,
            child: launched.child,
            process_group: launched.process_group,
            output,
            table: Arc::clone(&self.table),
            control: control_rx,
            done: done_tx,
            max_line_bytes: self.config.max_line_bytes,
            drain_timeout: self.config.output_drain_timeout,
        };

        {
            let mut watchers = self.watchers.lock();
            while watchers.try_join_next().is_some() {}
            watchers.spawn(watcher.run());
        }

        info!(
            "Started {} '{}' (pid {}) via {}: {}",
            id,
            task.unique_name,
            pid,
            self.launcher.name(),
            task.command
        );

        Ok(StartOutcome {
            job_id: id,
            pid,
            unique_name: task.unique_name,
            state: JobState::Running,
        })
    }

    // ========================================================================
    // Queries
    // ========================================================================

    /// All known jobs in start order, optionally filtered by task name
    pub async fn status(&self, unique_name: Option<&str>) -> Vec<JobSummary> {
        let table = self.table.read().await;
        table
            .iter()
            .filter(|job| unique_name.map_or(true, |name| job.unique_name == name))
            .map(JobRecord::summary)
            .collect()
    }

    /// Jobs that are still running
    pub async fn running(&self) -> Vec<JobSummary> {
        let table = self.table.read().await;
        table.running().map(JobRecord::summary).collect()
    }

    /// Single job by pid
    pub async fn get(&self, pid: u32) -> Result<JobSummary> {
        let table = self.table.read().await;
        table
            .by_pid(pid)
            .map(JobRecord::summary)
            .ok_or(Error::JobNotFound(pid))
    }

    /// Tail of a job's output
    ///
    /// `max_lines` of `None` returns everything retained.
    pub async fn output(
        &self,
        pid: u32,
        max_lines: Option<usize>,
        show_truncation: bool,
    ) -> Result<OutputResult> {
        let (job_id, output) = {
            let table = self.table.read().await;
            let job = table.by_pid(pid).ok_or(Error::JobNotFound(pid))?;
            (job.id, Arc::clone(&job.output))
        };

        let snapshot = output.read().snapshot(max_lines);
        let truncation_notice = (show_truncation && snapshot.truncated).then(|| {
            format!(
                "Output truncated: showing the last {} of {} lines",
                snapshot.retained_lines, snapshot.total_lines
            )
        });

        Ok(OutputResult {
            job_id,
            pid,
            lines: snapshot.lines,
            total_lines: snapshot.total_lines,
            retained_lines: snapshot.retained_lines,
            truncated: snapshot.truncated,
            truncation_notice,
        })
    }

    pub async fn stats(&self) -> JobStats {
        let table = self.table.read().await;
        let mut stats = JobStats::default();
        for job in table.iter() {
            stats.total += 1;
            match job.state {
                JobState::Running => stats.running += 1,
                JobState::Completed(_) => stats.completed += 1,
                JobState::Failed(_) => stats.failed += 1,
                JobState::Stopped => stats.stopped += 1,
                JobState::Killed => stats.killed += 1,
            }
        }
        stats
    }

    // ========================================================================
    // Stop
    // ========================================================================

    /// Terminate a job, escalating to a kill after the grace period
    ///
    /// Waits until the outcome is known. Stopping a finished job is a no-op.
    pub async fn stop(&self, pid: u32, grace_period: Option<Duration>) -> Result<StopOutcome> {
        let grace = grace_period.unwrap_or(self.config.default_grace_period);

        let (id, control, mut done) = {
            let mut table = self.table.write().await;
            let job = table.by_pid_mut(pid).ok_or(Error::JobNotFound(pid))?;

            if job.state.is_terminal() {
                return Ok(StopOutcome {
                    job_id: job.id,
                    pid,
                    state: job.state.clone(),
                    message: format!("Job already finished: {}", job.state),
                    grace_period_used: Duration::ZERO,
                    already_finished: true,
                });
            }

            if job.stop_phase == StopPhase::None {
                job.stop_phase = StopPhase::Terminating;
            }
            (job.id, job.control.clone(), job.done.clone())
        };

        info!("Stopping {} (pid {}) with {:?} grace period", id, pid, grace);
        // A closed channel means the watcher is already finishing
        let _ = control.send(StopSignal::Terminate);

        if !wait_done(&mut done, grace).await {
            // The process may have exited in time with its pipes still draining
            let exited = {
                let mut table = self.table.write().await;
                match table.get_mut(id) {
                    Some(job) if job.is_running() && job.observed_exit.is_none() => {
                        job.stop_phase = StopPhase::Killing;
                        false
                    }
                    _ => true,
                }
            };

            let confirm = if exited {
                self.config.output_drain_timeout
            } else {
                warn!("{} (pid {}) ignored termination, killing", id, pid);
                let _ = control.send(StopSignal::Kill);
                self.config.kill_confirm_timeout
            };

            if !wait_done(&mut done, confirm).await {
                let mut table = self.table.write().await;
                if let Some(job) = table.get_mut(id) {
                    let state = job.observed_exit.clone().unwrap_or_else(|| {
                        JobState::Failed(format!(
                            "process did not exit within {}ms of the kill signal",
                            self.config.kill_confirm_timeout.as_millis()
                        ))
                    });
                    job.finish(state);
                }
            }
        }

        let state = {
            let table = self.table.read().await;
            table
                .get(id)
                .map(|job| job.state.clone())
                .ok_or(Error::JobNotFound(pid))?
        };

        let message = match &state {
            JobState::Stopped => "Job stopped gracefully".to_string(),
            JobState::Killed => format!(
                "Job killed after {}s grace period elapsed",
                grace.as_secs()
            ),
            other => format!("Job ended: {}", other),
        };

        Ok(StopOutcome {
            job_id: id,
            pid,
            state,
            message,
            grace_period_used: grace,
            already_finished: false,
        })
    }

    /// Kill every running job and wait (bounded) for watchers to record exits
    pub async fn shutdown(&self, timeout: Duration) {
        let controls: Vec<_> = {
            let mut table = self.table.write().await;
            let ids: Vec<JobId> = table.running().map(|job| job.id).collect();
            ids.into_iter()
                .filter_map(|id| {
                    let job = table.get_mut(id)?;
                    job.stop_phase = StopPhase::Killing;
                    Some(job.control.clone())
                })
                .collect()
        };

        if !controls.is_empty() {
            info!("Shutting down: killing {} running jobs", controls.len());
        }
        for control in &controls {
            let _ = control.send(StopSignal::Kill);
        }

        let mut watchers = std::mem::take(&mut *self.watchers.lock());
        let joined = tokio::time::timeout(timeout, async {
            while watchers.join_next().await.is_some() {}
        })
        .await;

        if joined.is_err() {
            warn!("Shutdown timed out; abandoning {} watchers", watchers.len());
            watchers.abort_all();
        }
    }
}

impl std::fmt::Debug for JobSupervisor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobSupervisor")
            .field("launcher", &self.launcher.name())
            .field("config", &self.config)
            .finish()
    }
}

/// True once the watcher has signalled completion within `timeout`
async fn wait_done(done: &mut watch::Receiver<bool>, timeout: Duration) -> bool {
    match tokio::time::timeout(timeout, done.wait_for(|finished| *finished)).await {
        Ok(Ok(_)) => true,
        // Sender dropped: the watcher is gone
        Ok(Err(_)) => true,
        Err(_) => false,
    }
}

// ============================================================================
// Watcher
// ============================================================================

struct Watcher {
    id: JobId,
    pid: u32,
    child: Child,
    process_group: bool,
    output: SharedOutput,
    table: Arc<RwLock<JobTable>>,
    control: mpsc::UnboundedReceiver<StopSignal>,
    done: watch::Sender<bool>,
    max_line_bytes: usize,
    drain_timeout: Duration,
}

impl Watcher {
    async fn run(mut self) {
        // One byte past the cap so the buffer sees the line was long
        let read_cap = self.max_line_bytes.saturating_add(1);
        let mut readers = JoinSet::new();
        if let Some(stdout) = self.child.stdout.take() {
            readers.spawn(capture(stdout, OutputStream::Stdout, Arc::clone(&self.output), read_cap));
        }
        if let Some(stderr) = self.child.stderr.take() {
            readers.spawn(capture(stderr, OutputStream::Stderr, Arc::clone(&self.output), read_cap));
        }

        let exit = loop {
            tokio::select! {
                status = self.child.wait() => break status,
                Some(signal) = self.control.recv() => {
                    debug!("{} (pid {}): delivering {:?}", self.id, self.pid, signal);
                    if let Err(e) = deliver_signal(&mut self.child, self.pid, self.process_group, signal) {
                        warn!("{}", e);
                    }
                }
            }
        };

        // Capture the outcome now; a stop that is waiting must not escalate
        // while descendants keep the pipes open
        let state = {
            let mut table = self.table.write().await;
            table.get_mut(self.id).map(|job| {
                let state = exit_state(exit, job.stop_phase);
                job.observed_exit = Some(state.clone());
                state
            })
        };

        let drained = tokio::time::timeout(self.drain_timeout, async {
            while readers.join_next().await.is_some() {}
        })
        .await;
        if drained.is_err() {
            debug!("{}: output drain timed out", self.id);
            readers.abort_all();
        }

        if let Some(state) = state {
            let mut table = self.table.write().await;
            if let Some(job) = table.get_mut(self.id) {
                info!("{} (pid {}) finished: {}", self.id, self.pid, state);
                job.finish(state);
            }
        }

        let _ = self.done.send(true);
    }
}

fn exit_state(exit: std::io::Result<std::process::ExitStatus>, phase: StopPhase) -> JobState {
    let status = match exit {
        Ok(status) => status,
        Err(e) => return JobState::Failed(format!("failed to wait for process: {}", e)),
    };

    match phase {
        StopPhase::Killing => JobState::Killed,
        StopPhase::Terminating => JobState::Stopped,
        StopPhase::None => match status.code() {
            Some(code) => JobState::Completed(code),
            None => JobState::Failed(describe_abnormal_exit(&status)),
        },
    }
}

#[cfg(unix)]
fn describe_abnormal_exit(status: &std::process::ExitStatus) -> String {
    use std::os::unix::process::ExitStatusExt;
    match status.signal() {
        Some(signal) => format!("terminated by signal {}", signal),
        None => "exited without a status code".to_string(),
    }
}

#[cfg(not(unix))]
fn describe_abnormal_exit(_status: &std::process::ExitStatus) -> String {
    "exited without a status code".to_string()
}

/// Read one pipe into the buffer until EOF
async fn capture<R>(pipe: R, stream: OutputStream, output: SharedOutput, read_cap: usize)
where
    R: AsyncRead + Unpin,
{
    let mut reader = BufReader::new(pipe);
    let mut buf = Vec::with_capacity(256);

    loop {
        match read_line_capped(&mut reader, &mut buf, read_cap).await {
            Ok(true) => {
                if buf.last() == Some(&b'\r') {
                    buf.pop();
                }
                let line = String::from_utf8_lossy(&buf).into_owned();
                output.write().push(stream, line);
            }
            Ok(false) => break,
            Err(e) => {
                debug!("{} read error: {}", stream.as_str(), e);
                break;
            }
        }
    }
}

/// Read up to the next newline, keeping at most `cap` bytes of it
///
/// Returns false at EOF with nothing read. The newline is not stored.
async fn read_line_capped<R>(reader: &mut R, buf: &mut Vec<u8>, cap: usize) -> std::io::Result<bool>
where
    R: AsyncBufRead + Unpin,
{
    buf.clear();
    let mut read_any = false;

    loop {
        let available = reader.fill_buf().await?;
        if available.is_empty() {
            return Ok(read_any);
        }
        read_any = true;

        let newline = available.iter().position(|b| *b == b'\n');
        let chunk = match newline {
            Some(i) => &available[..i],
            None => available,
        };

        let room = cap.saturating_sub(buf.len());
        buf.extend_from_slice(&chunk[..chunk.len().min(room)]);

        let consumed = chunk.len() + usize::from(newline.is_some());
        reader.consume(consumed);

        if newline.is_some() {
            return Ok(true);
        }
    }
}
