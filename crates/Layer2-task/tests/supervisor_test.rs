//! Supervisor 통합 테스트 - 실제 프로세스 실행/출력/정지 검증
//!
//! `cargo test -p taskd-task --test supervisor_test -- --nocapture`

#![cfg(unix)]

use std::sync::Arc;
use std::time::{Duration, Instant};
use taskd_foundation::Error;
use taskd_task::{JobState, JobSupervisor, ResolvedTask, StaticResolver, SupervisorConfig};
use tempfile::TempDir;

fn shell_task(name: &str, dir: &TempDir, script: &str) -> ResolvedTask {
    ResolvedTask::new(name, "sh -c", dir.path())
        .with_args([script])
        .allowlisted(true)
}

fn supervisor(resolver: StaticResolver, config: SupervisorConfig) -> JobSupervisor {
    JobSupervisor::new(Arc::new(resolver), config)
}

async fn wait_finished(supervisor: &JobSupervisor, pid: u32) -> JobState {
    let deadline = Instant::now() + Duration::from_secs(10);
    loop {
        let job = supervisor.get(pid).await.expect("job should exist");
        if job.state.is_terminal() {
            return job.state;
        }
        assert!(Instant::now() < deadline, "job {} did not finish in time", pid);
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}

#[tokio::test]
async fn test_start_returns_before_process_exits() {
    let dir = TempDir::new().unwrap();
    let resolver = StaticResolver::new().with_task(shell_task("slow", &dir, "sleep 5"));
    let supervisor = supervisor(resolver, SupervisorConfig::default());

    let begin = Instant::now();
    let started = supervisor.start("slow", Vec::new()).await.unwrap();
    assert!(begin.elapsed() < Duration::from_secs(2));
    assert!(started.pid > 0);
    assert_eq!(started.state, JobState::Running);

    let running = supervisor.running().await;
    assert_eq!(running.len(), 1);
    assert_eq!(running[0].pid, started.pid);

    let stopped = supervisor.stop(started.pid, Some(Duration::from_secs(2))).await.unwrap();
    assert_eq!(stopped.state, JobState::Stopped);
}

#[tokio::test]
async fn test_output_capture_and_exit_code() {
    let dir = TempDir::new().unwrap();
    let resolver = StaticResolver::new().with_task(shell_task(
        "noisy",
        &dir,
        "echo hello; echo oops >&2; exit 3",
    ));
    let supervisor = supervisor(resolver, SupervisorConfig::default());

    let started = supervisor.start("noisy", Vec::new()).await.unwrap();
    assert_eq!(wait_finished(&supervisor, started.pid).await, JobState::Completed(3));

    let output = supervisor.output(started.pid, None, false).await.unwrap();
    assert_eq!(output.total_lines, 2);
    assert!(output.lines.contains(&"hello".to_string()));
    assert!(output.lines.contains(&"[stderr] oops".to_string()));
    assert!(!output.truncated);
    assert!(output.truncation_notice.is_none());

    let job = supervisor.get(started.pid).await.unwrap();
    assert!(job.ended_at.is_some());
}

#[tokio::test]
async fn test_caller_args_are_appended() {
    let dir = TempDir::new().unwrap();
    let task = ResolvedTask::new("greet", "echo", dir.path())
        .with_args(["base"])
        .allowlisted(true);
    let supervisor = supervisor(StaticResolver::new().with_task(task), SupervisorConfig::default());

    let started = supervisor
        .start("greet", vec!["extra".into(), "two words".into()])
        .await
        .unwrap();
    wait_finished(&supervisor, started.pid).await;

    let output = supervisor.output(started.pid, None, false).await.unwrap();
    assert_eq!(output.lines, vec!["base extra two words"]);

    let job = supervisor.get(started.pid).await.unwrap();
    assert_eq!(job.args, vec!["extra", "two words"]);
}

#[tokio::test]
async fn test_output_truncation_keeps_tail() {
    let dir = TempDir::new().unwrap();
    let resolver = StaticResolver::new().with_task(shell_task(
        "flood",
        &dir,
        "i=1; while [ $i -le 20 ]; do echo line$i; i=$((i+1)); done",
    ));
    let config = SupervisorConfig::default().with_max_output_lines(5);
    let supervisor = supervisor(resolver, config);

    let started = supervisor.start("flood", Vec::new()).await.unwrap();
    assert_eq!(wait_finished(&supervisor, started.pid).await, JobState::Completed(0));

    let output = supervisor.output(started.pid, None, true).await.unwrap();
    assert_eq!(output.total_lines, 20);
    assert_eq!(output.lines, vec!["line16", "line17", "line18", "line19", "line20"]);
    assert!(output.truncated);
    assert!(output.truncation_notice.is_some());

    let tail = supervisor.output(started.pid, Some(2), false).await.unwrap();
    assert_eq!(tail.lines, vec!["line19", "line20"]);
    assert!(tail.truncation_notice.is_none());
}

#[tokio::test]
async fn test_long_lines_are_clipped() {
    let dir = TempDir::new().unwrap();
    let resolver = StaticResolver::new().with_task(shell_task(
        "wide",
        &dir,
        "printf 'abcdefghijklmnopqrstuvwxyz\\nok\\n'",
    ));
    let config = SupervisorConfig::default().with_max_line_bytes(10);
    let supervisor = supervisor(resolver, config);

    let started = supervisor.start("wide", Vec::new()).await.unwrap();
    wait_finished(&supervisor, started.pid).await;

    let output = supervisor.output(started.pid, None, false).await.unwrap();
    assert_eq!(output.total_lines, 2);
    assert!(output.lines[0].starts_with("abcdefghij"));
    assert!(output.lines[0].contains("line truncated"));
    assert_eq!(output.lines[1], "ok");
}

#[tokio::test]
async fn test_unknown_pid_is_job_not_found() {
    let supervisor = supervisor(StaticResolver::new(), SupervisorConfig::default());

    assert!(matches!(supervisor.get(99999).await, Err(Error::JobNotFound(99999))));
    assert!(matches!(
        supervisor.output(99999, None, false).await,
        Err(Error::JobNotFound(_))
    ));
    assert!(matches!(
        supervisor.stop(99999, None).await,
        Err(Error::JobNotFound(_))
    ));
}

#[tokio::test]
async fn test_resolution_errors_spawn_nothing() {
    let dir = TempDir::new().unwrap();
    let blocked = ResolvedTask::new("deploy", "echo deploy", dir.path());
    let supervisor = supervisor(StaticResolver::new().with_task(blocked), SupervisorConfig::default());

    assert!(matches!(
        supervisor.start("missing", Vec::new()).await,
        Err(Error::TaskNotFound(_))
    ));
    assert!(matches!(
        supervisor.start("deploy", Vec::new()).await,
        Err(Error::NotAllowlisted(_))
    ));
    assert!(supervisor.status(None).await.is_empty());
}

#[tokio::test]
async fn test_launch_failure_is_reported() {
    let dir = TempDir::new().unwrap();
    let task = ResolvedTask::new("broken", "no-such-program-for-taskd", dir.path()).allowlisted(true);
    let supervisor = supervisor(StaticResolver::new().with_task(task), SupervisorConfig::default());

    assert!(matches!(
        supervisor.start("broken", Vec::new()).await,
        Err(Error::Launch(_))
    ));
    assert_eq!(supervisor.stats().await.total, 0);
}

#[tokio::test]
async fn test_stop_cooperative_process() {
    let dir = TempDir::new().unwrap();
    let resolver = StaticResolver::new().with_task(shell_task("sleepy", &dir, "sleep 30"));
    let supervisor = supervisor(resolver, SupervisorConfig::default());

    let started = supervisor.start("sleepy", Vec::new()).await.unwrap();
    let stopped = supervisor.stop(started.pid, Some(Duration::from_secs(3))).await.unwrap();

    assert_eq!(stopped.state, JobState::Stopped);
    assert!(!stopped.already_finished);
    assert_eq!(stopped.grace_period_used, Duration::from_secs(3));
    assert!(supervisor.running().await.is_empty());
}

#[tokio::test]
async fn test_stop_escalates_to_kill() {
    let dir = TempDir::new().unwrap();
    let resolver = StaticResolver::new().with_task(shell_task(
        "stubborn",
        &dir,
        "trap '' TERM; while true; do sleep 0.1; done",
    ));
    let supervisor = supervisor(resolver, SupervisorConfig::default());

    let started = supervisor.start("stubborn", Vec::new()).await.unwrap();
    // Let the shell install its trap
    tokio::time::sleep(Duration::from_millis(300)).await;

    let begin = Instant::now();
    let stopped = supervisor.stop(started.pid, Some(Duration::from_secs(1))).await.unwrap();
    assert_eq!(stopped.state, JobState::Killed);
    assert!(begin.elapsed() >= Duration::from_secs(1));
    assert!(stopped.message.contains("killed"));
}

#[tokio::test]
async fn test_stop_exit_within_grace_while_pipes_stay_open() {
    let dir = TempDir::new().unwrap();
    // The background child ignores TERM and keeps stdout open after the leader exits
    let resolver = StaticResolver::new().with_task(shell_task(
        "lingering",
        &dir,
        "(trap '' TERM; sleep 3) & trap 'sleep 0.7; exit 0' TERM; while true; do sleep 0.05; done",
    ));
    let supervisor = supervisor(resolver, SupervisorConfig::default());

    let started = supervisor.start("lingering", Vec::new()).await.unwrap();
    tokio::time::sleep(Duration::from_millis(300)).await;

    let begin = Instant::now();
    let stopped = supervisor.stop(started.pid, Some(Duration::from_secs(1))).await.unwrap();
    assert_eq!(stopped.state, JobState::Stopped, "{}", stopped.message);
    assert!(begin.elapsed() < Duration::from_secs(3));
    assert_eq!(stopped.message, "Job stopped gracefully");
}

#[tokio::test]
async fn test_stop_finished_job_is_noop() {
    let dir = TempDir::new().unwrap();
    let resolver = StaticResolver::new().with_task(shell_task("quick", &dir, "true"));
    let supervisor = supervisor(resolver, SupervisorConfig::default());

    let started = supervisor.start("quick", Vec::new()).await.unwrap();
    wait_finished(&supervisor, started.pid).await;

    let first = supervisor.stop(started.pid, None).await.unwrap();
    let second = supervisor.stop(started.pid, None).await.unwrap();
    assert!(first.already_finished);
    assert_eq!(first.state, JobState::Completed(0));
    assert_eq!(first, second);
}

#[tokio::test]
async fn test_signal_death_without_stop_is_failure() {
    let dir = TempDir::new().unwrap();
    let resolver = StaticResolver::new().with_task(shell_task("suicide", &dir, "kill -9 $$"));
    let supervisor = supervisor(resolver, SupervisorConfig::default());

    let started = supervisor.start("suicide", Vec::new()).await.unwrap();
    match wait_finished(&supervisor, started.pid).await {
        JobState::Failed(reason) => assert!(reason.contains("signal 9"), "{}", reason),
        other => panic!("unexpected state: {:?}", other),
    }
}

#[tokio::test]
async fn test_concurrent_starts_get_distinct_jobs() {
    let dir = TempDir::new().unwrap();
    let resolver = StaticResolver::new().with_task(shell_task("nap", &dir, "sleep 5"));
    let supervisor = supervisor(resolver, SupervisorConfig::default());

    let (a, b) = tokio::join!(
        supervisor.start("nap", Vec::new()),
        supervisor.start("nap", Vec::new())
    );
    let (a, b) = (a.unwrap(), b.unwrap());
    assert_ne!(a.pid, b.pid);
    assert_ne!(a.job_id, b.job_id);

    let jobs = supervisor.status(Some("nap")).await;
    assert_eq!(jobs.len(), 2);
    assert_eq!(supervisor.stats().await.running, 2);

    supervisor.shutdown(Duration::from_secs(5)).await;
    assert_eq!(supervisor.stats().await.killed, 2);
}

#[tokio::test]
async fn test_concurrency_limit() {
    let dir = TempDir::new().unwrap();
    let resolver = StaticResolver::new().with_task(shell_task("nap", &dir, "sleep 5"));
    let config = SupervisorConfig::default().with_max_concurrent_jobs(1);
    let supervisor = supervisor(resolver, config);

    let first = supervisor.start("nap", Vec::new()).await.unwrap();
    assert!(matches!(
        supervisor.start("nap", Vec::new()).await,
        Err(Error::JobLimitReached(1))
    ));

    supervisor.stop(first.pid, Some(Duration::from_secs(2))).await.unwrap();
    let second = supervisor.start("nap", Vec::new()).await.unwrap();
    supervisor.stop(second.pid, Some(Duration::from_secs(2))).await.unwrap();
}

#[tokio::test]
async fn test_finished_jobs_are_evicted() {
    let dir = TempDir::new().unwrap();
    let resolver = StaticResolver::new().with_task(shell_task("quick", &dir, "true"));
    let config = SupervisorConfig::default().with_max_finished_jobs(2);
    let supervisor = supervisor(resolver, config);

    let mut pids = Vec::new();
    for _ in 0..4 {
        let started = supervisor.start("quick", Vec::new()).await.unwrap();
        wait_finished(&supervisor, started.pid).await;
        pids.push(started.pid);
    }

    // Eviction runs on start: the fourth start dropped the oldest finished job
    let jobs = supervisor.status(None).await;
    assert_eq!(jobs.len(), 3);
    assert!(matches!(supervisor.get(pids[0]).await, Err(Error::JobNotFound(_))));
    for pid in &pids[1..] {
        assert!(supervisor.get(*pid).await.is_ok());
    }
}

#[tokio::test]
async fn test_repeated_queries_are_stable() {
    let dir = TempDir::new().unwrap();
    let resolver = StaticResolver::new().with_task(shell_task("once", &dir, "echo done"));
    let supervisor = supervisor(resolver, SupervisorConfig::default());

    let started = supervisor.start("once", Vec::new()).await.unwrap();
    wait_finished(&supervisor, started.pid).await;

    let first = supervisor.output(started.pid, None, false).await.unwrap();
    let second = supervisor.output(started.pid, None, false).await.unwrap();
    assert_eq!(first, second);

    let status_a = supervisor.status(None).await;
    let status_b = supervisor.status(None).await;
    assert_eq!(status_a, status_b);
}
