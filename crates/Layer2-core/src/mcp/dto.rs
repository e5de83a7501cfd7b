//! 도구 응답 payload
//!
//! 내부 타입을 프로토콜에 노출하는 JSON 형태로 변환합니다.

use crate::registry::TaskEntry;
use serde::Serialize;
use taskd_task::{JobSummary, OutputResult, StartOutcome, StopOutcome};

/// `list_tasks` 항목
#[derive(Debug, Clone, Serialize)]
pub struct TaskDto {
    pub unique_name: String,
    pub source_name: String,
    pub runner: String,
    pub command: String,
    pub runner_available: bool,
    pub allowlisted: bool,
    pub file_path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl From<&TaskEntry> for TaskDto {
    fn from(entry: &TaskEntry) -> Self {
        Self {
            unique_name: entry.unique_name.clone(),
            source_name: entry.source_name.clone(),
            runner: entry.runner.name().to_string(),
            command: entry.command.clone(),
            runner_available: entry.runner_available,
            allowlisted: entry.allowlisted,
            file_path: entry.file_path.display().to_string(),
            description: entry.description.clone(),
        }
    }
}

/// Job 요약
#[derive(Debug, Clone, Serialize)]
pub struct JobDto {
    pub pid: u32,
    pub job_id: u64,
    pub unique_name: String,
    pub state: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    pub command: String,
    pub args: Vec<String>,
    pub started_at: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ended_at: Option<String>,
    pub total_lines: usize,
    pub truncated: bool,
}

impl From<&JobSummary> for JobDto {
    fn from(job: &JobSummary) -> Self {
        Self {
            pid: job.pid,
            job_id: job.id.0,
            unique_name: job.unique_name.clone(),
            state: job.state.display_name().to_string(),
            exit_code: job.state.exit_code(),
            reason: job.state.reason().map(str::to_string),
            command: job.command.clone(),
            args: job.args.clone(),
            started_at: job.started_at.to_rfc3339(),
            ended_at: job.ended_at.map(|t| t.to_rfc3339()),
            total_lines: job.total_lines,
            truncated: job.truncated,
        }
    }
}

/// `task_start` 결과
#[derive(Debug, Clone, Serialize)]
pub struct StartDto {
    pub pid: u32,
    pub job_id: u64,
    pub unique_name: String,
    pub state: String,
}

impl From<&StartOutcome> for StartDto {
    fn from(outcome: &StartOutcome) -> Self {
        Self {
            pid: outcome.pid,
            job_id: outcome.job_id.0,
            unique_name: outcome.unique_name.clone(),
            state: outcome.state.display_name().to_string(),
        }
    }
}

/// `task_output` 결과
#[derive(Debug, Clone, Serialize)]
pub struct OutputDto {
    pub pid: u32,
    pub lines: Vec<String>,
    pub total_lines: usize,
    pub truncated: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub truncation_notice: Option<String>,
}

impl From<OutputResult> for OutputDto {
    fn from(result: OutputResult) -> Self {
        Self {
            pid: result.pid,
            lines: result.lines,
            total_lines: result.total_lines,
            truncated: result.truncated,
            truncation_notice: result.truncation_notice,
        }
    }
}

/// `task_stop` 결과
#[derive(Debug, Clone, Serialize)]
pub struct StopDto {
    pub pid: u32,
    pub status: String,
    pub message: String,
    /// 초 단위
    pub grace_period_used: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl From<&StopOutcome> for StopDto {
    fn from(outcome: &StopOutcome) -> Self {
        Self {
            pid: outcome.pid,
            status: outcome.state.display_name().to_string(),
            message: outcome.message.clone(),
            grace_period_used: outcome.grace_period_used.as_secs(),
            exit_code: outcome.state.exit_code(),
            reason: outcome.state.reason().map(str::to_string),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::path::PathBuf;
    use std::time::Duration;
    use taskd_task::{JobId, JobState};

    #[test]
    fn test_job_dto_terminal_fields() {
        let summary = JobSummary {
            id: JobId(3),
            pid: 4242,
            unique_name: "build".into(),
            command: "make build".into(),
            args: vec!["-j4".into()],
            working_dir: PathBuf::from("/p"),
            state: JobState::Completed(2),
            started_at: Utc::now(),
            ended_at: Some(Utc::now()),
            total_lines: 10,
            truncated: false,
        };

        let json = serde_json::to_value(JobDto::from(&summary)).unwrap();
        assert_eq!(json["pid"], 4242);
        assert_eq!(json["job_id"], 3);
        assert_eq!(json["state"], "Completed");
        assert_eq!(json["exit_code"], 2);
        assert!(json.get("reason").is_none());
        assert!(json["ended_at"].is_string());
    }

    #[test]
    fn test_stop_dto_reports_seconds() {
        let outcome = StopOutcome {
            job_id: JobId(1),
            pid: 10,
            state: JobState::Killed,
            message: "Job killed after 5s grace period elapsed".into(),
            grace_period_used: Duration::from_secs(5),
            already_finished: false,
        };

        let json = serde_json::to_value(StopDto::from(&outcome)).unwrap();
        assert_eq!(json["status"], "Killed");
        assert_eq!(json["grace_period_used"], 5);
    }
}
