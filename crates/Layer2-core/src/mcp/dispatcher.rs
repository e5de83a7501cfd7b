//! Tool Dispatcher
//!
//! 도구 호출을 registry/supervisor 연산으로 연결합니다.
//!
//! | 도구 | 연산 |
//! |---|---|
//! | `list_tasks` | `SharedRegistry::refresh` |
//! | `task_start` | 정책 확인 후 `JobSupervisor::start` |
//! | `status` | `JobSupervisor::running` |
//! | `task_status` | `JobSupervisor::status` |
//! | `task_output` | `JobSupervisor::output` |
//! | `task_stop` | `JobSupervisor::stop` |

use super::dto::{JobDto, OutputDto, StartDto, StopDto, TaskDto};
use super::transport::JsonRpcError;
use super::types::{McpTool, McpToolResult};
use crate::registry::{SharedRegistry, TaskRegistry};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use taskd_foundation::Error;
use taskd_task::JobSupervisor;
use tracing::{debug, info};

// ============================================================================
// Arguments
// ============================================================================

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ListTasksArgs {
    runner: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StartArgs {
    unique_name: String,
    #[serde(default)]
    args: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct TaskStatusArgs {
    unique_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OutputArgs {
    pid: u32,
    #[serde(default)]
    lines: Option<i64>,
    #[serde(default)]
    show_truncation: bool,
}

#[derive(Debug, Deserialize)]
struct StopArgs {
    pid: u32,
    #[serde(default)]
    grace_period: Option<u64>,
}

fn parse_args<T: DeserializeOwned>(tool: &str, arguments: Value) -> Result<T, JsonRpcError> {
    let arguments = if arguments.is_null() {
        json!({})
    } else {
        arguments
    };
    serde_json::from_value(arguments)
        .map_err(|e| JsonRpcError::invalid_params(format!("Invalid arguments for {}: {}", tool, e)))
}

/// `lines` ≤ 0 또는 생략 = 전체
fn line_limit(lines: Option<i64>) -> Option<usize> {
    lines
        .filter(|n| *n > 0)
        .map(|n| usize::try_from(n).unwrap_or(usize::MAX))
}

fn to_value<T: serde::Serialize>(payload: &T) -> Result<Value, JsonRpcError> {
    serde_json::to_value(payload).map_err(|e| JsonRpcError::from(Error::Json(e)))
}

// ============================================================================
// ToolDispatcher
// ============================================================================

/// 도구 이름 → 연산
#[derive(Debug, Clone)]
pub struct ToolDispatcher {
    registry: Arc<SharedRegistry>,
    supervisor: JobSupervisor,
}

impl ToolDispatcher {
    pub fn new(registry: Arc<SharedRegistry>, supervisor: JobSupervisor) -> Self {
        Self {
            registry,
            supervisor,
        }
    }

    pub fn supervisor(&self) -> &JobSupervisor {
        &self.supervisor
    }

    pub fn registry(&self) -> &Arc<SharedRegistry> {
        &self.registry
    }

    /// `tools/list` 목록
    pub fn tools() -> Vec<McpTool> {
        vec![
            McpTool::new(
                "list_tasks",
                "List tasks discovered in the project with their runner and allowlist status",
                json!({
                    "type": "object",
                    "properties": {
                        "runner": {
                            "type": "string",
                            "description": "Only list tasks run by this runner (make, npm, yarn, pnpm, bun)"
                        }
                    }
                }),
            ),
            McpTool::new(
                "task_start",
                "Start an allowlisted task in the background and return its pid immediately",
                json!({
                    "type": "object",
                    "properties": {
                        "unique_name": {
                            "type": "string",
                            "description": "Task name as reported by list_tasks"
                        },
                        "args": {
                            "type": "array",
                            "items": { "type": "string" },
                            "description": "Extra arguments appended to the task command"
                        }
                    },
                    "required": ["unique_name"]
                }),
            ),
            McpTool::new(
                "status",
                "List jobs that are still running",
                json!({ "type": "object", "properties": {} }),
            ),
            McpTool::new(
                "task_status",
                "List all known jobs, optionally filtered by task name",
                json!({
                    "type": "object",
                    "properties": {
                        "unique_name": { "type": "string" }
                    }
                }),
            ),
            McpTool::new(
                "task_output",
                "Read the captured output of a job",
                json!({
                    "type": "object",
                    "properties": {
                        "pid": { "type": "integer" },
                        "lines": {
                            "type": "integer",
                            "description": "Return only the last N lines (0 or omitted returns all)"
                        },
                        "show_truncation": {
                            "type": "boolean",
                            "description": "Include a notice when older lines were discarded"
                        }
                    },
                    "required": ["pid"]
                }),
            ),
            McpTool::new(
                "task_stop",
                "Stop a running job, killing it if it does not exit within the grace period",
                json!({
                    "type": "object",
                    "properties": {
                        "pid": { "type": "integer" },
                        "grace_period": {
                            "type": "integer",
                            "description": "Seconds to wait for a graceful exit"
                        }
                    },
                    "required": ["pid"]
                }),
            ),
        ]
    }

    /// 도구 실행
    pub async fn call(&self, name: &str, arguments: Value) -> Result<McpToolResult, JsonRpcError> {
        debug!("Tool call: {} {}", name, arguments);

        let payload = match name {
            "list_tasks" => self.list_tasks(parse_args(name, arguments)?).await?,
            "task_start" => self.task_start(parse_args(name, arguments)?).await?,
            "status" => self.status().await?,
            "task_status" => self.task_status(parse_args(name, arguments)?).await?,
            "task_output" => self.task_output(parse_args(name, arguments)?).await?,
            "task_stop" => self.task_stop(parse_args(name, arguments)?).await?,
            other => {
                return Err(JsonRpcError::invalid_params(format!("Unknown tool: {}", other)));
            }
        };

        Ok(McpToolResult::json(payload))
    }

    // ========================================================================
    // Tools
    // ========================================================================

    /// Re-scan definition files off the async workers
    async fn refreshed_registry(&self) -> Result<Arc<TaskRegistry>, JsonRpcError> {
        let registry = Arc::clone(&self.registry);
        tokio::task::spawn_blocking(move || registry.refresh())
            .await
            .map_err(|e| JsonRpcError::from(Error::Internal(format!("task discovery failed: {}", e))))
    }

    async fn list_tasks(&self, args: ListTasksArgs) -> Result<Value, JsonRpcError> {
        let registry = self.refreshed_registry().await?;
        let tasks: Vec<TaskDto> = match args.runner.as_deref() {
            Some(runner) => registry.by_runner(runner).map(TaskDto::from).collect(),
            None => registry.entries().iter().map(TaskDto::from).collect(),
        };
        Ok(json!({ "tasks": to_value(&tasks)? }))
    }

    async fn task_start(&self, args: StartArgs) -> Result<Value, JsonRpcError> {
        let registry = self.refreshed_registry().await?;
        let entry = registry
            .find(&args.unique_name)
            .ok_or_else(|| Error::TaskNotFound(args.unique_name.clone()))?;

        if !entry.allowlisted {
            return Err(Error::NotAllowlisted(entry.unique_name.clone()).into());
        }
        if !entry.runner_available {
            return Err(Error::RunnerUnavailable {
                runner: entry.runner.name().to_string(),
                task: entry.unique_name.clone(),
            }
            .into());
        }

        let outcome = self.supervisor.start(&args.unique_name, args.args).await?;
        info!(
            "Started {} as pid {} ({})",
            outcome.unique_name, outcome.pid, outcome.job_id
        );
        to_value(&StartDto::from(&outcome))
    }

    async fn status(&self) -> Result<Value, JsonRpcError> {
        let running: Vec<JobDto> = self.supervisor.running().await.iter().map(JobDto::from).collect();
        Ok(json!({ "running": to_value(&running)? }))
    }

    async fn task_status(&self, args: TaskStatusArgs) -> Result<Value, JsonRpcError> {
        let jobs: Vec<JobDto> = self
            .supervisor
            .status(args.unique_name.as_deref())
            .await
            .iter()
            .map(JobDto::from)
            .collect();
        Ok(json!({ "jobs": to_value(&jobs)? }))
    }

    async fn task_output(&self, args: OutputArgs) -> Result<Value, JsonRpcError> {
        let result = self
            .supervisor
            .output(args.pid, line_limit(args.lines), args.show_truncation)
            .await?;
        to_value(&OutputDto::from(result))
    }

    async fn task_stop(&self, args: StopArgs) -> Result<Value, JsonRpcError> {
        let grace = args.grace_period.map(Duration::from_secs);
        let outcome = self.supervisor.stop(args.pid, grace).await?;
        to_value(&StopDto::from(&outcome))
    }
}
