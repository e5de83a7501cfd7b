//! 에러 → JSON-RPC 에러 코드 매핑
//!
//! 각 에러 종류는 고유한 코드와 `data` 힌트를 가집니다.

use super::transport::JsonRpcError;
use serde_json::json;
use taskd_foundation::Error;

pub const PARSE_ERROR: i32 = -32700;
pub const INVALID_REQUEST: i32 = -32600;
pub const METHOD_NOT_FOUND: i32 = -32601;
pub const INVALID_PARAMS: i32 = -32602;
pub const INTERNAL_ERROR: i32 = -32603;

pub const NOT_ALLOWLISTED: i32 = -32010;
pub const RUNNER_UNAVAILABLE: i32 = -32011;
pub const TASK_NOT_FOUND: i32 = -32012;
pub const JOB_NOT_FOUND: i32 = -32013;
pub const LAUNCH_ERROR: i32 = -32014;
pub const JOB_LIMIT: i32 = -32015;

/// runner 설치 안내
pub fn install_hint(runner: &str) -> String {
    match runner {
        "make" => "Install make: brew install make (macOS) or apt-get install make (Ubuntu)".into(),
        "npm" => "Install Node.js and npm: https://nodejs.org/".into(),
        "yarn" => "Install yarn: npm install -g yarn".into(),
        "pnpm" => "Install pnpm: npm install -g pnpm".into(),
        "bun" => "Install bun: https://bun.sh/".into(),
        other => format!("Install {} to run this task", other),
    }
}

/// 도메인 에러를 프로토콜 에러로 변환
pub fn to_rpc_error(error: &Error) -> JsonRpcError {
    let message = error.to_string();
    match error {
        Error::TaskNotFound(_) => JsonRpcError::new(TASK_NOT_FOUND, message)
            .with_data(json!({ "hint": "Use 'list_tasks' to see available tasks" })),
        Error::NotAllowlisted(_) => JsonRpcError::new(NOT_ALLOWLISTED, message)
            .with_data(json!({ "hint": "Ask a human to grant MCP access to this task" })),
        Error::RunnerUnavailable { runner, .. } => JsonRpcError::new(RUNNER_UNAVAILABLE, message)
            .with_data(json!({ "runner": runner, "hint": install_hint(runner) })),
        Error::JobNotFound(pid) => JsonRpcError::new(JOB_NOT_FOUND, message).with_data(json!({
            "pid": pid,
            "hint": "Use 'task_status' to see known jobs"
        })),
        Error::Launch(_) => JsonRpcError::new(LAUNCH_ERROR, message)
            .with_data(json!({ "hint": "Check the task command and working directory" })),
        Error::JobLimitReached(max) => JsonRpcError::new(JOB_LIMIT, message).with_data(json!({
            "max_concurrent_jobs": max,
            "hint": "Stop a running job with 'task_stop' first"
        })),
        Error::InvalidInput(_) => JsonRpcError::new(INVALID_PARAMS, message),
        _ => JsonRpcError::new(INTERNAL_ERROR, message),
    }
}

impl From<Error> for JsonRpcError {
    fn from(error: Error) -> Self {
        to_rpc_error(&error)
    }
}
