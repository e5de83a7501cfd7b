//! Error types for taskd
//!
//! 모든 에러를 중앙에서 관리

use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// taskd 에러 타입
#[derive(Error, Debug)]
pub enum Error {
    // ========================================================================
    // Task 해석 / 정책
    // ========================================================================
    #[error("Task '{0}' not found")]
    TaskNotFound(String),

    #[error("Task '{0}' is not allowlisted for execution")]
    NotAllowlisted(String),

    #[error("Runner '{runner}' for task '{task}' is not available")]
    RunnerUnavailable { runner: String, task: String },

    // ========================================================================
    // Job 관련
    // ========================================================================
    #[error("Job with PID {0} not found")]
    JobNotFound(u32),

    #[error("Failed to launch process: {0}")]
    Launch(String),

    #[error("Maximum concurrent jobs limit reached: {0}")]
    JobLimitReached(usize),

    // ========================================================================
    // 설정 관련
    // ========================================================================
    #[error("Configuration error: {0}")]
    Config(String),

    // ========================================================================
    // 일반
    // ========================================================================
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    // ========================================================================
    // 외부 에러 변환
    // ========================================================================
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    // ========================================================================
    // 기타
    // ========================================================================
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Launch 에러 생성 헬퍼
    pub fn launch(reason: impl Into<String>) -> Self {
        Error::Launch(reason.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        assert_eq!(
            Error::TaskNotFound("build".into()).to_string(),
            "Task 'build' not found"
        );
        assert!(Error::NotAllowlisted("deploy".into())
            .to_string()
            .contains("not allowlisted"));
        assert_eq!(
            Error::JobNotFound(99999).to_string(),
            "Job with PID 99999 not found"
        );
    }
}
