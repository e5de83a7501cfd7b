//! taskd Config - 통합 설정
//!
//! 글로벌(`~/.config/taskd/config.json`)과 프로젝트(`.taskd/config.json`)
//! 설정을 병합합니다. 프로젝트 설정이 우선합니다.

use crate::storage::JsonStore;
use crate::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

/// 설정 파일명
pub const TASKD_CONFIG_FILE: &str = "config.json";

/// 기본 allowlist 파일명
pub const ALLOWLIST_FILE: &str = "allowlist.toml";

pub const DEFAULT_MAX_OUTPUT_LINES: usize = 1000;
pub const DEFAULT_MAX_LINE_BYTES: usize = 8 * 1024;
pub const DEFAULT_GRACE_PERIOD_SECS: u64 = 5;
pub const DEFAULT_KILL_CONFIRM_TIMEOUT_MS: u64 = 2000;
pub const DEFAULT_OUTPUT_DRAIN_TIMEOUT_MS: u64 = 500;
pub const DEFAULT_MAX_CONCURRENT_JOBS: usize = 50;
pub const DEFAULT_MAX_FINISHED_JOBS: usize = 100;

// ============================================================================
// taskd Config (통합)
// ============================================================================

/// taskd 통합 설정
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskdConfig {
    /// 버전 (마이그레이션용)
    #[serde(default = "default_version")]
    pub version: u32,

    /// Supervisor 설정
    #[serde(default)]
    pub supervisor: SupervisorSettings,

    /// allowlist 파일 경로 (없으면 프로젝트 `.taskd/allowlist.toml`)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub allowlist_file: Option<PathBuf>,
}

fn default_version() -> u32 {
    1
}

impl TaskdConfig {
    pub fn new() -> Self {
        Self {
            version: default_version(),
            ..Default::default()
        }
    }

    // ========================================================================
    // Load / Save
    // ========================================================================

    /// 글로벌 + 프로젝트 병합 로드
    pub fn load(root: &Path) -> Result<Self> {
        let mut config = Self::new();

        // 1. 글로벌 설정
        if let Ok(global) = JsonStore::global() {
            if let Some(global_config) = global.load_optional::<TaskdConfig>(TASKD_CONFIG_FILE)? {
                debug!("Loaded global config from {}", global.base_dir().display());
                config.merge(global_config);
            }
        }

        // 2. 프로젝트 설정
        config.merge_project(root)?;

        Ok(config)
    }

    /// 프로젝트 설정만 병합 (글로벌 없이)
    pub fn merge_project(&mut self, root: &Path) -> Result<()> {
        let project = JsonStore::project(root);
        if let Some(project_config) = project.load_optional::<TaskdConfig>(TASKD_CONFIG_FILE)? {
            debug!("Loaded project config from {}", project.base_dir().display());
            self.merge(project_config);
        }
        Ok(())
    }

    /// 프로젝트 설정 저장
    pub fn save_project(&self, root: &Path) -> Result<()> {
        JsonStore::project(root).save(TASKD_CONFIG_FILE, self)
    }

    /// 다른 설정 병합 (other 우선)
    pub fn merge(&mut self, other: TaskdConfig) {
        if other.allowlist_file.is_some() {
            self.allowlist_file = other.allowlist_file;
        }
        self.supervisor.merge(other.supervisor);
    }

    /// allowlist 경로 결정
    pub fn allowlist_path(&self, root: &Path) -> PathBuf {
        match &self.allowlist_file {
            Some(path) if path.is_absolute() => path.clone(),
            Some(path) => root.join(path),
            None => JsonStore::project(root).file_path(ALLOWLIST_FILE),
        }
    }

    // ========================================================================
    // Builder
    // ========================================================================

    pub fn allowlist_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.allowlist_file = Some(path.into());
        self
    }
}

// ============================================================================
// Supervisor Settings
// ============================================================================

/// Supervisor 설정 (지정하지 않은 값은 기본값)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SupervisorSettings {
    /// Job당 보관할 최대 출력 라인 수
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_output_lines: Option<usize>,

    /// 라인당 최대 바이트
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_line_bytes: Option<usize>,

    /// 기본 grace period (초)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_grace_period_secs: Option<u64>,

    /// SIGKILL 이후 종료 확인 대기 (ms)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kill_confirm_timeout_ms: Option<u64>,

    /// 프로세스 종료 후 파이프 드레인 대기 (ms)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_drain_timeout_ms: Option<u64>,

    /// 동시 실행 Job 최대 수
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_concurrent_jobs: Option<usize>,

    /// 보관할 종료된 Job 최대 수
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_finished_jobs: Option<usize>,
}

impl SupervisorSettings {
    /// 모든 값을 기본값으로 채운 설정 (`taskd init`이 파일에 기록)
    pub fn with_defaults() -> Self {
        Self {
            max_output_lines: Some(DEFAULT_MAX_OUTPUT_LINES),
            max_line_bytes: Some(DEFAULT_MAX_LINE_BYTES),
            default_grace_period_secs: Some(DEFAULT_GRACE_PERIOD_SECS),
            kill_confirm_timeout_ms: Some(DEFAULT_KILL_CONFIRM_TIMEOUT_MS),
            output_drain_timeout_ms: Some(DEFAULT_OUTPUT_DRAIN_TIMEOUT_MS),
            max_concurrent_jobs: Some(DEFAULT_MAX_CONCURRENT_JOBS),
            max_finished_jobs: Some(DEFAULT_MAX_FINISHED_JOBS),
        }
    }

    fn merge(&mut self, other: SupervisorSettings) {
        if other.max_output_lines.is_some() {
            self.max_output_lines = other.max_output_lines;
        }
        if other.max_line_bytes.is_some() {
            self.max_line_bytes = other.max_line_bytes;
        }
        if other.default_grace_period_secs.is_some() {
            self.default_grace_period_secs = other.default_grace_period_secs;
        }
        if other.kill_confirm_timeout_ms.is_some() {
            self.kill_confirm_timeout_ms = other.kill_confirm_timeout_ms;
        }
        if other.output_drain_timeout_ms.is_some() {
            self.output_drain_timeout_ms = other.output_drain_timeout_ms;
        }
        if other.max_concurrent_jobs.is_some() {
            self.max_concurrent_jobs = other.max_concurrent_jobs;
        }
        if other.max_finished_jobs.is_some() {
            self.max_finished_jobs = other.max_finished_jobs;
        }
    }

    pub fn max_output_lines(&self) -> usize {
        self.max_output_lines.unwrap_or(DEFAULT_MAX_OUTPUT_LINES).max(1)
    }

    pub fn max_line_bytes(&self) -> usize {
        self.max_line_bytes.unwrap_or(DEFAULT_MAX_LINE_BYTES).max(1)
    }

    pub fn default_grace_period_secs(&self) -> u64 {
        self.default_grace_period_secs
            .unwrap_or(DEFAULT_GRACE_PERIOD_SECS)
    }

    pub fn kill_confirm_timeout_ms(&self) -> u64 {
        self.kill_confirm_timeout_ms
            .unwrap_or(DEFAULT_KILL_CONFIRM_TIMEOUT_MS)
    }

    pub fn output_drain_timeout_ms(&self) -> u64 {
        self.output_drain_timeout_ms
            .unwrap_or(DEFAULT_OUTPUT_DRAIN_TIMEOUT_MS)
    }

    pub fn max_concurrent_jobs(&self) -> usize {
        self.max_concurrent_jobs
            .unwrap_or(DEFAULT_MAX_CONCURRENT_JOBS)
    }

    pub fn max_finished_jobs(&self) -> usize {
        self.max_finished_jobs.unwrap_or(DEFAULT_MAX_FINISHED_JOBS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = TaskdConfig::new();
        assert_eq!(config.version, 1);
        assert_eq!(config.supervisor.max_output_lines(), DEFAULT_MAX_OUTPUT_LINES);
        assert_eq!(config.supervisor.default_grace_period_secs(), 5);
        assert_eq!(config.supervisor.max_concurrent_jobs(), 50);
    }

    #[test]
    fn test_merge_prefers_other() {
        let mut base: TaskdConfig = serde_json::from_str(
            r#"{ "supervisor": { "maxOutputLines": 10, "maxFinishedJobs": 7 } }"#,
        )
        .unwrap();
        let project: TaskdConfig = serde_json::from_str(
            r#"{ "supervisor": { "maxOutputLines": 20 }, "allowlistFile": "policy.toml" }"#,
        )
        .unwrap();

        base.merge(project);
        assert_eq!(base.supervisor.max_output_lines(), 20);
        assert_eq!(base.supervisor.max_finished_jobs(), 7);
        assert_eq!(base.allowlist_file, Some(PathBuf::from("policy.toml")));
    }

    #[test]
    fn test_project_roundtrip_and_allowlist_path() {
        let dir = TempDir::new().unwrap();
        let root = dir.path();

        let mut config = TaskdConfig::new();
        config.supervisor.max_output_lines = Some(42);
        config.save_project(root).unwrap();

        let mut loaded = TaskdConfig::new();
        loaded.merge_project(root).unwrap();
        assert_eq!(loaded.supervisor.max_output_lines(), 42);

        assert_eq!(
            loaded.allowlist_path(root),
            root.join(".taskd").join(ALLOWLIST_FILE)
        );
        let relative = TaskdConfig::new().allowlist_file("custom.toml");
        assert_eq!(relative.allowlist_path(root), root.join("custom.toml"));
    }

    #[test]
    fn test_zero_output_lines_clamped() {
        let settings = SupervisorSettings {
            max_output_lines: Some(0),
            ..Default::default()
        };
        assert_eq!(settings.max_output_lines(), 1);
    }
}
