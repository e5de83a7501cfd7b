//! Config - 통합 설정 관리
//!
//! - `taskd.rs` - TaskdConfig 통합 설정 (supervisor 한도, allowlist 경로)

mod taskd;

pub use taskd::{
    SupervisorSettings, TaskdConfig, ALLOWLIST_FILE, DEFAULT_GRACE_PERIOD_SECS,
    DEFAULT_KILL_CONFIRM_TIMEOUT_MS, DEFAULT_MAX_CONCURRENT_JOBS, DEFAULT_MAX_FINISHED_JOBS,
    DEFAULT_MAX_LINE_BYTES, DEFAULT_MAX_OUTPUT_LINES, DEFAULT_OUTPUT_DRAIN_TIMEOUT_MS,
    TASKD_CONFIG_FILE,
};
