//! # taskd-foundation
//!
//! Foundation layer for taskd:
//! - Error: 중앙 에러 타입 (`Error`, `Result`)
//! - Config: 통합 설정 (`TaskdConfig`, `SupervisorSettings`)
//! - Storage: JsonStore (글로벌 / 프로젝트 설정 파일)

pub mod config;
pub mod error;
pub mod storage;

// ============================================================================
// Error
// ============================================================================
pub use error::{Error, Result};

// ============================================================================
// Config
// ============================================================================
pub use config::{SupervisorSettings, TaskdConfig, ALLOWLIST_FILE, TASKD_CONFIG_FILE};

// ============================================================================
// Storage
// ============================================================================
pub use storage::{JsonStore, PROJECT_DIR};
