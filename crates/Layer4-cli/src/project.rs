//! Project - 실행 대상 프로젝트
//!
//! 디렉토리 구조:
//! ```text
//! project/
//! ├── .taskd/
//! │   ├── config.json      # 프로젝트별 설정 (supervisor 한도)
//! │   └── allowlist.toml   # 실행 허용 목록
//! ├── Makefile
//! └── package.json
//! ```

use anyhow::{Context, Result};
use std::path::PathBuf;
use taskd_foundation::TaskdConfig;

/// 루트 경로 + 병합된 설정
#[derive(Debug, Clone)]
pub struct Project {
    /// 정규화된 프로젝트 루트
    pub root: PathBuf,
    pub config: TaskdConfig,
    pub allowlist_path: PathBuf,
}

impl Project {
    /// `root`가 없으면 현재 디렉토리
    pub fn open(root: Option<PathBuf>, allowlist: Option<PathBuf>) -> Result<Self> {
        let root = match root {
            Some(root) => root,
            None => std::env::current_dir().context("Failed to read current directory")?,
        };
        let root = std::fs::canonicalize(&root)
            .with_context(|| format!("Project root {} does not exist", root.display()))?;

        let config = TaskdConfig::load(&root).context("Failed to load configuration")?;
        let allowlist_path = allowlist.unwrap_or_else(|| config.allowlist_path(&root));

        Ok(Self {
            root,
            config,
            allowlist_path,
        })
    }
}
