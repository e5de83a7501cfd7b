//! package.json 스크립트 파서
//!
//! 패키지 매니저는 lock 파일로 결정합니다.

use super::{TaskDefinition, TaskRunner};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use taskd_foundation::{Error, Result};

pub const PACKAGE_JSON: &str = "package.json";

/// Node 패키지 매니저
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PackageManager {
    Npm,
    Yarn,
    Pnpm,
    Bun,
}

impl PackageManager {
    /// 실행 파일 이름
    pub fn command(&self) -> &'static str {
        match self {
            PackageManager::Npm => "npm",
            PackageManager::Yarn => "yarn",
            PackageManager::Pnpm => "pnpm",
            PackageManager::Bun => "bun",
        }
    }

    /// lock 파일로 감지 (없으면 npm)
    pub fn detect(dir: &Path) -> Self {
        const LOCK_FILES: &[(&str, PackageManager)] = &[
            ("bun.lockb", PackageManager::Bun),
            ("bun.lock", PackageManager::Bun),
            ("pnpm-lock.yaml", PackageManager::Pnpm),
            ("yarn.lock", PackageManager::Yarn),
        ];

        LOCK_FILES
            .iter()
            .find(|(file, _)| dir.join(file).is_file())
            .map(|(_, pm)| *pm)
            .unwrap_or(PackageManager::Npm)
    }
}

/// 디렉토리에서 package.json 찾기
pub fn find(dir: &Path) -> Option<PathBuf> {
    let path = dir.join(PACKAGE_JSON);
    path.is_file().then_some(path)
}

/// package.json 파싱
pub fn parse(path: &Path) -> Result<Vec<TaskDefinition>> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Failed to read {}: {}", path.display(), e)))?;
    let json: serde_json::Value = serde_json::from_str(&content)
        .map_err(|e| Error::Config(format!("Failed to parse {}: {}", path.display(), e)))?;

    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let manager = PackageManager::detect(dir);

    let Some(scripts) = json.get("scripts").and_then(|s| s.as_object()) else {
        return Ok(Vec::new());
    };

    Ok(scripts
        .iter()
        .map(|(name, body)| TaskDefinition {
            source_name: name.clone(),
            runner: TaskRunner::Node(manager),
            file_path: path.to_path_buf(),
            description: body.as_str().map(|s| format!("node script: {}", s)),
        })
        .collect())
}
