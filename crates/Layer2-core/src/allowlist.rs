//! Allowlist Policy - 실행 허용 정책
//!
//! TOML 파일의 `[[entries]]` 목록으로 어떤 task를 실행할 수 있는지 결정합니다.
//!
//! ```toml
//! [[entries]]
//! path = "/home/me/project/Makefile"
//! scope = "task"
//! tasks = ["build", "test"]
//!
//! [[entries]]
//! path = "/home/me/project/scripts"
//! scope = "deny"
//! ```
//!
//! 우선순위: deny > directory > file > task. 매칭되지 않으면 거부.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use taskd_foundation::{Error, Result};
use tracing::debug;

/// 허용 범위
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AllowScope {
    /// 특정 파일의 나열된 task만
    Task,
    /// 파일의 모든 task
    File,
    /// 디렉토리(하위 포함)의 모든 task
    Directory,
    /// 경로 아래 모든 task 거부
    Deny,
}

/// Allowlist 항목
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllowlistEntry {
    pub path: PathBuf,

    pub scope: AllowScope,

    /// `scope = "task"`일 때 허용할 task 이름 (원본 이름)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tasks: Option<Vec<String>>,
}

impl AllowlistEntry {
    pub fn new(path: impl Into<PathBuf>, scope: AllowScope) -> Self {
        Self {
            path: path.into(),
            scope,
            tasks: None,
        }
    }

    pub fn with_tasks(mut self, tasks: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.tasks = Some(tasks.into_iter().map(Into::into).collect());
        self
    }
}

/// Allowlist
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Allowlist {
    #[serde(default)]
    pub entries: Vec<AllowlistEntry>,
}

impl Allowlist {
    pub fn new() -> Self {
        Self::default()
    }

    // ========================================================================
    // Load / Save
    // ========================================================================

    /// 파일에서 로드 (없으면 빈 allowlist)
    ///
    /// 상대 경로 항목은 `base` 기준으로 해석합니다.
    pub fn load(path: &Path, base: &Path) -> Result<Self> {
        if !path.exists() {
            debug!("No allowlist at {}, denying everything", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Failed to read {}: {}", path.display(), e)))?;
        let mut allowlist: Allowlist = toml::from_str(&content)?;

        for entry in &mut allowlist.entries {
            if entry.path.is_relative() {
                entry.path = base.join(&entry.path);
            }
        }

        debug!(
            "Loaded allowlist with {} entries from {}",
            allowlist.entries.len(),
            path.display()
        );
        Ok(allowlist)
    }

    /// 파일에 저장
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)
            .map_err(|e| Error::Config(format!("Failed to serialize allowlist: {}", e)))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    // ========================================================================
    // Policy
    // ========================================================================

    /// `file_path`에 정의된 `task_name` 실행 허용 여부
    pub fn is_allowed(&self, file_path: &Path, task_name: &str) -> bool {
        let denied = self
            .entries
            .iter()
            .filter(|entry| entry.scope == AllowScope::Deny)
            .any(|entry| file_path.starts_with(&entry.path));
        if denied {
            return false;
        }

        let by_scope = |scope: AllowScope| {
            self.entries
                .iter()
                .filter(move |entry| entry.scope == scope)
        };

        by_scope(AllowScope::Directory).any(|entry| file_path.starts_with(&entry.path))
            || by_scope(AllowScope::File).any(|entry| file_path == entry.path)
            || by_scope(AllowScope::Task).any(|entry| {
                file_path == entry.path
                    && entry
                        .tasks
                        .as_ref()
                        .is_some_and(|tasks| tasks.iter().any(|t| t == task_name))
            })
    }

    /// 항목 추가 (같은 경로의 task 항목은 병합)
    pub fn add(&mut self, entry: AllowlistEntry) {
        if entry.scope == AllowScope::Task {
            if let Some(existing) = self
                .entries
                .iter_mut()
                .find(|e| e.scope == AllowScope::Task && e.path == entry.path)
            {
                let tasks = existing.tasks.get_or_insert_with(Vec::new);
                for task in entry.tasks.unwrap_or_default() {
                    if !tasks.contains(&task) {
                        tasks.push(task);
                    }
                }
                return;
            }
        }
        if !self.entries.contains(&entry) {
            self.entries.push(entry);
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn makefile() -> PathBuf {
        PathBuf::from("/project/Makefile")
    }

    #[test]
    fn test_empty_denies() {
        assert!(!Allowlist::new().is_allowed(&makefile(), "build"));
    }

    #[test]
    fn test_task_scope() {
        let mut allowlist = Allowlist::new();
        allowlist.add(AllowlistEntry::new(makefile(), AllowScope::Task).with_tasks(["build"]));

        assert!(allowlist.is_allowed(&makefile(), "build"));
        assert!(!allowlist.is_allowed(&makefile(), "deploy"));
        assert!(!allowlist.is_allowed(Path::new("/project/package.json"), "build"));
    }

    #[test]
    fn test_file_and_directory_scope() {
        let mut allowlist = Allowlist::new();
        allowlist.add(AllowlistEntry::new(makefile(), AllowScope::File));
        allowlist.add(AllowlistEntry::new("/other", AllowScope::Directory));

        assert!(allowlist.is_allowed(&makefile(), "anything"));
        assert!(allowlist.is_allowed(Path::new("/other/sub/package.json"), "dev"));
        assert!(!allowlist.is_allowed(Path::new("/otherwise/Makefile"), "dev"));
    }

    #[test]
    fn test_deny_wins() {
        let mut allowlist = Allowlist::new();
        allowlist.add(AllowlistEntry::new("/project", AllowScope::Directory));
        allowlist.add(AllowlistEntry::new(makefile(), AllowScope::Deny));

        assert!(!allowlist.is_allowed(&makefile(), "build"));
        assert!(allowlist.is_allowed(Path::new("/project/package.json"), "build"));
    }

    #[test]
    fn test_add_merges_task_entries() {
        let mut allowlist = Allowlist::new();
        allowlist.add(AllowlistEntry::new(makefile(), AllowScope::Task).with_tasks(["build"]));
        allowlist.add(AllowlistEntry::new(makefile(), AllowScope::Task).with_tasks(["test", "build"]));

        assert_eq!(allowlist.len(), 1);
        assert_eq!(
            allowlist.entries[0].tasks,
            Some(vec!["build".to_string(), "test".to_string()])
        );
    }

    #[test]
    fn test_load_missing_and_relative_paths() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("allowlist.toml");

        let empty = Allowlist::load(&path, dir.path()).unwrap();
        assert!(empty.is_empty());

        std::fs::write(
            &path,
            "[[entries]]\npath = \"Makefile\"\nscope = \"task\"\ntasks = [\"build\"]\n",
        )
        .unwrap();
        let loaded = Allowlist::load(&path, dir.path()).unwrap();
        assert!(loaded.is_allowed(&dir.path().join("Makefile"), "build"));
    }

    #[test]
    fn test_save_roundtrip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(".taskd").join("allowlist.toml");

        let mut allowlist = Allowlist::new();
        allowlist.add(AllowlistEntry::new(dir.path().join("Makefile"), AllowScope::File));
        allowlist.save(&path).unwrap();

        let loaded = Allowlist::load(&path, dir.path()).unwrap();
        assert_eq!(loaded, allowlist);
    }

    #[test]
    fn test_invalid_toml_is_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("allowlist.toml");
        std::fs::write(&path, "[[entries]]\nscope = \"sometimes\"\n").unwrap();
        assert!(matches!(
            Allowlist::load(&path, dir.path()),
            Err(Error::Toml(_))
        ));
    }
}
