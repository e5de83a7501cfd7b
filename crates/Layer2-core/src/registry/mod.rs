//! # Task Registry
//!
//! 프로젝트 루트에서 task 정의를 찾아 실행 가능한 목록을 만듭니다.
//!
//! ## 소스
//!
//! - `Makefile` 타겟 → `make <target>`
//! - `package.json` scripts → `<pm> run <script>` (pm은 lock 파일로 결정)
//!
//! ## 구성
//!
//! - [`TaskRegistry`]: 한 번의 discovery 결과 (불변 스냅샷)
//! - [`SharedRegistry`]: 재탐색 가능한 핸들, supervisor에 `TaskResolver`로 전달
//!
//! ```ignore
//! let registry = Arc::new(SharedRegistry::new(root, allowlist_path));
//! registry.refresh();
//! let supervisor = JobSupervisor::new(registry.clone(), SupervisorConfig::default());
//! ```

pub mod disambiguate;
pub mod makefile;
pub mod package_json;

pub use package_json::PackageManager;

use crate::allowlist::Allowlist;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use taskd_task::{ResolvedTask, TaskResolver};
use tracing::{debug, warn};

// ============================================================================
// Task types
// ============================================================================

/// Task 실행 도구
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TaskRunner {
    Make,
    Node(PackageManager),
}

impl TaskRunner {
    /// Runner 이름 (실행 파일 이름과 같음)
    pub fn name(&self) -> &'static str {
        match self {
            TaskRunner::Make => "make",
            TaskRunner::Node(pm) => pm.command(),
        }
    }

    /// task 실행 명령어
    pub fn command_for(&self, source_name: &str) -> String {
        match self {
            TaskRunner::Make => format!("make {}", source_name),
            TaskRunner::Node(pm) => format!("{} run {}", pm.command(), source_name),
        }
    }

    /// PATH에서 실행 파일 확인
    pub fn is_available(&self) -> bool {
        which::which(self.name()).is_ok()
    }
}

/// 파서가 만든 원본 정의
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskDefinition {
    /// 파일에 적힌 이름
    pub source_name: String,
    pub runner: TaskRunner,
    /// 정의 파일 경로
    pub file_path: PathBuf,
    pub description: Option<String>,
}

/// 고유 이름과 정책이 적용된 task
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskEntry {
    /// 충돌 시 runner 접미사가 붙은 이름
    pub unique_name: String,
    pub source_name: String,
    pub runner: TaskRunner,
    pub command: String,
    pub file_path: PathBuf,
    pub description: Option<String>,
    pub runner_available: bool,
    pub allowlisted: bool,
}

impl TaskEntry {
    /// 작업 디렉토리 = 정의 파일이 있는 디렉토리
    pub fn working_dir(&self) -> PathBuf {
        self.file_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."))
    }

    pub fn to_resolved(&self) -> ResolvedTask {
        ResolvedTask::new(&self.unique_name, &self.command, self.working_dir())
            .allowlisted(self.allowlisted)
    }
}

// ============================================================================
// TaskRegistry
// ============================================================================

/// Discovery 결과
#[derive(Debug, Clone, Default)]
pub struct TaskRegistry {
    entries: Vec<TaskEntry>,
    /// 읽거나 파싱하지 못한 파일들
    errors: Vec<String>,
}

impl TaskRegistry {
    /// `root`의 정의 파일들을 탐색
    pub fn discover(root: &Path, allowlist: &Allowlist) -> Self {
        let mut definitions = Vec::new();
        let mut errors = Vec::new();

        if let Some(path) = makefile::find(root) {
            match makefile::parse(&path) {
                Ok(found) => definitions.extend(found),
                Err(e) => errors.push(e.to_string()),
            }
        }

        if let Some(path) = package_json::find(root) {
            match package_json::parse(&path) {
                Ok(found) => definitions.extend(found),
                Err(e) => errors.push(e.to_string()),
            }
        }

        for error in &errors {
            warn!("Task discovery: {}", error);
        }

        let mut registry = Self::from_definitions(definitions, allowlist);
        registry.errors = errors;
        debug!(
            "Discovered {} tasks in {}",
            registry.entries.len(),
            root.display()
        );
        registry
    }

    /// 정의 목록에서 생성 (이름 충돌 해소 + 정책 적용)
    pub fn from_definitions(definitions: Vec<TaskDefinition>, allowlist: &Allowlist) -> Self {
        let names = disambiguate::unique_names(&definitions);
        let entries = definitions
            .into_iter()
            .zip(names)
            .map(|(def, unique_name)| TaskEntry {
                command: def.runner.command_for(&def.source_name),
                runner_available: def.runner.is_available(),
                allowlisted: allowlist.is_allowed(&def.file_path, &def.source_name),
                unique_name,
                source_name: def.source_name,
                runner: def.runner,
                file_path: def.file_path,
                description: def.description,
            })
            .collect();

        Self {
            entries,
            errors: Vec::new(),
        }
    }

    pub fn entries(&self) -> &[TaskEntry] {
        &self.entries
    }

    pub fn find(&self, unique_name: &str) -> Option<&TaskEntry> {
        self.entries.iter().find(|e| e.unique_name == unique_name)
    }

    /// runner 이름으로 필터
    pub fn by_runner<'a>(&'a self, runner: &'a str) -> impl Iterator<Item = &'a TaskEntry> + 'a {
        self.entries.iter().filter(move |e| e.runner.name() == runner)
    }

    pub fn errors(&self) -> &[String] {
        &self.errors
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl TaskResolver for TaskRegistry {
    fn resolve(&self, unique_name: &str) -> Option<ResolvedTask> {
        self.find(unique_name).map(TaskEntry::to_resolved)
    }
}

// ============================================================================
// SharedRegistry
// ============================================================================

/// 재탐색 가능한 공유 registry
///
/// `refresh()`는 정의 파일과 allowlist를 다시 읽습니다.
#[derive(Debug)]
pub struct SharedRegistry {
    root: PathBuf,
    allowlist_path: PathBuf,
    current: RwLock<Arc<TaskRegistry>>,
}

impl SharedRegistry {
    pub fn new(root: impl Into<PathBuf>, allowlist_path: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            allowlist_path: allowlist_path.into(),
            current: RwLock::new(Arc::new(TaskRegistry::default())),
        }
    }

    /// 고정된 registry로 생성 (refresh는 root 재탐색)
    pub fn with_registry(mut self, registry: TaskRegistry) -> Self {
        self.current = RwLock::new(Arc::new(registry));
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn allowlist_path(&self) -> &Path {
        &self.allowlist_path
    }

    /// 다시 탐색하고 새 스냅샷 반환
    ///
    /// allowlist를 읽지 못하면 모든 task를 거부합니다.
    pub fn refresh(&self) -> Arc<TaskRegistry> {
        let allowlist = Allowlist::load(&self.allowlist_path, &self.root).unwrap_or_else(|e| {
            warn!("Ignoring unreadable allowlist {}: {}", self.allowlist_path.display(), e);
            Allowlist::default()
        });

        let registry = Arc::new(TaskRegistry::discover(&self.root, &allowlist));
        *self.current.write() = Arc::clone(&registry);
        registry
    }

    /// 현재 스냅샷
    pub fn snapshot(&self) -> Arc<TaskRegistry> {
        Arc::clone(&self.current.read())
    }
}

impl TaskResolver for SharedRegistry {
    fn resolve(&self, unique_name: &str) -> Option<ResolvedTask> {
        self.snapshot().resolve(unique_name)
    }
}
