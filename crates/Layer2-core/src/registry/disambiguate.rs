//! 이름 충돌 해소
//!
//! 같은 이름이 여러 소스에 있으면 runner 접미사를 붙입니다 (`test-m`, `test-n`).
//! 충돌이 없는 이름은 그대로 둡니다.

use super::TaskDefinition;
use std::collections::{HashMap, HashSet};

/// 정의 순서대로 고유 이름 목록 반환
pub fn unique_names(definitions: &[TaskDefinition]) -> Vec<String> {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for def in definitions {
        *counts.entry(def.source_name.as_str()).or_insert(0) += 1;
    }

    let mut used: HashMap<&str, HashSet<String>> = HashMap::new();
    definitions
        .iter()
        .map(|def| {
            let name = def.source_name.as_str();
            if counts.get(name).copied().unwrap_or(0) <= 1 {
                return name.to_string();
            }
            let taken = used.entry(name).or_default();
            let suffix = runner_suffix(def.runner.name(), taken);
            taken.insert(suffix.clone());
            format!("{}-{}", name, suffix)
        })
        .collect()
}

/// 사용되지 않은 가장 짧은 runner 이름 접두사
fn runner_suffix(runner: &str, taken: &HashSet<String>) -> String {
    let runner = runner.to_lowercase();
    let boundaries = runner
        .char_indices()
        .map(|(i, c)| i + c.len_utf8());

    for end in boundaries {
        let prefix = &runner[..end];
        if !taken.contains(prefix) {
            return prefix.to_string();
        }
    }

    let mut n = 1;
    loop {
        let candidate = format!("{}{}", runner, n);
        if !taken.contains(&candidate) {
            return candidate;
        }
        n += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{PackageManager, TaskRunner};
    use std::path::PathBuf;

    fn def(name: &str, runner: TaskRunner) -> TaskDefinition {
        TaskDefinition {
            source_name: name.to_string(),
            runner,
            file_path: PathBuf::from("/p"),
            description: None,
        }
    }

    #[test]
    fn test_unique_names_untouched() {
        let defs = vec![
            def("build", TaskRunner::Make),
            def("lint", TaskRunner::Node(PackageManager::Npm)),
        ];
        assert_eq!(unique_names(&defs), vec!["build", "lint"]);
    }

    #[test]
    fn test_collisions_get_runner_suffix() {
        let defs = vec![
            def("test", TaskRunner::Make),
            def("test", TaskRunner::Node(PackageManager::Npm)),
            def("dev", TaskRunner::Node(PackageManager::Yarn)),
        ];
        assert_eq!(unique_names(&defs), vec!["test-m", "test-n", "dev"]);
    }

    #[test]
    fn test_same_initial_extends_prefix() {
        let mut taken = HashSet::new();
        taken.insert("p".to_string());
        assert_eq!(runner_suffix("pnpm", &taken), "pn");

        taken.insert("pn".to_string());
        taken.insert("pnp".to_string());
        taken.insert("pnpm".to_string());
        assert_eq!(runner_suffix("pnpm", &taken), "pnpm1");
    }
}
