//! Makefile 타겟 파서
//!
//! 규칙 라인(`target: deps`)에서 타겟을 추출합니다.
//! - `.PHONY` 같은 특수 타겟, `%` 패턴 규칙, 변수 할당은 제외
//! - 설명: `target: ## text` > 바로 위 `# text` 주석 > 첫 레시피의 `@echo`

use super::{TaskDefinition, TaskRunner};
use regex::Regex;
use std::collections::HashSet;
use std::path::Path;
use std::sync::OnceLock;
use taskd_foundation::{Error, Result};

/// 인식하는 Makefile 파일명 (우선순위 순)
pub const MAKEFILE_NAMES: &[&str] = &["GNUmakefile", "makefile", "Makefile"];

const RULE_PATTERN: &str = r"^(?P<targets>[^\s:#=][^:#=]*?)\s*::?(?P<rest>.*)$";

fn rule_regex() -> Result<&'static Regex> {
    static RULE: OnceLock<std::result::Result<Regex, regex::Error>> = OnceLock::new();
    RULE.get_or_init(|| Regex::new(RULE_PATTERN))
        .as_ref()
        .map_err(|e| Error::Internal(format!("invalid Makefile rule pattern: {}", e)))
}

/// 디렉토리에서 Makefile 찾기
pub fn find(dir: &Path) -> Option<std::path::PathBuf> {
    MAKEFILE_NAMES
        .iter()
        .map(|name| dir.join(name))
        .find(|path| path.is_file())
}

/// Makefile 파싱
pub fn parse(path: &Path) -> Result<Vec<TaskDefinition>> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Failed to read {}: {}", path.display(), e)))?;
    parse_content(&content, path)
}

/// 내용 파싱 (파일 I/O 없이)
pub fn parse_content(content: &str, path: &Path) -> Result<Vec<TaskDefinition>> {
    let rule = rule_regex()?;
    let mut tasks: Vec<TaskDefinition> = Vec::new();
    let mut seen = HashSet::new();
    let mut last_comment: Option<String> = None;
    // 첫 레시피에서 설명을 채울 task 인덱스들
    let mut awaiting_recipe: Vec<usize> = Vec::new();

    for line in content.lines() {
        if line.starts_with('\t') {
            let recipe = line.trim();
            for idx in awaiting_recipe.drain(..) {
                if tasks[idx].description.is_none() {
                    tasks[idx].description = echo_description(recipe);
                }
            }
            continue;
        }
        awaiting_recipe.clear();

        let trimmed = line.trim();
        if trimmed.is_empty() {
            last_comment = None;
            continue;
        }
        if let Some(comment) = trimmed.strip_prefix('#') {
            let text = comment.trim_start_matches('#').trim();
            last_comment = (!text.is_empty()).then(|| text.to_string());
            continue;
        }

        let comment = last_comment.take();
        let Some(caps) = rule.captures(line) else {
            continue;
        };

        let rest = &caps["rest"];
        // `:=`, `::=`, `!=` 등 할당
        if rest.starts_with('=') {
            continue;
        }

        let inline = rest
            .split_once("##")
            .map(|(_, text)| text.trim().to_string())
            .filter(|text| !text.is_empty());
        let description = inline.or(comment);

        for target in caps["targets"].split_whitespace() {
            if !is_task_target(target) || !seen.insert(target.to_string()) {
                continue;
            }
            tasks.push(TaskDefinition {
                source_name: target.to_string(),
                runner: TaskRunner::Make,
                file_path: path.to_path_buf(),
                description: description.clone(),
            });
            awaiting_recipe.push(tasks.len() - 1);
        }
    }

    Ok(tasks)
}

fn is_task_target(target: &str) -> bool {
    !target.starts_with('.') && !target.contains('%') && !target.contains('$')
}

fn echo_description(recipe: &str) -> Option<String> {
    let text = recipe
        .strip_prefix("@echo")
        .or_else(|| recipe.strip_prefix("echo"))?
        .trim()
        .trim_matches('"')
        .trim_matches('\'')
        .trim();
    (!text.is_empty()).then(|| text.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(tasks: &[TaskDefinition]) -> Vec<&str> {
        tasks.iter().map(|t| t.source_name.as_str()).collect()
    }

    #[test]
    fn test_parse_simple_targets() {
        let content = ".PHONY: build test\n\nbuild:\n\t@echo \"Building the project\"\n\tcargo build\n\ntest: build\n\tcargo test\n";
        let tasks = parse_content(content, Path::new("/p/Makefile")).unwrap();

        assert_eq!(names(&tasks), vec!["build", "test"]);
        assert_eq!(tasks[0].description.as_deref(), Some("Building the project"));
        assert_eq!(tasks[1].description, None);
        assert_eq!(tasks[0].runner, TaskRunner::Make);
    }

    #[test]
    fn test_skips_assignments_and_patterns() {
        let content = "CC := gcc\nFLAGS = -O2\nOUT ::= out\n%.o: %.c\n\t$(CC) -c $<\n$(OUT): main.o\n\tld\nall: main.o\n";
        let tasks = parse_content(content, Path::new("Makefile")).unwrap();
        assert_eq!(names(&tasks), vec!["all"]);
    }

    #[test]
    fn test_descriptions_from_comments() {
        let content = "# Run the linter\nlint:\n\tcargo clippy\n\nfmt: ## Format sources\n\tcargo fmt\n\n# stale comment\n\nclean:\n\trm -rf target\n";
        let tasks = parse_content(content, Path::new("Makefile")).unwrap();

        assert_eq!(names(&tasks), vec!["lint", "fmt", "clean"]);
        assert_eq!(tasks[0].description.as_deref(), Some("Run the linter"));
        assert_eq!(tasks[1].description.as_deref(), Some("Format sources"));
        assert_eq!(tasks[2].description, None);
    }

    #[test]
    fn test_multiple_targets_and_duplicates() {
        let content = "dev serve:\n\tnpm start\nserve:\n\techo again\n";
        let tasks = parse_content(content, Path::new("Makefile")).unwrap();
        assert_eq!(names(&tasks), vec!["dev", "serve"]);
    }

    #[test]
    fn test_rule_pattern_compiles() {
        assert!(rule_regex().is_ok());
        assert!(parse_content("", Path::new("Makefile")).unwrap().is_empty());
    }

    #[test]
    fn test_find_prefers_gnumakefile() {
        let dir = tempfile::TempDir::new().unwrap();
        assert!(find(dir.path()).is_none());

        std::fs::write(dir.path().join("Makefile"), "a:\n").unwrap();
        assert!(find(dir.path()).unwrap().ends_with("Makefile"));

        std::fs::write(dir.path().join("GNUmakefile"), "b:\n").unwrap();
        assert!(find(dir.path()).unwrap().ends_with("GNUmakefile"));
    }
}
