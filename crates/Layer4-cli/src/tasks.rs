//! `taskd list` / `taskd allow`

use crate::project::Project;
use anyhow::{bail, Context, Result};
use taskd_core::{AllowScope, Allowlist, AllowlistEntry, TaskEntry, TaskRegistry};

fn discover(project: &Project) -> Result<(Allowlist, TaskRegistry)> {
    let allowlist = Allowlist::load(&project.allowlist_path, &project.root)
        .with_context(|| format!("Failed to load {}", project.allowlist_path.display()))?;
    let registry = TaskRegistry::discover(&project.root, &allowlist);
    Ok((allowlist, registry))
}

/// 발견된 task 출력
pub fn list(project: &Project, runner: Option<&str>) -> Result<()> {
    let (_, registry) = discover(project)?;

    let entries: Vec<&TaskEntry> = match runner {
        Some(runner) => registry.by_runner(runner).collect(),
        None => registry.entries().iter().collect(),
    };

    if entries.is_empty() {
        println!("No tasks found in {}", project.root.display());
        return Ok(());
    }

    let width = entries.iter().map(|e| e.unique_name.len()).max().unwrap_or(0);
    for entry in entries {
        let allowed = if entry.allowlisted { "✓" } else { "✗" };
        let missing = if entry.runner_available {
            ""
        } else {
            " (runner missing)"
        };
        println!(
            "{} {:width$}  {}{}",
            allowed,
            entry.unique_name,
            entry.command,
            missing,
            width = width
        );
        if let Some(description) = &entry.description {
            println!("  {:width$}  {}", "", description, width = width);
        }
    }

    for error in registry.errors() {
        eprintln!("Warning: {}", error);
    }
    Ok(())
}

/// allowlist에 항목 추가
pub fn allow(project: &Project, task: &str, scope: AllowScope) -> Result<()> {
    let (mut allowlist, registry) = discover(project)?;

    let Some(entry) = registry.find(task) else {
        bail!("Task '{}' not found. Run 'taskd list' to see available tasks", task);
    };

    let new_entry = match scope {
        AllowScope::Task => {
            AllowlistEntry::new(&entry.file_path, scope).with_tasks([entry.source_name.clone()])
        }
        AllowScope::File | AllowScope::Deny => AllowlistEntry::new(&entry.file_path, scope),
        AllowScope::Directory => AllowlistEntry::new(entry.working_dir(), scope),
    };

    println!(
        "✓ {} {} ({:?} scope)",
        if scope == AllowScope::Deny { "Denied" } else { "Allowed" },
        new_entry.path.display(),
        scope
    );

    allowlist.add(new_entry);
    allowlist
        .save(&project.allowlist_path)
        .with_context(|| format!("Failed to write {}", project.allowlist_path.display()))?;
    println!("  Saved {}", project.allowlist_path.display());
    Ok(())
}
