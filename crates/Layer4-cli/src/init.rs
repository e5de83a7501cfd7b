//! taskd init command
//!
//! Initializes a project with a .taskd configuration.

use crate::project::Project;
use taskd_core::Allowlist;
use taskd_foundation::{JsonStore, SupervisorSettings, TaskdConfig, TASKD_CONFIG_FILE};

/// Write `.taskd/config.json` and an empty allowlist
pub fn init_project(project: &Project, force: bool) -> anyhow::Result<()> {
    let store = JsonStore::project(&project.root);

    if store.exists(TASKD_CONFIG_FILE) && !force {
        println!("✓ taskd already initialized in {}.", project.root.display());
        println!("  Use --force to reinitialize.");
        return Ok(());
    }

    println!("Initializing taskd...");

    let config = TaskdConfig {
        supervisor: SupervisorSettings::with_defaults(),
        ..TaskdConfig::new()
    };
    config.save_project(&project.root)?;
    println!("  Created {}", store.file_path(TASKD_CONFIG_FILE).display());

    if !project.allowlist_path.exists() {
        Allowlist::new().save(&project.allowlist_path)?;
        println!("  Created {}", project.allowlist_path.display());
    }

    println!("\n✓ Done. Grant access with 'taskd allow <task>'.");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_init_creates_files_once() {
        let dir = TempDir::new().unwrap();
        let project = Project::open(Some(dir.path().to_path_buf()), None).unwrap();

        init_project(&project, false).unwrap();
        let config_path = JsonStore::project(&project.root).file_path(TASKD_CONFIG_FILE);
        assert!(config_path.exists());
        assert!(project.allowlist_path.exists());

        std::fs::write(&config_path, "{}").unwrap();
        init_project(&project, false).unwrap();
        assert_eq!(std::fs::read_to_string(&config_path).unwrap(), "{}");

        init_project(&project, true).unwrap();
        let reloaded = Project::open(Some(dir.path().to_path_buf()), None).unwrap();
        assert_eq!(
            reloaded.config.supervisor.max_output_lines(),
            taskd_foundation::config::DEFAULT_MAX_OUTPUT_LINES
        );
    }
}
