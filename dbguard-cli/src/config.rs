//! CLI configuration handling.

use std::path::{Path, PathBuf};

use dbguard_core::environment::Environments;
use dbguard_core::{LockState, Operation, Settings};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{CliError, CliResult};

/// Default config file name (lives in project root)
pub const CONFIG_FILE_NAME: &str = "dbguard.toml";

/// Default migrations directory (relative to project root)
pub const MIGRATIONS_DIR: &str = "supabase/migrations";

/// File holding the linked project ref (relative to project root)
pub const LINKED_REF_PATH: &str = "supabase/.temp/project-ref";

/// Directory for migration backups (relative to project root)
pub const BACKUP_DIR: &str = "supabase/.migration-backups";

/// Starter configuration written by `dbguard init`
pub const STARTER_CONFIG: &str = r#"# dbguard configuration

[settings]
# Refuse --force, and refuse --yes for critical operations
strict_mode = false
# Block push/reset/pull/seed while the working tree is dirty
require_clean_git = true
# Show a line diff when resolving migration conflicts
show_migration_diff = true

[tool]
command = "supabase"
migrations_dir = "supabase/migrations"
linked_ref_path = "supabase/.temp/project-ref"
backup_dir = "supabase/.migration-backups"

[environments.local]
git_branches = []
protected_operations = []

# [environments.staging]
# project_ref = "your-staging-project-ref"
# git_branches = ["develop", "feature/*"]
# protected_operations = ["reset"]

# [environments.production]
# project_ref = "your-production-project-ref"
# git_branches = ["main"]
# protected_operations = ["push", "reset", "seed"]
# confirm_word = "production"
# locked = true
"#;

/// dbguard configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Global settings
    pub settings: Settings,

    /// External migration tool
    pub tool: ToolConfig,

    /// Environments, in declaration order
    pub environments: Environments,
}

impl Config {
    /// Load and validate configuration from a file
    pub fn load(path: &Path) -> CliResult<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| CliError::config(path, format!("cannot read file: {}", e)))?;
        Self::parse(&content, path)
    }

    /// Parse and validate configuration text; `path` is used for errors
    pub fn parse(content: &str, path: &Path) -> CliResult<Self> {
        let config: Config = toml::from_str(content)
            .map_err(|e| CliError::config(path, format!("failed to parse TOML: {}", e)))?;
        config.validate(path)?;
        Ok(config)
    }

    /// Check field values serde cannot check
    pub fn validate(&self, path: &Path) -> CliResult<()> {
        for (name, env) in &self.environments {
            if name.trim().is_empty() {
                return Err(CliError::config(path, "environments: empty environment name"));
            }

            for (i, op) in env.protected_operations.iter().enumerate() {
                if let Err(e) = op.parse::<Operation>() {
                    return Err(CliError::config(
                        path,
                        format!("environments.{}.protected_operations[{}]: {}", name, i, e),
                    ));
                }
            }

            for (i, pattern) in env.git_branches.iter().enumerate() {
                if pattern.trim().is_empty() {
                    return Err(CliError::config(
                        path,
                        format!("environments.{}.git_branches[{}]: empty pattern", name, i),
                    ));
                }
            }

            if env.project_ref.as_deref().is_some_and(|r| r.trim().is_empty()) {
                return Err(CliError::config(
                    path,
                    format!("environments.{}.project_ref: empty value", name),
                ));
            }
        }
        Ok(())
    }

    /// Save configuration, replacing the whole file atomically
    pub fn save(&self, path: &Path) -> CliResult<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| CliError::config(path, format!("failed to serialize TOML: {}", e)))?;

        let tmp = temp_path(path);
        std::fs::write(&tmp, content)?;
        std::fs::rename(&tmp, path)?;
        debug!(path = %path.display(), "saved configuration");
        Ok(())
    }

    /// Reload the file, set one environment's lock, and save it back
    pub fn set_lock(path: &Path, environment: &str, locked: LockState) -> CliResult<Self> {
        let mut config = Self::load(path)?;
        let env = config.environments.get_mut(environment).ok_or_else(|| {
            CliError::config(path, format!("environment '{}' is not defined", environment))
        })?;
        env.locked = locked;
        config.save(path)?;
        Ok(config)
    }
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_else(|| CONFIG_FILE_NAME.into());
    name.push(".tmp");
    path.with_file_name(name)
}

/// External migration tool configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ToolConfig {
    /// Executable to run
    pub command: String,

    /// Local migrations directory
    pub migrations_dir: String,

    /// File containing the linked project ref
    pub linked_ref_path: String,

    /// Where `sync` backs up migrations before a pull
    pub backup_dir: String,
}

impl Default for ToolConfig {
    fn default() -> Self {
        Self {
            command: dbguard_core::tool::DEFAULT_TOOL.to_string(),
            migrations_dir: MIGRATIONS_DIR.to_string(),
            linked_ref_path: LINKED_REF_PATH.to_string(),
            backup_dir: BACKUP_DIR.to_string(),
        }
    }
}
