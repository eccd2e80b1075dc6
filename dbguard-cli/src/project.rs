//! Loaded project: configuration plus the paths and lookups derived from it.

use std::path::{Path, PathBuf};

use dbguard_core::environment::LOCAL_ENVIRONMENT;
use dbguard_core::{EnvironmentResolver, MatchType, ProcessTool, Resolution};
use tracing::debug;

use crate::config::{CONFIG_FILE_NAME, Config};
use crate::error::{CliError, CliResult};

/// A project rooted at the directory holding its `dbguard.toml`.
#[derive(Debug, Clone)]
pub struct Project {
    /// Project root.
    pub root: PathBuf,
    /// Path of the loaded configuration file.
    pub config_path: PathBuf,
    /// Loaded configuration.
    pub config: Config,
}

impl Project {
    /// Load from `config_path`, or `./dbguard.toml` when not given.
    pub fn load(config_path: Option<&Path>) -> CliResult<Self> {
        let cwd = std::env::current_dir()?;
        let config_path = match config_path {
            Some(path) if path.is_absolute() => path.to_path_buf(),
            Some(path) => cwd.join(path),
            None => cwd.join(CONFIG_FILE_NAME),
        };

        if !config_path.exists() {
            return Err(CliError::config(
                &config_path,
                "file not found; run `dbguard init` to create one",
            ));
        }

        let config = Config::load(&config_path)?;
        let root = config_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or(cwd);

        debug!(root = %root.display(), "loaded project");
        Ok(Self {
            root,
            config_path,
            config,
        })
    }

    /// Local migrations directory.
    pub fn migrations_dir(&self) -> PathBuf {
        self.root.join(&self.config.tool.migrations_dir)
    }

    /// Backup directory for pulls.
    pub fn backup_dir(&self) -> PathBuf {
        self.root.join(&self.config.tool.backup_dir)
    }

    /// The external migration tool, run from the project root.
    pub fn tool(&self) -> ProcessTool {
        ProcessTool::new(&self.config.tool.command).current_dir(&self.root)
    }

    /// Project ref the working copy is linked to, if any.
    pub fn linked_project_ref(&self) -> Option<String> {
        let path = self.root.join(&self.config.tool.linked_ref_path);
        std::fs::read_to_string(path)
            .ok()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
    }

    /// Resolve the target environment.
    ///
    /// An explicit name wins, then the linked project ref, then the git
    /// branch, then the `local` environment.
    pub fn resolve(
        &self,
        explicit: Option<&str>,
        linked_project_ref: Option<&str>,
        branch: Option<&str>,
    ) -> CliResult<Resolution<'_>> {
        let resolver = EnvironmentResolver::new(&self.config.environments);

        if let Some(name) = explicit {
            return resolver.by_name(name).ok_or_else(|| {
                CliError::config(
                    &self.config_path,
                    format!("environment '{}' is not defined", name),
                )
            });
        }

        if let Some(resolved) = linked_project_ref.and_then(|r| resolver.resolve_by_project_ref(r)) {
            return Ok(resolved);
        }

        let resolved = match branch {
            Some(branch) => resolver.resolve(branch),
            None => resolver.by_name(LOCAL_ENVIRONMENT).map(|r| Resolution {
                match_type: MatchType::Fallback,
                ..r
            }),
        };

        resolved.ok_or_else(|| {
            CliError::Command(format!(
                "no environment matches branch '{}' and no '{}' environment is defined; pass --env",
                branch.unwrap_or("(none)"),
                LOCAL_ENVIRONMENT
            ))
        })
    }
}
