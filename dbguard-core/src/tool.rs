//! External migration tool.
//!
//! The tool is a black box: each [`ToolAction`] maps to a fixed argument
//! vector, and only the exit status and captured stdout are consumed.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, instrument};

use crate::environment::Operation;
use crate::error::{CoreError, CoreResult};

/// Default migration tool executable.
pub const DEFAULT_TOOL: &str = "supabase";

/// Where `migration fetch` places files, relative to its workdir.
pub const FETCHED_MIGRATIONS_DIR: &str = "supabase/migrations";

/// An invocation of the external tool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolAction {
    /// List local and remote migration history as a table.
    ListMigrations,
    /// Mark a remote migration as reverted.
    MarkReverted(String),
    /// Replace local migrations with the remote history.
    Pull,
    /// Apply local migrations.
    Push {
        /// Target the linked project instead of the local database.
        linked: bool,
    },
    /// Reset the database.
    Reset {
        /// Target the linked project instead of the local database.
        linked: bool,
    },
    /// Load seed data.
    Seed {
        /// Target the linked project instead of the local database.
        linked: bool,
    },
    /// Diff the schema.
    Diff {
        /// Target the linked project instead of the local database.
        linked: bool,
    },
    /// Link to a remote project.
    Link(String),
    /// Remove the remote link.
    Unlink,
    /// Download remote migration bodies into a scratch workdir.
    FetchRemote(PathBuf),
}

impl ToolAction {
    /// The action that carries out `operation`.
    ///
    /// Returns `None` for `link` when the environment has no project ref.
    pub fn for_operation(operation: Operation, project_ref: Option<&str>) -> Option<Self> {
        let linked = project_ref.is_some();
        let action = match operation {
            Operation::Push => ToolAction::Push { linked },
            Operation::Reset => ToolAction::Reset { linked },
            Operation::Pull => ToolAction::Pull,
            Operation::Seed => ToolAction::Seed { linked },
            Operation::Diff => ToolAction::Diff { linked },
            Operation::Link => ToolAction::Link(project_ref?.to_string()),
            Operation::Unlink => ToolAction::Unlink,
        };
        Some(action)
    }

    /// Fixed argument vector.
    pub fn args(&self) -> Vec<String> {
        fn target(linked: bool) -> &'static str {
            if linked { "--linked" } else { "--local" }
        }

        let args: Vec<&str> = match self {
            ToolAction::ListMigrations => vec!["migration", "list"],
            ToolAction::MarkReverted(ts) => {
                vec!["migration", "repair", "--status", "reverted", ts.as_str()]
            }
            ToolAction::Pull => vec!["db", "pull"],
            ToolAction::Push { linked } => vec!["db", "push", target(*linked)],
            ToolAction::Reset { linked } => vec!["db", "reset", target(*linked)],
            ToolAction::Seed { linked } => vec!["db", "seed", target(*linked)],
            ToolAction::Diff { linked } => vec!["db", "diff", target(*linked)],
            ToolAction::Link(project_ref) => vec!["link", "--project-ref", project_ref.as_str()],
            ToolAction::Unlink => vec!["unlink"],
            ToolAction::FetchRemote(workdir) => {
                return vec![
                    "migration".to_string(),
                    "fetch".to_string(),
                    "--workdir".to_string(),
                    workdir.display().to_string(),
                ];
            }
        };
        args.into_iter().map(str::to_string).collect()
    }

    /// Whether stdout is captured rather than shown to the user.
    pub fn captures_output(&self) -> bool {
        matches!(
            self,
            ToolAction::ListMigrations | ToolAction::MarkReverted(_) | ToolAction::FetchRemote(_)
        )
    }

    /// Directory holding migrations downloaded by [`ToolAction::FetchRemote`].
    pub fn fetched_migrations_dir(workdir: &Path) -> PathBuf {
        workdir.join(FETCHED_MIGRATIONS_DIR)
    }
}

/// What the tool reported.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ToolOutput {
    /// Exit status was zero.
    pub success: bool,
    /// Exit code, if the process exited normally.
    pub code: Option<i32>,
    /// Captured stdout (empty for passthrough actions).
    pub stdout: String,
}

impl ToolOutput {
    /// A successful run with the given stdout.
    pub fn ok(stdout: impl Into<String>) -> Self {
        Self {
            success: true,
            code: Some(0),
            stdout: stdout.into(),
        }
    }

    /// A failed run with the given exit code.
    pub fn failed(code: i32) -> Self {
        Self {
            success: false,
            code: Some(code),
            stdout: String::new(),
        }
    }

    /// Short description of a failure for error messages.
    pub fn describe_failure(&self) -> String {
        match self.code {
            Some(code) => format!("exit code {}", code),
            None => "terminated by signal".to_string(),
        }
    }
}

/// Runs external migration tool actions.
#[async_trait]
pub trait MigrationTool: Send + Sync {
    /// Run an action to completion.
    async fn run(&self, action: &ToolAction) -> CoreResult<ToolOutput>;
}

/// Runs the tool as a subprocess.
#[derive(Debug, Clone)]
pub struct ProcessTool {
    program: String,
    workdir: Option<PathBuf>,
}

impl ProcessTool {
    /// Create a tool that runs `program`.
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            workdir: None,
        }
    }

    /// Run the tool from `dir`.
    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.workdir = Some(dir.into());
        self
    }

    /// The executable name.
    pub fn program(&self) -> &str {
        &self.program
    }
}

impl Default for ProcessTool {
    fn default() -> Self {
        Self::new(DEFAULT_TOOL)
    }
}

#[async_trait]
impl MigrationTool for ProcessTool {
    #[instrument(skip(self), fields(program = %self.program))]
    async fn run(&self, action: &ToolAction) -> CoreResult<ToolOutput> {
        let args = action.args();
        debug!(?args, "invoking migration tool");

        let mut command = Command::new(&self.program);
        command.args(&args).stdin(Stdio::inherit()).stderr(Stdio::inherit());
        if let Some(dir) = &self.workdir {
            command.current_dir(dir);
        }

        let spawn_error =
            |e: std::io::Error| CoreError::tool(format!("failed to run '{}': {}", self.program, e));

        let output = if action.captures_output() {
            let output = command
                .stdout(Stdio::piped())
                .output()
                .await
                .map_err(spawn_error)?;
            ToolOutput {
                success: output.status.success(),
                code: output.status.code(),
                stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            }
        } else {
            let status = command
                .stdout(Stdio::inherit())
                .status()
                .await
                .map_err(spawn_error)?;
            ToolOutput {
                success: status.success(),
                code: status.code(),
                stdout: String::new(),
            }
        };

        debug!(success = output.success, code = ?output.code, "migration tool finished");
        Ok(output)
    }
}
