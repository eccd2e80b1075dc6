//! Working-tree inspection.

use std::path::Path;

use tokio::process::Command;
use tracing::warn;

use crate::error::{CoreError, CoreResult};

/// Git state consumed by the guards.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GitState {
    /// Current branch; `None` outside a repository or on a detached head.
    pub branch: Option<String>,
    /// Whether `git status --porcelain` reported anything.
    pub has_uncommitted_changes: bool,
}

impl GitState {
    /// Probe the repository containing `dir`.
    ///
    /// Outside a repository this returns an empty state rather than failing.
    pub async fn inspect(dir: &Path) -> Self {
        let branch = match git(dir, &["rev-parse", "--abbrev-ref", "HEAD"]).await {
            Ok(out) => parse_branch(&out),
            Err(e) => {
                warn!("could not determine git branch: {}", e);
                None
            }
        };

        let has_uncommitted_changes = match git(dir, &["status", "--porcelain"]).await {
            Ok(out) => has_changes(&out),
            Err(e) => {
                warn!("could not determine git status: {}", e);
                false
            }
        };

        Self {
            branch,
            has_uncommitted_changes,
        }
    }
}

async fn git(dir: &Path, args: &[&str]) -> CoreResult<String> {
    let output = Command::new("git")
        .args(args)
        .current_dir(dir)
        .output()
        .await
        .map_err(|e| CoreError::git(format!("failed to run git: {}", e)))?;

    if !output.status.success() {
        return Err(CoreError::git(
            String::from_utf8_lossy(&output.stderr).trim().to_string(),
        ));
    }
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

fn parse_branch(output: &str) -> Option<String> {
    let branch = output.trim();
    if branch.is_empty() || branch == "HEAD" {
        None
    } else {
        Some(branch.to_string())
    }
}

fn has_changes(porcelain: &str) -> bool {
    porcelain.lines().any(|line| !line.trim().is_empty())
}
