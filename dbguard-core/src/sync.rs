//! Migration drift detection.
//!
//! Local migrations are the `.sql` files in the migrations directory, keyed
//! by their leading 14-digit timestamp. Remote migrations come from the
//! tool's `migration list` table:
//!
//! ```text
//!    Local          | Remote         | Time (UTC)
//!   ----------------|----------------|---------------------
//!    20260115000000 | 20260115000000 | 2026-01-15 00:00:00
//!                   | 20260116000044 | 2026-01-16 00:00:44
//! ```
//!
//! Drift that only adds local migrations is the normal "ready to push" case;
//! a sync is needed only when the remote has migrations we don't.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::diff::TIMESTAMP_LEN;
use crate::error::{CoreError, CoreResult};
use crate::tool::{MigrationTool, ToolAction};

/// Suffix of remote variants saved next to a local migration.
pub const REMOTE_VARIANT_SUFFIX: &str = ".remote.sql";

/// Result of comparing local and remote migration history.
///
/// Computed fresh on every check; never persisted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MigrationSyncStatus {
    /// The remote has migrations missing locally.
    pub needs_sync: bool,
    /// Timestamps present remotely but not locally, ascending.
    pub remote_missing: Vec<String>,
    /// Timestamps present locally but not remotely, ascending.
    pub local_missing: Vec<String>,
    /// Why the check could not complete. Both lists are empty when set.
    pub error: Option<String>,
}

impl MigrationSyncStatus {
    /// Compare two timestamp sets.
    pub fn compare(local: &BTreeSet<String>, remote: &BTreeSet<String>) -> Self {
        let remote_missing: Vec<String> = remote.difference(local).cloned().collect();
        let local_missing: Vec<String> = local.difference(remote).cloned().collect();
        Self {
            needs_sync: !remote_missing.is_empty(),
            remote_missing,
            local_missing,
            error: None,
        }
    }

    /// A check that could not complete.
    pub fn unknown(error: impl Into<String>) -> Self {
        Self {
            error: Some(error.into()),
            ..Default::default()
        }
    }

    /// Whether the state is unknown because the check failed.
    pub fn is_unknown(&self) -> bool {
        self.error.is_some()
    }

    /// Whether local and remote agree exactly.
    pub fn is_in_sync(&self) -> bool {
        !self.is_unknown() && self.remote_missing.is_empty() && self.local_missing.is_empty()
    }
}

/// A migration file in the local migrations directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalMigration {
    /// Leading timestamp (or the whole stem when there is no `_`).
    pub timestamp: String,
    /// File name, e.g. `20260116000044_add_users.sql`.
    pub file_name: String,
    /// Full path.
    pub path: PathBuf,
}

impl LocalMigration {
    /// Build from a file name, or `None` if it is not a local migration.
    pub fn from_path(path: &Path) -> Option<Self> {
        let file_name = path.file_name()?.to_str()?;
        if file_name.ends_with(REMOTE_VARIANT_SUFFIX) {
            return None;
        }
        let stem = file_name.strip_suffix(".sql")?;
        Some(Self {
            timestamp: timestamp_of(stem).to_string(),
            file_name: file_name.to_string(),
            path: path.to_path_buf(),
        })
    }

    /// Part of the file name after the timestamp, including the leading `_`.
    pub fn suffix(&self) -> &str {
        &self.file_name[self.timestamp.len()..]
    }
}

/// Leading timestamp of a migration stem.
pub fn timestamp_of(stem: &str) -> &str {
    stem.split_once('_').map_or(stem, |(ts, _)| ts)
}

/// List local migrations sorted by file name. A missing directory is empty.
pub async fn list_local_migrations(dir: &Path) -> CoreResult<Vec<LocalMigration>> {
    let mut migrations = Vec::new();

    if !tokio::fs::try_exists(dir).await? {
        return Ok(migrations);
    }

    let mut entries = tokio::fs::read_dir(dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        if !entry.file_type().await?.is_file() {
            continue;
        }
        if let Some(migration) = LocalMigration::from_path(&entry.path()) {
            migrations.push(migration);
        }
    }

    migrations.sort_by(|a, b| a.file_name.cmp(&b.file_name));
    Ok(migrations)
}

/// Extract remote timestamps from `migration list` output.
///
/// Malformed or empty output yields an empty set.
pub fn parse_migration_list(stdout: &str) -> BTreeSet<String> {
    let mut remote = BTreeSet::new();

    for line in stdout.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.contains("Local") || is_separator(trimmed) {
            continue;
        }

        let column = if trimmed.contains('|') {
            match trimmed.split('|').nth(1) {
                Some(remote_column) => remote_column,
                None => continue,
            }
        } else {
            trimmed
        };

        if let Some(ts) = find_timestamp_token(column) {
            remote.insert(ts.to_string());
        }
    }

    remote
}

fn is_separator(line: &str) -> bool {
    line.chars()
        .all(|c| matches!(c, '-' | '|' | '+' | ' ' | '─' | '┼' | '│'))
}

fn find_timestamp_token(text: &str) -> Option<&str> {
    text.split(|c: char| !c.is_ascii_digit())
        .find(|token| token.len() == TIMESTAMP_LEN)
}

/// Compares local migration files with the remote history.
pub struct MigrationSync<'a> {
    migrations_dir: PathBuf,
    tool: &'a dyn MigrationTool,
}

impl<'a> MigrationSync<'a> {
    /// Create a sync engine.
    pub fn new(migrations_dir: impl Into<PathBuf>, tool: &'a dyn MigrationTool) -> Self {
        Self {
            migrations_dir: migrations_dir.into(),
            tool,
        }
    }

    /// The local migrations directory.
    pub fn migrations_dir(&self) -> &Path {
        &self.migrations_dir
    }

    /// Local timestamps.
    pub async fn local_timestamps(&self) -> CoreResult<BTreeSet<String>> {
        Ok(list_local_migrations(&self.migrations_dir)
            .await?
            .into_iter()
            .map(|m| m.timestamp)
            .collect())
    }

    /// Remote timestamps, from the tool's migration listing.
    pub async fn remote_timestamps(&self) -> CoreResult<BTreeSet<String>> {
        let output = self.tool.run(&ToolAction::ListMigrations).await?;
        if !output.success {
            return Err(CoreError::tool(format!(
                "migration list failed with {}",
                output.describe_failure()
            )));
        }
        Ok(parse_migration_list(&output.stdout))
    }

    /// Check for drift. Failures are reported in
    /// [`MigrationSyncStatus::error`], never returned.
    pub async fn check_sync(&self) -> MigrationSyncStatus {
        match self.try_check_sync().await {
            Ok(status) => {
                debug!(
                    needs_sync = status.needs_sync,
                    remote_missing = status.remote_missing.len(),
                    local_missing = status.local_missing.len(),
                    "migration sync checked"
                );
                status
            }
            Err(e) => {
                warn!("migration sync check failed: {}", e);
                MigrationSyncStatus::unknown(e.to_string())
            }
        }
    }

    async fn try_check_sync(&self) -> CoreResult<MigrationSyncStatus> {
        let local = self.local_timestamps().await?;
        let remote = self.remote_timestamps().await?;
        Ok(MigrationSyncStatus::compare(&local, &remote))
    }
}
