//! Repairing migration drift.
//!
//! Every action here is chosen interactively by the caller; nothing runs
//! implicitly.
//!
//! - **Repair history**: mark remote-only migrations as reverted so local
//!   files become the source of truth. Stops at the first failure.
//! - **Pull**: back up local files (best effort), then let the tool replace
//!   them with the remote history.
//! - **Per-conflict resolution**: when both sides have the same timestamp
//!   with different bodies, keep the remote body, keep the local one, or
//!   save the remote body next to it as `<timestamp>.remote.sql`.
//! - **Reorder**: rename local-only migrations older than the newest remote
//!   migration so that file order matches application order again.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::{Path, PathBuf};

use chrono::{Duration, NaiveDateTime};
use tracing::{debug, info, warn};

use crate::diff::{
    Clock, SimpleDiff, compute_simple_diff, content_hash, format_timestamp,
    generate_migration_timestamp, parse_timestamp,
};
use crate::error::{CoreError, CoreResult};
use crate::sync::{LocalMigration, REMOTE_VARIANT_SUFFIX, list_local_migrations};
use crate::tool::{MigrationTool, ToolAction};

/// What to do about detected drift or a conflicting migration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictChoice {
    /// Mark remote-only migrations as reverted.
    Repair,
    /// Replace local migrations with the remote history.
    Pull,
    /// Overwrite the local body with the remote one.
    KeepRemote,
    /// Leave the local file alone.
    KeepLocal,
    /// Save the remote body as `<timestamp>.remote.sql`.
    SaveBoth,
    /// Do nothing.
    Cancel,
}

impl ConflictChoice {
    /// Choices offered when the remote has migrations we don't.
    pub const STRATEGIES: [ConflictChoice; 3] = [
        ConflictChoice::Repair,
        ConflictChoice::Pull,
        ConflictChoice::Cancel,
    ];

    /// Choices offered for one conflicting migration.
    pub const PER_CONFLICT: [ConflictChoice; 4] = [
        ConflictChoice::KeepRemote,
        ConflictChoice::KeepLocal,
        ConflictChoice::SaveBoth,
        ConflictChoice::Cancel,
    ];

    /// Menu label.
    pub fn label(&self) -> &'static str {
        match self {
            ConflictChoice::Repair => "Repair history (mark remote-only migrations as reverted)",
            ConflictChoice::Pull => "Pull from remote (replace local migrations)",
            ConflictChoice::KeepRemote => "Keep remote (overwrite local file)",
            ConflictChoice::KeepLocal => "Keep local (leave file untouched)",
            ConflictChoice::SaveBoth => "Save both (write remote copy as .remote.sql)",
            ConflictChoice::Cancel => "Cancel",
        }
    }
}

impl fmt::Display for ConflictChoice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A migration body downloaded from the remote history.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteMigration {
    /// Leading timestamp.
    pub timestamp: String,
    /// File name as fetched.
    pub file_name: String,
    /// Body.
    pub content: String,
}

/// Same timestamp on both sides, different bodies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationConflict {
    /// Shared timestamp.
    pub timestamp: String,
    /// Local file.
    pub local_path: PathBuf,
    /// Local body.
    pub local_content: String,
    /// Remote body.
    pub remote_content: String,
    /// Digest of the local body.
    pub local_hash: String,
    /// Digest of the remote body.
    pub remote_hash: String,
    /// Line-set diff, local against remote.
    pub diff: SimpleDiff,
}

/// What happened to one conflict.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConflictResolution {
    /// Local file now holds the remote body.
    Overwritten(PathBuf),
    /// Local file untouched.
    Kept,
    /// Remote body written alongside.
    SavedRemote(PathBuf),
    /// The user cancelled.
    Cancelled,
}

/// Outcome of a pull.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PullReport {
    /// Where the local files were backed up.
    pub backup_dir: Option<PathBuf>,
    /// Why the backup failed; the pull still ran.
    pub backup_error: Option<String>,
}

/// A renamed migration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenamedMigration {
    /// Old file name.
    pub from: String,
    /// New file name.
    pub to: String,
}

/// A rename that failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenameFailure {
    /// File that could not be renamed.
    pub file_name: String,
    /// Why.
    pub error: String,
}

/// Outcome of reordering local-only migrations.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReorderReport {
    /// Successful renames, in order.
    pub renamed: Vec<RenamedMigration>,
    /// Failed renames; remaining files were still processed.
    pub failed: Vec<RenameFailure>,
}

impl ReorderReport {
    /// Whether nothing needed renaming.
    pub fn is_empty(&self) -> bool {
        self.renamed.is_empty() && self.failed.is_empty()
    }
}

/// Local-only timestamps that sort before the newest remote timestamp.
pub fn out_of_order<'t>(local_only: &'t [String], remote: &BTreeSet<String>) -> Vec<&'t str> {
    let Some(latest) = remote.iter().next_back() else {
        return Vec::new();
    };
    local_only
        .iter()
        .filter(|ts| ts.as_str() < latest.as_str())
        .map(String::as_str)
        .collect()
}

/// Repair and rescue actions over a local migrations directory.
pub struct Rescue<'a> {
    migrations_dir: PathBuf,
    tool: &'a dyn MigrationTool,
    clock: &'a dyn Clock,
}

impl<'a> Rescue<'a> {
    /// Create a rescue engine.
    pub fn new(
        migrations_dir: impl Into<PathBuf>,
        tool: &'a dyn MigrationTool,
        clock: &'a dyn Clock,
    ) -> Self {
        Self {
            migrations_dir: migrations_dir.into(),
            tool,
            clock,
        }
    }

    /// The local migrations directory.
    pub fn migrations_dir(&self) -> &Path {
        &self.migrations_dir
    }

    /// Mark every remote-only migration as reverted, in order.
    ///
    /// The first failure aborts; the error names the failing timestamp and
    /// carries the ones already reverted.
    pub async fn repair_history(&self, remote_missing: &[String]) -> CoreResult<Vec<String>> {
        let mut reverted = Vec::with_capacity(remote_missing.len());

        for timestamp in remote_missing {
            let action = ToolAction::MarkReverted(timestamp.clone());
            let message = match self.tool.run(&action).await {
                Ok(output) if output.success => None,
                Ok(output) => Some(output.describe_failure()),
                Err(e) => Some(e.to_string()),
            };

            if let Some(message) = message {
                warn!(timestamp = %timestamp, "repair aborted: {}", message);
                return Err(CoreError::RepairFailed {
                    timestamp: timestamp.clone(),
                    reverted,
                    message,
                });
            }

            info!(timestamp = %timestamp, "marked migration as reverted");
            reverted.push(timestamp.clone());
        }

        Ok(reverted)
    }

    /// Copy every local migration file into a new timestamped directory
    /// under `backup_root`.
    pub async fn backup_local(&self, backup_root: &Path) -> CoreResult<PathBuf> {
        let stamp = generate_migration_timestamp(self.clock);
        let backup_dir = backup_root.join(format!("backup_{}", stamp));
        tokio::fs::create_dir_all(&backup_dir).await?;

        if tokio::fs::try_exists(&self.migrations_dir).await? {
            let mut entries = tokio::fs::read_dir(&self.migrations_dir).await?;
            while let Some(entry) = entries.next_entry().await? {
                if entry.file_type().await?.is_file() {
                    tokio::fs::copy(entry.path(), backup_dir.join(entry.file_name())).await?;
                }
            }
        }

        debug!(dir = %backup_dir.display(), "backed up local migrations");
        Ok(backup_dir)
    }

    /// Replace local migrations with the remote history.
    ///
    /// With `backup_root`, local files are backed up first; a failed backup
    /// is reported but does not stop the pull.
    pub async fn pull_from_remote(&self, backup_root: Option<&Path>) -> CoreResult<PullReport> {
        let mut report = PullReport::default();

        if let Some(root) = backup_root {
            match self.backup_local(root).await {
                Ok(dir) => report.backup_dir = Some(dir),
                Err(e) => {
                    warn!("backup failed, pulling anyway: {}", e);
                    report.backup_error = Some(e.to_string());
                }
            }
        }

        let output = self.tool.run(&ToolAction::Pull).await?;
        if !output.success {
            return Err(CoreError::tool(format!(
                "pull failed with {}",
                output.describe_failure()
            )));
        }

        info!("pulled migrations from remote");
        Ok(report)
    }

    /// Download remote migration bodies, keyed by timestamp.
    pub async fn fetch_remote_migrations(&self) -> CoreResult<BTreeMap<String, RemoteMigration>> {
        let scratch = tempfile::tempdir()?;
        let output = self
            .tool
            .run(&ToolAction::FetchRemote(scratch.path().to_path_buf()))
            .await?;
        if !output.success {
            return Err(CoreError::tool(format!(
                "fetching remote migrations failed with {}",
                output.describe_failure()
            )));
        }

        let fetched = ToolAction::fetched_migrations_dir(scratch.path());
        let mut remote = BTreeMap::new();
        for migration in list_local_migrations(&fetched).await? {
            let content = tokio::fs::read_to_string(&migration.path).await?;
            remote.insert(
                migration.timestamp.clone(),
                RemoteMigration {
                    timestamp: migration.timestamp,
                    file_name: migration.file_name,
                    content,
                },
            );
        }

        debug!(count = remote.len(), "fetched remote migrations");
        Ok(remote)
    }

    /// Find local migrations whose body differs from the remote one.
    pub async fn detect_conflicts(
        &self,
        remote: &BTreeMap<String, RemoteMigration>,
    ) -> CoreResult<Vec<MigrationConflict>> {
        let mut conflicts = Vec::new();

        for local in list_local_migrations(&self.migrations_dir).await? {
            let Some(remote) = remote.get(&local.timestamp) else {
                continue;
            };

            let local_content = tokio::fs::read_to_string(&local.path).await?;
            let local_hash = content_hash(&local_content);
            let remote_hash = content_hash(&remote.content);
            if local_hash == remote_hash {
                continue;
            }

            conflicts.push(MigrationConflict {
                timestamp: local.timestamp,
                local_path: local.path,
                diff: compute_simple_diff(&local_content, &remote.content),
                local_content,
                remote_content: remote.content.clone(),
                local_hash,
                remote_hash,
            });
        }

        Ok(conflicts)
    }

    /// Apply a per-conflict choice.
    pub async fn resolve_conflict(
        &self,
        conflict: &MigrationConflict,
        choice: ConflictChoice,
    ) -> CoreResult<ConflictResolution> {
        let resolution = match choice {
            ConflictChoice::KeepRemote => {
                tokio::fs::write(&conflict.local_path, &conflict.remote_content).await?;
                ConflictResolution::Overwritten(conflict.local_path.clone())
            }
            ConflictChoice::KeepLocal => ConflictResolution::Kept,
            ConflictChoice::SaveBoth => {
                let path = self
                    .migrations_dir
                    .join(format!("{}{}", conflict.timestamp, REMOTE_VARIANT_SUFFIX));
                tokio::fs::write(&path, &conflict.remote_content).await?;
                ConflictResolution::SavedRemote(path)
            }
            ConflictChoice::Cancel => ConflictResolution::Cancelled,
            ConflictChoice::Repair | ConflictChoice::Pull => {
                return Err(CoreError::invalid_migration(format!(
                    "'{}' cannot resolve a single conflict",
                    choice.label()
                )));
            }
        };

        info!(timestamp = %conflict.timestamp, ?resolution, "resolved migration conflict");
        Ok(resolution)
    }

    /// Rename local-only migrations that sort before `latest_remote` so they
    /// sort after it, keeping their relative order.
    ///
    /// New timestamps start at the current time, or one second past
    /// `latest_remote` if that is later, and increase by at least a second
    /// per file. Rename failures are collected, not returned.
    pub async fn reorder_local_only(
        &self,
        local_only: &[String],
        latest_remote: &str,
    ) -> CoreResult<ReorderReport> {
        let wanted: BTreeSet<&str> = local_only
            .iter()
            .map(String::as_str)
            .filter(|ts| *ts < latest_remote)
            .collect();

        let mut report = ReorderReport::default();
        if wanted.is_empty() {
            return Ok(report);
        }

        let targets: Vec<LocalMigration> = list_local_migrations(&self.migrations_dir)
            .await?
            .into_iter()
            .filter(|m| wanted.contains(m.timestamp.as_str()))
            .collect();

        let now = parse_timestamp(&generate_migration_timestamp(self.clock))?;
        let mut floor = parse_timestamp(latest_remote)?;

        for migration in targets {
            let next = next_timestamp(now, floor);
            floor = next;

            let to = format!("{}{}", format_timestamp(next), migration.suffix());
            let destination = self.migrations_dir.join(&to);

            let result = match tokio::fs::try_exists(&destination).await {
                Ok(true) => Err(format!("{} already exists", to)),
                Ok(false) => tokio::fs::rename(&migration.path, &destination)
                    .await
                    .map_err(|e| e.to_string()),
                Err(e) => Err(e.to_string()),
            };

            match result {
                Ok(()) => {
                    info!(from = %migration.file_name, to = %to, "reordered migration");
                    report.renamed.push(RenamedMigration {
                        from: migration.file_name,
                        to,
                    });
                }
                Err(error) => {
                    warn!(file = %migration.file_name, "rename failed: {}", error);
                    report.failed.push(RenameFailure {
                        file_name: migration.file_name,
                        error,
                    });
                }
            }
        }

        Ok(report)
    }
}

fn next_timestamp(now: NaiveDateTime, floor: NaiveDateTime) -> NaiveDateTime {
    now.max(floor + Duration::seconds(1))
}
