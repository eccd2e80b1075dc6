//! `dbguard sync` command - Detect and repair migration drift.

use std::path::Path;

use dbguard_core::rescue::{ConflictChoice, ConflictResolution, MigrationConflict, Rescue, out_of_order};
use dbguard_core::{
    GitState, MigrationSync, MigrationSyncStatus, MigrationTool, Operation, Outcome, Prompter,
    SystemClock,
};

use crate::cli::{GlobalArgs, SyncArgs};
use crate::commands::guarded::Target;
use crate::error::{CliError, CliResult};
use crate::output::{self, TerminalPrompter};
use crate::project::Project;

/// Run the sync command
pub async fn run(global: &GlobalArgs, args: SyncArgs) -> CliResult<()> {
    output::header("Migration Sync");

    let project = Project::load(global.config.as_deref())?;
    let git = GitState::inspect(&project.root).await;
    let linked = project.linked_project_ref();
    let resolved = project.resolve(args.env.as_deref(), linked.as_deref(), git.branch.as_deref())?;
    output::kv("Environment", resolved.name);
    output::kv("Migrations", &project.migrations_dir().display().to_string());
    output::newline();

    let target = Target {
        name: resolved.name,
        environment: resolved.environment,
        settings: &project.config.settings,
        git: &git,
        linked_project_ref: linked.as_deref(),
        ci: global.ci,
        force: args.force,
    };

    // Reading the remote history targets the linked project.
    target.check(Operation::Diff)?;

    let tool = project.tool();
    let status = MigrationSync::new(project.migrations_dir(), &tool)
        .check_sync()
        .await;
    print_status(&status);

    if let Some(error) = &status.error {
        return Err(CliError::Tool(format!("could not check migration sync: {}", error)));
    }

    let mut prompter = TerminalPrompter::stdin();
    if status.needs_sync {
        if global.ci {
            return Err(CliError::Blocked(
                "the remote has migrations missing locally; run `dbguard sync` interactively"
                    .to_string(),
            ));
        }
        reconcile(&project, &tool, &status, &target, &mut prompter).await?;
    }

    if !args.skip_conflicts {
        resolve_conflicts(&project, &tool, &mut prompter, global.ci).await?;
    }

    output::newline();
    output::success("Migration sync complete");
    Ok(())
}

/// Check sync before a push and offer the rescue flow on drift.
///
/// An unknown status is advisory: the push continues with a warning.
pub(crate) async fn precheck(
    project: &Project,
    tool: &dyn MigrationTool,
    target: &Target<'_>,
    prompter: &mut dyn Prompter,
) -> CliResult<()> {
    output::info("Checking migration sync...");
    let status = MigrationSync::new(project.migrations_dir(), tool)
        .check_sync()
        .await;

    if let Some(error) = &status.error {
        output::warn(&format!("Could not check migration sync: {}", error));
        output::dim("  Proceeding without a sync check; verify the remote history manually");
        return Ok(());
    }

    if !status.needs_sync {
        output::success("Local and remote migrations are in sync");
        return Ok(());
    }

    print_status(&status);
    if target.ci {
        return Err(CliError::Blocked(
            "the remote has migrations missing locally; run `dbguard sync` first".to_string(),
        ));
    }

    reconcile(project, tool, &status, target, prompter).await
}

/// Print drift details
pub(crate) fn print_status(status: &MigrationSyncStatus) {
    if let Some(error) = &status.error {
        output::kv("Sync", &output::style_error("unknown"));
        output::dim(&format!("  {}", error));
        return;
    }

    if status.is_in_sync() {
        output::kv("Sync", &output::style_success("in sync"));
        return;
    }

    let label = if status.needs_sync { "needs sync" } else { "ready to push" };
    output::kv("Sync", &output::style_pending(label));
    if !status.remote_missing.is_empty() {
        output::section("Remote only");
        for ts in &status.remote_missing {
            output::list_item(ts);
        }
    }
    if !status.local_missing.is_empty() {
        output::section("Local only");
        for ts in &status.local_missing {
            output::list_item(ts);
        }
    }
}

/// Pick and run a repair strategy for remote-only migrations.
///
/// The chosen strategy is guarded on its own: repair rewrites remote
/// history like a push, pull replaces local files.
async fn reconcile(
    project: &Project,
    tool: &dyn MigrationTool,
    status: &MigrationSyncStatus,
    target: &Target<'_>,
    prompter: &mut dyn Prompter,
) -> CliResult<()> {
    let clock = SystemClock;
    let rescue = Rescue::new(project.migrations_dir(), tool, &clock);

    output::newline();
    let labels: Vec<&str> = ConflictChoice::STRATEGIES.iter().map(|c| c.label()).collect();
    let choice = match prompter.select(
        "The remote has migrations that are missing locally. How do you want to reconcile?",
        &labels,
    ) {
        Outcome::Value(index) => ConflictChoice::STRATEGIES[index],
        Outcome::Cancelled => return Err(CliError::Cancelled),
    };

    match choice {
        ConflictChoice::Repair => {
            target.check(Operation::Push)?;
            repair(&rescue, &status.remote_missing, prompter, target.ci).await?;
            reorder(project, tool, &rescue, &status.local_missing, prompter).await
        }
        ConflictChoice::Pull => {
            target.check(Operation::Pull)?;
            pull(project, &rescue, prompter).await
        }
        _ => Err(CliError::Cancelled),
    }
}

async fn repair(
    rescue: &Rescue<'_>,
    remote_missing: &[String],
    prompter: &mut dyn Prompter,
    ci: bool,
) -> CliResult<()> {
    if ci {
        return Err(CliError::Blocked(
            "history repair needs an interactive session".to_string(),
        ));
    }

    let question = format!(
        "Mark {} remote-only migration(s) as reverted?",
        remote_missing.len()
    );
    match prompter.confirm(&question) {
        Outcome::Value(true) => {}
        Outcome::Value(false) => {
            return Err(CliError::Declined("history repair was not confirmed".to_string()));
        }
        Outcome::Cancelled => return Err(CliError::Cancelled),
    }

    match rescue.repair_history(remote_missing).await {
        Ok(reverted) => {
            for ts in &reverted {
                output::list_item(&format!("reverted {}", ts));
            }
            output::success(&format!("Repaired {} migration(s)", reverted.len()));
            Ok(())
        }
        Err(e) => {
            let done = e.reverted_before_failure();
            if !done.is_empty() {
                output::section("Reverted before the failure");
                for ts in done {
                    output::list_item(ts);
                }
            }
            Err(e.into())
        }
    }
}

/// Rename local-only migrations that now sort before the remote head.
async fn reorder(
    project: &Project,
    tool: &dyn MigrationTool,
    rescue: &Rescue<'_>,
    local_only: &[String],
    prompter: &mut dyn Prompter,
) -> CliResult<()> {
    if local_only.is_empty() {
        return Ok(());
    }

    let remote = match MigrationSync::new(project.migrations_dir(), tool)
        .remote_timestamps()
        .await
    {
        Ok(remote) => remote,
        Err(e) => {
            output::warn(&format!("Skipping reorder check: {}", e));
            return Ok(());
        }
    };

    let stale = out_of_order(local_only, &remote);
    let Some(latest) = remote.iter().next_back() else {
        return Ok(());
    };
    if stale.is_empty() {
        return Ok(());
    }

    output::newline();
    output::section(&format!("Local-only migrations older than {}", latest));
    for ts in &stale {
        output::list_item(ts);
    }
    match prompter.confirm("Rename them so they apply after the remote history?") {
        Outcome::Value(true) => {}
        Outcome::Value(false) => {
            output::warn("Left out-of-order migrations in place");
            return Ok(());
        }
        Outcome::Cancelled => return Err(CliError::Cancelled),
    }

    let report = rescue.reorder_local_only(local_only, latest).await?;
    for renamed in &report.renamed {
        output::list_item(&format!("{} -> {}", renamed.from, renamed.to));
    }
    for failure in &report.failed {
        output::warn(&format!("{}: {}", failure.file_name, failure.error));
    }
    if report.failed.is_empty() {
        output::success(&format!("Renamed {} migration(s)", report.renamed.len()));
    }
    Ok(())
}

async fn pull(project: &Project, rescue: &Rescue<'_>, prompter: &mut dyn Prompter) -> CliResult<()> {
    let backup_root = project.backup_dir();
    let backup = match prompter.confirm("Back up local migrations before pulling?") {
        Outcome::Value(true) => Some(backup_root.as_path()),
        Outcome::Value(false) => None,
        Outcome::Cancelled => return Err(CliError::Cancelled),
    };

    let report = rescue.pull_from_remote(backup).await?;
    if let Some(dir) = &report.backup_dir {
        output::info(&format!("Backed up local migrations to {}", dir.display()));
    }
    if let Some(error) = &report.backup_error {
        output::warn(&format!("Backup failed: {}", error));
    }
    output::success("Pulled migrations from remote");
    Ok(())
}

/// Compare bodies of migrations present on both sides.
async fn resolve_conflicts(
    project: &Project,
    tool: &dyn MigrationTool,
    prompter: &mut dyn Prompter,
    ci: bool,
) -> CliResult<()> {
    let clock = SystemClock;
    let rescue = Rescue::new(project.migrations_dir(), tool, &clock);

    output::newline();
    output::info("Comparing migration bodies with the remote...");
    let remote = match rescue.fetch_remote_migrations().await {
        Ok(remote) => remote,
        Err(e) => {
            output::warn(&format!("Skipping conflict check: {}", e));
            return Ok(());
        }
    };

    let conflicts = rescue.detect_conflicts(&remote).await?;
    if conflicts.is_empty() {
        output::success("No conflicting migration bodies");
        return Ok(());
    }
    if ci {
        return Err(CliError::Blocked(format!(
            "{} migration(s) differ from the remote; resolve them interactively",
            conflicts.len()
        )));
    }

    let labels: Vec<&str> = ConflictChoice::PER_CONFLICT.iter().map(|c| c.label()).collect();
    for conflict in &conflicts {
        print_conflict(conflict, project.config.settings.show_migration_diff);

        let choice = match prompter.select("Resolve this conflict:", &labels) {
            Outcome::Value(index) => ConflictChoice::PER_CONFLICT[index],
            Outcome::Cancelled => ConflictChoice::Cancel,
        };

        match rescue.resolve_conflict(conflict, choice).await? {
            ConflictResolution::Overwritten(path) => {
                output::success(&format!("Overwrote {}", display_name(&path)));
            }
            ConflictResolution::Kept => output::info("Kept local version"),
            ConflictResolution::SavedRemote(path) => {
                output::success(&format!("Saved remote version as {}", display_name(&path)));
            }
            ConflictResolution::Cancelled => return Err(CliError::Cancelled),
        }
    }
    Ok(())
}

fn print_conflict(conflict: &MigrationConflict, show_diff: bool) {
    output::newline();
    output::section(&format!("Conflict: {}", display_name(&conflict.local_path)));
    output::kv("Local hash", &conflict.local_hash);
    output::kv("Remote hash", &conflict.remote_hash);
    if show_diff {
        output::diff(&conflict.diff);
    }
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::sync::Mutex;

    use async_trait::async_trait;
    use dbguard_core::{CoreResult, Environment, Settings, ToolAction, ToolOutput};

    use super::*;
    use crate::config::Config;

    const LISTING: &str = "
   Local          | Remote         | Time (UTC)
  ----------------|----------------|---------------------
   20260110000000 | 20260110000000 | 2026-01-10 00:00:00
                  | 20260116000044 | 2026-01-16 00:00:44
   20260112000000 |                | 2026-01-12 00:00:00
";

    /// Migration tool serving a fixed listing and recording every call
    struct FakeTool {
        listing: Option<&'static str>,
        remote_bodies: Vec<(&'static str, &'static str)>,
        calls: Mutex<Vec<ToolAction>>,
    }

    impl FakeTool {
        fn new(listing: Option<&'static str>) -> Self {
            Self {
                listing,
                remote_bodies: Vec::new(),
                calls: Mutex::new(Vec::new()),
            }
        }

        fn calls(&self) -> Vec<ToolAction> {
            self.calls.lock().unwrap().clone()
        }

        fn reverted(&self) -> Vec<String> {
            self.calls()
                .into_iter()
                .filter_map(|a| match a {
                    ToolAction::MarkReverted(ts) => Some(ts),
                    _ => None,
                })
                .collect()
        }
    }

    #[async_trait]
    impl MigrationTool for FakeTool {
        async fn run(&self, action: &ToolAction) -> CoreResult<ToolOutput> {
            self.calls.lock().unwrap().push(action.clone());
            match action {
                ToolAction::ListMigrations => Ok(match self.listing {
                    Some(listing) => ToolOutput::ok(listing),
                    None => ToolOutput::failed(1),
                }),
                ToolAction::FetchRemote(workdir) => {
                    let dir = ToolAction::fetched_migrations_dir(workdir);
                    fs::create_dir_all(&dir)?;
                    for (name, body) in &self.remote_bodies {
                        fs::write(dir.join(name), body)?;
                    }
                    Ok(ToolOutput::ok(""))
                }
                _ => Ok(ToolOutput::ok("")),
            }
        }
    }

    fn project(files: &[(&str, &str)]) -> (tempfile::TempDir, Project) {
        let dir = tempfile::tempdir().unwrap();
        let project = Project {
            root: dir.path().to_path_buf(),
            config_path: dir.path().join("dbguard.toml"),
            config: Config::default(),
        };
        let migrations = project.migrations_dir();
        fs::create_dir_all(&migrations).unwrap();
        for (name, body) in files {
            fs::write(migrations.join(name), body).unwrap();
        }
        (dir, project)
    }

    fn target<'a>(
        name: &'a str,
        environment: &'a Environment,
        settings: &'a Settings,
        git: &'a GitState,
    ) -> Target<'a> {
        Target {
            name,
            environment,
            settings,
            git,
            linked_project_ref: None,
            ci: false,
            force: false,
        }
    }

    fn input(answers: &'static str) -> TerminalPrompter<&'static [u8]> {
        TerminalPrompter::new(answers.as_bytes())
    }

    fn dirty() -> GitState {
        GitState {
            branch: Some("develop".to_string()),
            has_uncommitted_changes: true,
        }
    }

    fn local_files(project: &Project) -> Vec<String> {
        let mut names: Vec<String> = fs::read_dir(project.migrations_dir())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    async fn drift(project: &Project, tool: &FakeTool) -> MigrationSyncStatus {
        let status = MigrationSync::new(project.migrations_dir(), tool)
            .check_sync()
            .await;
        assert!(status.needs_sync);
        status
    }

    #[tokio::test]
    async fn test_pull_is_blocked_on_dirty_tree() {
        let (_dir, project) = project(&[("20260110000000_init.sql", "select 1;")]);
        let tool = FakeTool::new(Some(LISTING));
        let (env, settings, git) = (Environment::new(), Settings::default(), dirty());
        let status = drift(&project, &tool).await;

        let err = reconcile(
            &project,
            &tool,
            &status,
            &target("staging", &env, &settings, &git),
            &mut input("2\nn\n"),
        )
        .await
        .unwrap_err();

        assert!(matches!(&err, CliError::Blocked(reason) if reason.contains("uncommitted")));
        assert!(!tool.calls().contains(&ToolAction::Pull));
    }

    #[tokio::test]
    async fn test_repair_is_blocked_on_locked_environment() {
        let (_dir, project) = project(&[("20260110000000_init.sql", "select 1;")]);
        let tool = FakeTool::new(Some(LISTING));
        let env = Environment::new().with_branch("master");
        let (settings, git) = (Settings::default(), GitState::default());
        let status = drift(&project, &tool).await;

        let err = reconcile(
            &project,
            &tool,
            &status,
            &target("production", &env, &settings, &git),
            &mut input("1\ny\n"),
        )
        .await
        .unwrap_err();

        assert!(matches!(&err, CliError::Blocked(reason) if reason.contains("locked")));
        assert!(tool.reverted().is_empty());
    }

    #[tokio::test]
    async fn test_force_lets_repair_past_lock() {
        let (_dir, project) = project(&[("20260110000000_init.sql", "select 1;")]);
        let tool = FakeTool::new(Some(LISTING));
        let env = Environment::new();
        let (settings, git) = (Settings::default(), GitState::default());
        let status = drift(&project, &tool).await;
        let mut forced = target("production", &env, &settings, &git);
        forced.force = true;

        reconcile(&project, &tool, &status, &forced, &mut input("1\ny\n"))
            .await
            .unwrap();

        assert_eq!(tool.reverted(), vec!["20260116000044".to_string()]);
    }

    #[tokio::test]
    async fn test_strict_mode_refuses_forced_repair() {
        let (_dir, project) = project(&[("20260110000000_init.sql", "select 1;")]);
        let tool = FakeTool::new(Some(LISTING));
        let env = Environment::new();
        let settings = Settings {
            strict_mode: true,
            ..Settings::default()
        };
        let git = GitState::default();
        let status = drift(&project, &tool).await;
        let mut forced = target("production", &env, &settings, &git);
        forced.force = true;

        let err = reconcile(&project, &tool, &status, &forced, &mut input("1\ny\n"))
            .await
            .unwrap_err();

        assert!(matches!(err, CliError::Blocked(_)));
        assert!(tool.reverted().is_empty());
    }

    #[tokio::test]
    async fn test_repair_then_reorder() {
        let (_dir, project) = project(&[
            ("20260110000000_init.sql", "create table a();"),
            ("20260112000000_add_b.sql", "create table b();"),
        ]);
        let tool = FakeTool::new(Some(LISTING));
        let (env, settings, git) = (Environment::new(), Settings::default(), GitState::default());
        let status = drift(&project, &tool).await;
        let listings_before = tool
            .calls()
            .iter()
            .filter(|a| **a == ToolAction::ListMigrations)
            .count();

        reconcile(
            &project,
            &tool,
            &status,
            &target("staging", &env, &settings, &git),
            &mut input("1\ny\ny\n"),
        )
        .await
        .unwrap();

        assert_eq!(tool.reverted(), vec!["20260116000044".to_string()]);
        let listings_after = tool
            .calls()
            .iter()
            .filter(|a| **a == ToolAction::ListMigrations)
            .count();
        assert_eq!(listings_after, listings_before + 1);

        let files = local_files(&project);
        assert_eq!(files.len(), 2);
        assert_eq!(files[0], "20260110000000_init.sql");
        assert!(files[1].ends_with("_add_b.sql"));
        assert!(files[1].as_str() > "20260116000044");
    }

    #[tokio::test]
    async fn test_repair_declined() {
        let (_dir, project) = project(&[("20260110000000_init.sql", "select 1;")]);
        let tool = FakeTool::new(Some(LISTING));
        let (env, settings, git) = (Environment::new(), Settings::default(), GitState::default());
        let status = drift(&project, &tool).await;

        let err = reconcile(
            &project,
            &tool,
            &status,
            &target("staging", &env, &settings, &git),
            &mut input("1\nn\n"),
        )
        .await
        .unwrap_err();

        assert!(matches!(err, CliError::Declined(_)));
        assert!(tool.reverted().is_empty());
    }

    #[tokio::test]
    async fn test_pull_backs_up_when_asked() {
        let (_dir, project) = project(&[("20260110000000_init.sql", "select 1;")]);
        let tool = FakeTool::new(Some(LISTING));
        let (env, settings, git) = (Environment::new(), Settings::default(), GitState::default());
        let status = drift(&project, &tool).await;

        reconcile(
            &project,
            &tool,
            &status,
            &target("staging", &env, &settings, &git),
            &mut input("2\ny\n"),
        )
        .await
        .unwrap();

        assert!(tool.calls().contains(&ToolAction::Pull));
        let backups: Vec<_> = fs::read_dir(project.backup_dir())
            .unwrap()
            .map(|e| e.unwrap().path())
            .collect();
        assert_eq!(backups.len(), 1);
        assert!(backups[0].join("20260110000000_init.sql").exists());
    }

    #[tokio::test]
    async fn test_pull_without_backup() {
        let (_dir, project) = project(&[("20260110000000_init.sql", "select 1;")]);
        let tool = FakeTool::new(Some(LISTING));
        let (env, settings, git) = (Environment::new(), Settings::default(), GitState::default());
        let status = drift(&project, &tool).await;

        reconcile(
            &project,
            &tool,
            &status,
            &target("staging", &env, &settings, &git),
            &mut input("2\nn\n"),
        )
        .await
        .unwrap();

        assert!(tool.calls().contains(&ToolAction::Pull));
        assert!(!project.backup_dir().exists());
    }

    #[tokio::test]
    async fn test_strategy_prompt_cancelled() {
        let (_dir, project) = project(&[]);
        let tool = FakeTool::new(Some(LISTING));
        let (env, settings, git) = (Environment::new(), Settings::default(), GitState::default());
        let status = drift(&project, &tool).await;

        let err = reconcile(
            &project,
            &tool,
            &status,
            &target("staging", &env, &settings, &git),
            &mut input(""),
        )
        .await
        .unwrap_err();

        assert!(matches!(err, CliError::Cancelled));
        assert_eq!(tool.calls(), vec![ToolAction::ListMigrations]);
    }

    #[tokio::test]
    async fn test_precheck_blocks_drift_in_ci() {
        let (_dir, project) = project(&[]);
        let tool = FakeTool::new(Some(LISTING));
        let (env, settings, git) = (Environment::new(), Settings::default(), GitState::default());
        let mut ci = target("staging", &env, &settings, &git);
        ci.ci = true;

        let err = precheck(&project, &tool, &ci, &mut input("1\ny\n"))
            .await
            .unwrap_err();

        assert!(matches!(&err, CliError::Blocked(reason) if reason.contains("dbguard sync")));
        assert!(tool.reverted().is_empty());
    }

    #[tokio::test]
    async fn test_precheck_proceeds_when_status_unknown() {
        let (_dir, project) = project(&[]);
        let tool = FakeTool::new(None);
        let (env, settings, git) = (Environment::new(), Settings::default(), GitState::default());

        precheck(
            &project,
            &tool,
            &target("staging", &env, &settings, &git),
            &mut input(""),
        )
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn test_conflict_cancel_midway_keeps_earlier_choices() {
        let (_dir, project) = project(&[
            ("20260110000000_init.sql", "create table a();"),
            ("20260111000000_b.sql", "create table b();"),
        ]);
        let mut tool = FakeTool::new(Some(LISTING));
        tool.remote_bodies = vec![
            ("20260110000000_init.sql", "create table a(id int);"),
            ("20260111000000_b.sql", "create table b(id int);"),
        ];

        let err = resolve_conflicts(&project, &tool, &mut input("3\n"), false)
            .await
            .unwrap_err();

        assert!(matches!(err, CliError::Cancelled));
        assert_eq!(
            local_files(&project),
            vec![
                "20260110000000.remote.sql",
                "20260110000000_init.sql",
                "20260111000000_b.sql",
            ]
        );
        assert_eq!(
            fs::read_to_string(project.migrations_dir().join("20260111000000_b.sql")).unwrap(),
            "create table b();"
        );
    }

    #[tokio::test]
    async fn test_conflicts_block_in_ci() {
        let (_dir, project) = project(&[("20260110000000_init.sql", "create table a();")]);
        let mut tool = FakeTool::new(Some(LISTING));
        tool.remote_bodies = vec![("20260110000000_init.sql", "create table a(id int);")];

        let err = resolve_conflicts(&project, &tool, &mut input(""), true)
            .await
            .unwrap_err();

        assert!(matches!(err, CliError::Blocked(_)));
    }
}
