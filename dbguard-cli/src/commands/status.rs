//! `dbguard status` command - Show the resolved environment and sync status.

use dbguard_core::environment::EnvironmentClass;
use dbguard_core::guard::operation::risk_for;
use dbguard_core::{GitState, MatchType, MigrationSync, MigrationSyncStatus, Operation};
use serde::Serialize;

use crate::cli::{GlobalArgs, StatusArgs};
use crate::commands::sync::print_status;
use crate::error::{CliError, CliResult};
use crate::output;
use crate::project::Project;

#[derive(Debug, Serialize)]
struct StatusReport<'a> {
    environment: &'a str,
    matched_by: String,
    branch: Option<&'a str>,
    linked_project_ref: Option<&'a str>,
    locked: bool,
    protected_operations: &'a [String],
    sync: &'a MigrationSyncStatus,
}

/// Run the status command
pub async fn run(global: &GlobalArgs, args: StatusArgs) -> CliResult<()> {
    let project = Project::load(global.config.as_deref())?;
    let git = GitState::inspect(&project.root).await;
    let linked = project.linked_project_ref();
    let resolved = project.resolve(args.env.as_deref(), linked.as_deref(), git.branch.as_deref())?;

    let tool = project.tool();
    let sync = MigrationSync::new(project.migrations_dir(), &tool)
        .check_sync()
        .await;
    let locked = resolved.environment.is_locked(resolved.name);

    if args.json {
        let report = StatusReport {
            environment: resolved.name,
            matched_by: resolved.match_type.to_string(),
            branch: git.branch.as_deref(),
            linked_project_ref: linked.as_deref(),
            locked,
            protected_operations: &resolved.environment.protected_operations,
            sync: &sync,
        };
        let json = serde_json::to_string_pretty(&report)
            .map_err(|e| CliError::Command(format!("failed to encode status: {}", e)))?;
        println!("{}", json);
        return Ok(());
    }

    output::header("dbguard Status");

    output::section("Environment");
    output::kv("Name", resolved.name);
    output::kv("Matched by", &resolved.match_type.to_string());
    if resolved.match_type == MatchType::Fallback {
        output::dim("  No branch pattern matched; using the local fallback");
    }
    output::kv("Branch", git.branch.as_deref().unwrap_or("(unknown)"));
    output::kv("Linked project", linked.as_deref().unwrap_or("(none)"));
    output::kv(
        "Project ref",
        resolved.environment.project_ref.as_deref().unwrap_or("(none)"),
    );
    output::kv(
        "Lock",
        &if locked {
            output::style_error("locked")
        } else {
            output::style_success("unlocked")
        },
    );
    if git.has_uncommitted_changes {
        output::kv("Working tree", &output::style_pending("uncommitted changes"));
    }
    output::newline();

    output::section("Operations");
    let class = EnvironmentClass::classify(resolved.name, resolved.environment);
    for operation in Operation::ALL {
        let mut notes = Vec::new();
        if resolved.environment.is_protected(operation) {
            notes.push("confirm");
        }
        if locked && operation.is_destructive() {
            notes.push("locked");
        }
        let suffix = if notes.is_empty() {
            String::new()
        } else {
            format!(" ({})", notes.join(", "))
        };
        output::list_item(&format!(
            "{:<7} {}{}",
            operation.as_str(),
            output::style_risk(risk_for(operation, class)),
            suffix
        ));
    }
    output::newline();

    output::section("Migrations");
    print_status(&sync);
    Ok(())
}
