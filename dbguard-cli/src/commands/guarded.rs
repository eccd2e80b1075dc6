//! Guarded database operations: `push`, `reset`, `pull`, `seed`, `diff`,
//! `link` and `unlink`.

use dbguard_core::{
    ConfirmationEngine, Environment, GitState, GuardContext, GuardResult, MigrationTool,
    Operation, PromptKind, Resolution, RiskLevel, Settings, ToolAction, run_guards,
};
use tracing::info;

use crate::cli::{GlobalArgs, GuardArgs, PushArgs};
use crate::commands::sync;
use crate::error::{CliError, CliResult};
use crate::output::{self, TerminalPrompter};
use crate::project::Project;

/// Run a guarded operation
pub async fn run(global: &GlobalArgs, operation: Operation, args: GuardArgs) -> CliResult<()> {
    execute(global, operation, &args, true).await
}

/// Run `push`, checking migration sync first unless `--skip-sync`
pub async fn run_push(global: &GlobalArgs, args: PushArgs) -> CliResult<()> {
    execute(global, Operation::Push, &args.guard, args.skip_sync).await
}

async fn execute(
    global: &GlobalArgs,
    operation: Operation,
    args: &GuardArgs,
    skip_sync: bool,
) -> CliResult<()> {
    output::header(&format!("dbguard {}", operation));

    let project = Project::load(global.config.as_deref())?;
    let git = GitState::inspect(&project.root).await;
    let linked = project.linked_project_ref();
    let resolved = project.resolve(args.env.as_deref(), linked.as_deref(), git.branch.as_deref())?;
    print_target(&resolved, &git, linked.as_deref());

    let settings = &project.config.settings;
    let target = Target {
        name: resolved.name,
        environment: resolved.environment,
        settings,
        git: &git,
        linked_project_ref: linked.as_deref(),
        ci: global.ci,
        force: args.force,
    };
    let verdict = target.check(operation)?;

    output::kv("Risk", &output::style_risk(verdict.risk()));
    if args.force && verdict.risk() == RiskLevel::Critical {
        output::warn("Lock overridden with --force");
    }
    output::suggestions(&verdict.suggestions);
    output::newline();

    let action_label = format!("{} {}", operation, resolved.name);
    confirm(&verdict, resolved.name, global.ci, args.yes, settings, &action_label)?;

    let tool = project.tool();
    if operation == Operation::Push && !skip_sync {
        sync::precheck(&project, &tool, &target, &mut TerminalPrompter::stdin()).await?;
    }

    let action = ToolAction::for_operation(operation, resolved.environment.project_ref.as_deref())
        .ok_or_else(|| {
            CliError::Command(format!(
                "'{}' needs a project_ref for environment '{}'",
                operation, resolved.name
            ))
        })?;

    output::dim(&format!("$ {} {}", tool.program(), action.args().join(" ")));
    let result = tool.run(&action).await?;
    if !result.success {
        return Err(CliError::Tool(format!(
            "{} failed with {}",
            operation,
            result.describe_failure()
        )));
    }

    info!(%operation, environment = resolved.name, "operation completed");
    output::newline();
    output::success(&format!("{} completed on '{}'", operation, resolved.name));
    Ok(())
}

/// Resolved environment plus the inspected state the guards read.
pub(crate) struct Target<'a> {
    pub name: &'a str,
    pub environment: &'a Environment,
    pub settings: &'a Settings,
    pub git: &'a GitState,
    pub linked_project_ref: Option<&'a str>,
    pub ci: bool,
    pub force: bool,
}

impl Target<'_> {
    /// Run the guards for `operation`; a block becomes an error.
    pub(crate) fn check(&self, operation: Operation) -> CliResult<GuardResult> {
        if self.force && self.settings.strict_mode {
            return Err(CliError::Blocked(
                "--force is disabled while strict_mode is on".to_string(),
            ));
        }

        let mut context = GuardContext::new(operation, self.name, self.environment, self.settings)
            .with_ci(self.ci)
            .with_uncommitted_changes(self.git.has_uncommitted_changes)
            .with_force(self.force);
        if let Some(branch) = &self.git.branch {
            context = context.with_branch(branch.clone());
        }

        let verdict = run_guards(&context, self.linked_project_ref);
        if verdict.is_blocked() {
            output::suggestions(&verdict.suggestions);
            return Err(CliError::Blocked(
                verdict
                    .reason
                    .unwrap_or_else(|| format!("'{}' is not permitted", operation)),
            ));
        }
        Ok(verdict)
    }
}

fn print_target(resolved: &Resolution<'_>, git: &GitState, linked: Option<&str>) {
    output::kv("Environment", resolved.name);
    output::kv("Matched by", &resolved.match_type.to_string());
    if let Some(branch) = &git.branch {
        output::kv("Branch", branch);
    }
    output::kv("Linked project", linked.unwrap_or("(none)"));
}

/// Settle a verdict's confirmation requirement.
///
/// `--yes` satisfies it without prompting, except for critical operations
/// in strict mode.
pub(crate) fn confirm(
    verdict: &GuardResult,
    environment_name: &str,
    ci: bool,
    yes: bool,
    settings: &Settings,
    action: &str,
) -> CliResult<()> {
    let mut engine = ConfirmationEngine::from_verdict(verdict, environment_name, ci);

    match engine.prompt_kind() {
        PromptKind::Skip => return Ok(()),
        _ if yes => {
            if settings.strict_mode && verdict.risk() == RiskLevel::Critical {
                return Err(CliError::Blocked(format!(
                    "--yes cannot confirm a critical operation while strict_mode is on; run '{}' interactively",
                    action
                )));
            }
            output::warn("Confirmation skipped (--yes)");
            return Ok(());
        }
        PromptKind::Decline => {
            output::warn("Confirmation required in CI mode; pass --yes to proceed");
        }
        PromptKind::YesNo | PromptKind::TypedWord(_) => {}
    }

    let outcome = engine.run(&mut TerminalPrompter::stdin(), action);
    if outcome.cancelled {
        return Err(CliError::Cancelled);
    }
    if !outcome.confirmed {
        return Err(CliError::Declined(format!("{} was not confirmed", action)));
    }
    Ok(())
}
