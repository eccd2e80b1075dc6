//! `dbguard lock` and `dbguard unlock` commands.

use dbguard_core::{LockState, Outcome, Prompter};
use tracing::info;

use crate::cli::{GlobalArgs, LockArgs};
use crate::config::Config;
use crate::error::{CliError, CliResult};
use crate::output::{self, TerminalPrompter};
use crate::project::Project;

/// Lock an environment against destructive operations
pub async fn run_lock(global: &GlobalArgs, args: LockArgs) -> CliResult<()> {
    let project = Project::load(global.config.as_deref())?;
    Config::set_lock(&project.config_path, &args.environment, LockState::Locked)?;

    info!(environment = %args.environment, "locked environment");
    output::success(&format!("Locked '{}'", args.environment));
    Ok(())
}

/// Unlock an environment
///
/// Unlocking an environment that is currently locked asks first.
pub async fn run_unlock(global: &GlobalArgs, args: LockArgs) -> CliResult<()> {
    let project = Project::load(global.config.as_deref())?;
    let environment = project
        .config
        .environments
        .get(&args.environment)
        .ok_or_else(|| {
            CliError::config(
                &project.config_path,
                format!("environment '{}' is not defined", args.environment),
            )
        })?;

    if environment.is_locked(&args.environment) && !args.yes {
        if global.ci {
            return Err(CliError::Declined(format!(
                "unlocking '{}' in CI mode needs --yes",
                args.environment
            )));
        }

        let question = format!(
            "'{}' is locked. Allow destructive operations on it?",
            args.environment
        );
        match TerminalPrompter::stdin().confirm(&question) {
            Outcome::Value(true) => {}
            Outcome::Value(false) => {
                return Err(CliError::Declined(format!(
                    "'{}' stays locked",
                    args.environment
                )));
            }
            Outcome::Cancelled => return Err(CliError::Cancelled),
        }
    }

    Config::set_lock(&project.config_path, &args.environment, LockState::Unlocked)?;

    info!(environment = %args.environment, "unlocked environment");
    output::success(&format!("Unlocked '{}'", args.environment));
    Ok(())
}
