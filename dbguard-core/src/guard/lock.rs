//! Lock guard. Runs first; a locked environment blocks every destructive
//! operation regardless of what the other guards would say.
//!
//! A forced override lets the pipeline continue, but pins the risk to
//! critical so any confirmation must be typed.

use super::{GuardContext, GuardResult, RiskLevel};

/// Block destructive operations on a locked environment.
pub fn check(context: &GuardContext<'_>) -> GuardResult {
    if !context.operation.is_destructive() {
        return GuardResult::allow();
    }

    let name = context.environment_name;
    if !context.environment.is_locked(name) {
        return GuardResult::allow();
    }

    if context.force {
        return GuardResult::allow()
            .with_risk(RiskLevel::Critical)
            .with_suggestion(format!("Lock on '{}' overridden with --force", name));
    }

    GuardResult::block(format!(
        "Environment '{}' is locked; '{}' is not permitted",
        name, context.operation
    ))
    .with_risk(RiskLevel::Critical)
    .with_suggestion(format!(
        "Set `locked = false` under [environments.{}] or run `dbguard unlock {}`",
        name, name
    ))
    .with_suggestion("Override with --force (not recommended for production)")
}
