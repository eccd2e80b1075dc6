//! Project match guard: the linked remote project must be the one the
//! environment deploys to.

use super::{GuardContext, GuardResult, RiskLevel};

/// Block when the linked project is missing or differs from the environment's.
pub fn check(context: &GuardContext<'_>, linked_project_ref: Option<&str>) -> GuardResult {
    if !context.operation.targets_linked_project() {
        return GuardResult::allow();
    }

    let Some(expected) = context.environment.project_ref.as_deref() else {
        return GuardResult::allow();
    };

    let name = context.environment_name;
    match linked_project_ref {
        None => GuardResult::block(format!(
            "Project not linked: environment '{}' expects project '{}'",
            name, expected
        ))
        .with_risk(RiskLevel::High)
        .with_suggestion(format!("Run `dbguard link --env {}`", name)),
        Some(actual) if actual != expected => GuardResult::block(format!(
            "Project mismatch: linked to '{}' but environment '{}' expects '{}'",
            actual, name, expected
        ))
        .with_risk(RiskLevel::High)
        .with_suggestion(format!("Run `dbguard link --env {}` to relink", name))
        .with_suggestion("Check project_ref in dbguard.toml"),
        Some(_) => GuardResult::allow(),
    }
}
