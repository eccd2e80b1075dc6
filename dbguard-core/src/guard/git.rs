//! Clean working tree guard.

use super::{GuardContext, GuardResult, RiskLevel};

/// Block working-tree sensitive operations on a dirty tree when
/// `require_clean_git` is set.
pub fn check(context: &GuardContext<'_>) -> GuardResult {
    if !context.operation.touches_working_tree() {
        return GuardResult::allow();
    }

    if context.settings.require_clean_git && context.has_uncommitted_changes {
        return GuardResult::block("Working tree has uncommitted changes")
            .with_risk(RiskLevel::Medium)
            .with_suggestion("Stash your changes with `git stash`")
            .with_suggestion("Commit your changes first");
    }

    GuardResult::allow()
}
