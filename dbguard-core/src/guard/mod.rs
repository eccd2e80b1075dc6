//! Guard pipeline.
//!
//! Guards are pure functions over a read-only [`GuardContext`]. They run in a
//! fixed order, and the first block stops the pipeline:
//!
//! ```text
//! lock ──▶ project ──▶ git ──▶ operation
//! ```
//!
//! When every guard allows, their results are folded by [`combine_results`].

pub mod git;
pub mod lock;
pub mod operation;
pub mod project;

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::environment::{Environment, Operation, Settings};

/// Ordered severity of an operation.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    /// Safe to run without ceremony.
    #[default]
    Low,
    /// Worth a yes/no.
    Medium,
    /// Can lose data in a shared environment.
    High,
    /// Can lose production data; requires a typed confirmation word.
    Critical,
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RiskLevel::Low => "low",
            RiskLevel::Medium => "medium",
            RiskLevel::High => "high",
            RiskLevel::Critical => "critical",
        };
        f.write_str(s)
    }
}

/// Everything a guard may look at. Built once per command.
#[derive(Debug, Clone)]
pub struct GuardContext<'a> {
    /// Requested operation.
    pub operation: Operation,
    /// Resolved environment name.
    pub environment_name: &'a str,
    /// Resolved environment record.
    pub environment: &'a Environment,
    /// Global settings.
    pub settings: &'a Settings,
    /// Current git branch, if inside a repository.
    pub git_branch: Option<String>,
    /// Running non-interactively.
    pub ci: bool,
    /// Working tree has uncommitted changes.
    pub has_uncommitted_changes: bool,
    /// Caller asked to override a lock.
    pub force: bool,
}

impl<'a> GuardContext<'a> {
    /// Create a context for an operation against a named environment.
    pub fn new(
        operation: Operation,
        environment_name: &'a str,
        environment: &'a Environment,
        settings: &'a Settings,
    ) -> Self {
        Self {
            operation,
            environment_name,
            environment,
            settings,
            git_branch: None,
            ci: false,
            has_uncommitted_changes: false,
            force: false,
        }
    }

    /// Set the current git branch.
    pub fn with_branch(mut self, branch: impl Into<String>) -> Self {
        self.git_branch = Some(branch.into());
        self
    }

    /// Set CI mode.
    pub fn with_ci(mut self, ci: bool) -> Self {
        self.ci = ci;
        self
    }

    /// Set whether the working tree is dirty.
    pub fn with_uncommitted_changes(mut self, dirty: bool) -> Self {
        self.has_uncommitted_changes = dirty;
        self
    }

    /// Override a lock.
    pub fn with_force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }
}

/// Verdict of one guard, or the aggregate of the pipeline.
///
/// Confirmation fields are meaningless when `allowed` is false.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct GuardResult {
    /// Whether the operation may proceed.
    pub allowed: bool,
    /// Human-readable explanation of a block.
    pub reason: Option<String>,
    /// Actionable next steps.
    pub suggestions: Vec<String>,
    /// Risk assigned by this guard.
    pub risk_level: Option<RiskLevel>,
    /// Whether the user must confirm before proceeding.
    pub requires_confirmation: bool,
    /// Word to type for critical confirmations.
    pub confirm_word: Option<String>,
}

impl GuardResult {
    /// An allowing verdict.
    pub fn allow() -> Self {
        Self {
            allowed: true,
            ..Default::default()
        }
    }

    /// A blocking verdict.
    pub fn block(reason: impl Into<String>) -> Self {
        Self {
            allowed: false,
            reason: Some(reason.into()),
            ..Default::default()
        }
    }

    /// Set the risk level.
    pub fn with_risk(mut self, risk: RiskLevel) -> Self {
        self.risk_level = Some(risk);
        self
    }

    /// Append a suggestion.
    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestions.push(suggestion.into());
        self
    }

    /// Set the confirmation requirement.
    pub fn with_confirmation(mut self, required: bool, word: Option<String>) -> Self {
        self.requires_confirmation = required;
        self.confirm_word = word;
        self
    }

    /// Risk level, treating unset as low.
    pub fn risk(&self) -> RiskLevel {
        self.risk_level.unwrap_or_default()
    }

    /// Whether this is a block.
    pub fn is_blocked(&self) -> bool {
        !self.allowed
    }
}

/// Run every guard in order, stopping at the first block.
///
/// `linked_project_ref` is the project the working copy is currently linked
/// to, if any.
pub fn run_guards(context: &GuardContext<'_>, linked_project_ref: Option<&str>) -> GuardResult {
    debug!(
        operation = %context.operation,
        environment = context.environment_name,
        ci = context.ci,
        "running guards"
    );

    let mut results = Vec::with_capacity(4);

    let result = lock::check(context);
    if result.is_blocked() {
        return blocked("lock", result);
    }
    results.push(result);

    let result = project::check(context, linked_project_ref);
    if result.is_blocked() {
        return blocked("project", result);
    }
    results.push(result);

    let result = git::check(context);
    if result.is_blocked() {
        return blocked("git", result);
    }
    results.push(result);

    let result = operation::check(context);
    if result.is_blocked() {
        return blocked("operation", result);
    }
    results.push(result);

    let combined = combine_results(&results);
    debug!(
        risk = %combined.risk(),
        requires_confirmation = combined.requires_confirmation,
        "guards passed"
    );
    combined
}

fn blocked(guard: &str, result: GuardResult) -> GuardResult {
    info!(
        guard,
        reason = result.reason.as_deref().unwrap_or_default(),
        "operation blocked"
    );
    result
}

/// Fold guard results into one verdict.
///
/// The first blocking result is returned as-is. Otherwise the risk is the
/// maximum seen (low when empty), confirmation is required if any guard
/// requires it, the confirm word is the last one set, and suggestions are
/// deduplicated in order.
pub fn combine_results(results: &[GuardResult]) -> GuardResult {
    if let Some(block) = results.iter().find(|r| r.is_blocked()) {
        return block.clone();
    }

    let mut combined = GuardResult::allow().with_risk(RiskLevel::Low);
    for result in results {
        if let Some(risk) = result.risk_level {
            combined.risk_level = combined.risk_level.max(Some(risk));
        }
        combined.requires_confirmation |= result.requires_confirmation;
        if let Some(word) = result.confirm_word.as_ref().filter(|w| !w.is_empty()) {
            combined.confirm_word = Some(word.clone());
        }
        for suggestion in &result.suggestions {
            if !combined.suggestions.contains(suggestion) {
                combined.suggestions.push(suggestion.clone());
            }
        }
    }
    combined
}
