//! Environments, operations, and environment resolution.
//!
//! An environment is resolved either from the linked remote project ref
//! (exact match only) or from the current git branch:
//!
//! 1. Exact pass: a branch listed literally in an environment's patterns.
//! 2. Wildcard pass: patterns containing `*` or `?`, anchored.
//! 3. Fallback: the environment named `local`, if configured.
//!
//! Environments are visited in declaration order and the first match wins.

use std::fmt;
use std::str::FromStr;

use indexmap::IndexMap;
use regex_lite::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{CoreError, CoreResult};

/// Name of the environment used when no branch pattern matches.
pub const LOCAL_ENVIRONMENT: &str = "local";

/// Name that is always treated as production.
pub const PRODUCTION_ENVIRONMENT: &str = "production";

/// Name that is always treated as staging.
pub const STAGING_ENVIRONMENT: &str = "staging";

/// Branches that imply an environment deploys to production.
pub const PRODUCTION_BRANCHES: &[&str] = &["main", "master"];

/// Ordered map of environment name to environment, in declaration order.
pub type Environments = IndexMap<String, Environment>;

/// A database operation that can be requested against an environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    /// Apply local migrations to the target database.
    Push,
    /// Drop and recreate the target database.
    Reset,
    /// Replace local migrations with the remote history.
    Pull,
    /// Load seed data into the target database.
    Seed,
    /// Read-only schema diff.
    Diff,
    /// Link the working copy to a remote project.
    Link,
    /// Remove the remote project link.
    Unlink,
}

impl Operation {
    /// Every operation, in canonical order.
    pub const ALL: [Operation; 7] = [
        Operation::Push,
        Operation::Reset,
        Operation::Pull,
        Operation::Seed,
        Operation::Diff,
        Operation::Link,
        Operation::Unlink,
    ];

    /// Canonical lowercase name, as used in `protected_operations`.
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Push => "push",
            Operation::Reset => "reset",
            Operation::Pull => "pull",
            Operation::Seed => "seed",
            Operation::Diff => "diff",
            Operation::Link => "link",
            Operation::Unlink => "unlink",
        }
    }

    /// Whether the operation mutates the target database.
    pub fn is_destructive(&self) -> bool {
        matches!(self, Operation::Push | Operation::Reset | Operation::Seed)
    }

    /// Whether the operation reads or rewrites the local migration files.
    pub fn touches_working_tree(&self) -> bool {
        matches!(
            self,
            Operation::Push | Operation::Reset | Operation::Pull | Operation::Seed
        )
    }

    /// Whether the operation runs against the linked remote project.
    pub fn targets_linked_project(&self) -> bool {
        !matches!(self, Operation::Link | Operation::Unlink)
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Operation {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Operation::ALL
            .iter()
            .copied()
            .find(|op| op.as_str() == s)
            .ok_or_else(|| {
                let known: Vec<&str> = Operation::ALL.iter().map(Operation::as_str).collect();
                format!("unknown operation '{}' (expected one of: {})", s, known.join(", "))
            })
    }
}

/// Explicit lock setting of an environment.
///
/// `Inherit` defers to production inference: an environment named
/// `production`, or one deployed from `main`/`master`, is locked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "Option<bool>", into = "Option<bool>")]
pub enum LockState {
    /// `locked = true`
    Locked,
    /// `locked = false`
    Unlocked,
    /// `locked` not set
    #[default]
    Inherit,
}

impl LockState {
    /// Whether no explicit value was configured.
    pub fn is_inherit(&self) -> bool {
        matches!(self, LockState::Inherit)
    }
}

impl From<Option<bool>> for LockState {
    fn from(value: Option<bool>) -> Self {
        match value {
            Some(true) => LockState::Locked,
            Some(false) => LockState::Unlocked,
            None => LockState::Inherit,
        }
    }
}

impl From<LockState> for Option<bool> {
    fn from(value: LockState) -> Self {
        match value {
            LockState::Locked => Some(true),
            LockState::Unlocked => Some(false),
            LockState::Inherit => None,
        }
    }
}

/// A named deployment target with its own safety policy.
///
/// The name is the key under which the environment is declared.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Environment {
    /// Remote project this environment deploys to. `None` for local-only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project_ref: Option<String>,

    /// Git branch names or wildcard patterns mapped to this environment.
    pub git_branches: Vec<String>,

    /// Operation names that require confirmation.
    pub protected_operations: Vec<String>,

    /// Word the user must type to confirm critical operations.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confirm_word: Option<String>,

    /// Explicit lock setting.
    #[serde(skip_serializing_if = "LockState::is_inherit")]
    pub locked: LockState,
}

impl Environment {
    /// Create an empty environment.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the remote project ref.
    pub fn with_project_ref(mut self, project_ref: impl Into<String>) -> Self {
        self.project_ref = Some(project_ref.into());
        self
    }

    /// Add a git branch pattern.
    pub fn with_branch(mut self, pattern: impl Into<String>) -> Self {
        self.git_branches.push(pattern.into());
        self
    }

    /// Protect an operation.
    pub fn protect(mut self, operation: Operation) -> Self {
        self.protected_operations.push(operation.as_str().to_string());
        self
    }

    /// Set the confirmation word.
    pub fn with_confirm_word(mut self, word: impl Into<String>) -> Self {
        self.confirm_word = Some(word.into());
        self
    }

    /// Set the explicit lock state.
    pub fn with_lock(mut self, locked: LockState) -> Self {
        self.locked = locked;
        self
    }

    /// Whether the environment deploys from a production branch.
    pub fn has_production_branch(&self) -> bool {
        self.git_branches
            .iter()
            .any(|b| PRODUCTION_BRANCHES.contains(&b.as_str()))
    }

    /// Effective lock state: explicit value, else production inference.
    pub fn is_locked(&self, name: &str) -> bool {
        match self.locked {
            LockState::Locked => true,
            LockState::Unlocked => false,
            LockState::Inherit => name == PRODUCTION_ENVIRONMENT || self.has_production_branch(),
        }
    }

    /// Whether the given operation requires confirmation here.
    pub fn is_protected(&self, operation: Operation) -> bool {
        self.protected_operations
            .iter()
            .any(|op| op == operation.as_str())
    }
}

/// Settings that apply to every environment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    /// Refuse `--force` and critical `--yes` overrides.
    pub strict_mode: bool,

    /// Block working-tree sensitive operations on a dirty tree.
    pub require_clean_git: bool,

    /// Show a line diff when resolving migration conflicts.
    pub show_migration_diff: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            strict_mode: false,
            require_clean_git: true,
            show_migration_diff: true,
        }
    }
}

/// Coarse environment classification used by the risk table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnvironmentClass {
    /// Production (by name or by deploying from `main`/`master`).
    Production,
    /// Staging (by name).
    Staging,
    /// Anything else, including `local`.
    Development,
}

impl EnvironmentClass {
    /// Classify a named environment.
    pub fn classify(name: &str, environment: &Environment) -> Self {
        if name == PRODUCTION_ENVIRONMENT || environment.has_production_branch() {
            EnvironmentClass::Production
        } else if name == STAGING_ENVIRONMENT {
            EnvironmentClass::Staging
        } else {
            EnvironmentClass::Development
        }
    }
}

/// How an environment was resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchType {
    /// Branch listed literally.
    Exact,
    /// Branch matched a wildcard pattern.
    Wildcard,
    /// No pattern matched; the `local` environment was used.
    Fallback,
    /// Linked project ref equals the environment's project ref.
    ProjectRef,
    /// Named explicitly by the caller.
    Explicit,
}

impl fmt::Display for MatchType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            MatchType::Exact => "exact",
            MatchType::Wildcard => "wildcard",
            MatchType::Fallback => "fallback",
            MatchType::ProjectRef => "project ref",
            MatchType::Explicit => "explicit",
        };
        f.write_str(s)
    }
}

/// A resolved environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resolution<'a> {
    /// Environment name.
    pub name: &'a str,
    /// Environment record.
    pub environment: &'a Environment,
    /// How it was matched.
    pub match_type: MatchType,
}

/// Resolves environments over a declared-order environment map.
#[derive(Debug, Clone, Copy)]
pub struct EnvironmentResolver<'a> {
    environments: &'a Environments,
}

impl<'a> EnvironmentResolver<'a> {
    /// Create a resolver over the given environments.
    pub fn new(environments: &'a Environments) -> Self {
        Self { environments }
    }

    /// Resolve an environment from a git branch name.
    pub fn resolve(&self, branch: &str) -> Option<Resolution<'a>> {
        for (name, env) in self.environments {
            if env.git_branches.iter().any(|pattern| pattern == branch) {
                debug!(branch, environment = %name, "exact branch match");
                return Some(self.resolution(name, env, MatchType::Exact));
            }
        }

        for (name, env) in self.environments {
            for pattern in env.git_branches.iter().filter(|p| is_wildcard(p)) {
                match wildcard_matches(pattern, branch) {
                    Ok(true) => {
                        debug!(branch, pattern = %pattern, environment = %name, "wildcard branch match");
                        return Some(self.resolution(name, env, MatchType::Wildcard));
                    }
                    Ok(false) => {}
                    Err(e) => warn!("skipping branch pattern: {}", e),
                }
            }
        }

        self.environments
            .get_key_value(LOCAL_ENVIRONMENT)
            .map(|(name, env)| {
                debug!(branch, "no branch pattern matched, using local");
                self.resolution(name, env, MatchType::Fallback)
            })
    }

    /// Resolve an environment from the linked remote project ref.
    pub fn resolve_by_project_ref(&self, project_ref: &str) -> Option<Resolution<'a>> {
        self.environments
            .iter()
            .find(|(_, env)| env.project_ref.as_deref() == Some(project_ref))
            .map(|(name, env)| self.resolution(name, env, MatchType::ProjectRef))
    }

    /// Look up an environment by name.
    pub fn by_name(&self, name: &str) -> Option<Resolution<'a>> {
        self.environments
            .get_key_value(name)
            .map(|(name, env)| self.resolution(name, env, MatchType::Explicit))
    }

    fn resolution(&self, name: &'a str, env: &'a Environment, match_type: MatchType) -> Resolution<'a> {
        Resolution {
            name,
            environment: env,
            match_type,
        }
    }
}

/// Whether a branch pattern contains wildcard characters.
pub fn is_wildcard(pattern: &str) -> bool {
    pattern.contains('*') || pattern.contains('?')
}

/// Compile a wildcard pattern into an anchored regex.
///
/// `*` matches any run of characters, `?` matches one character, and
/// everything else matches literally.
pub fn compile_wildcard(pattern: &str) -> CoreResult<Regex> {
    let mut source = String::with_capacity(pattern.len() + 2);
    source.push('^');
    for c in pattern.chars() {
        match c {
            '*' => source.push_str(".*"),
            '?' => source.push('.'),
            other => source.push_str(&regex_lite::escape(other.encode_utf8(&mut [0; 4]))),
        }
    }
    source.push('$');

    Regex::new(&source).map_err(|e| CoreError::Pattern {
        pattern: pattern.to_string(),
        message: e.to_string(),
    })
}

/// Test a branch against a wildcard pattern.
pub fn wildcard_matches(pattern: &str, branch: &str) -> CoreResult<bool> {
    Ok(compile_wildcard(pattern)?.is_match(branch))
}
