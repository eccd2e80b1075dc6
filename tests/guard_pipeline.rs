//! Integration tests for environment resolution and the guard pipeline.
//!
//! These tests drive the pipeline the way the CLI does: resolve an
//! environment from configuration, build a context, run the guards, then
//! settle confirmation.

use dbguard::prelude::*;
use dbguard_core::environment::Environments;
use dbguard_core::{ConfirmState, PromptKind, combine_results};
use pretty_assertions::assert_eq;

const ENVIRONMENTS: &str = r#"
    [local]

    [staging]
    project_ref = "stagingref"
    git_branches = ["develop", "release/*"]
    protected_operations = ["reset"]

    [production]
    project_ref = "prodref"
    git_branches = ["main"]
    protected_operations = ["push", "reset", "seed"]
    confirm_word = "ship-it"
"#;

fn environments() -> Environments {
    toml::from_str(ENVIRONMENTS).expect("Failed to parse environments")
}

/// Prompter answering from fixed values
struct Answers {
    confirm: Outcome<bool>,
    text: Outcome<String>,
    asked: usize,
}

impl Answers {
    fn new(confirm: Outcome<bool>, text: Outcome<String>) -> Self {
        Self {
            confirm,
            text,
            asked: 0,
        }
    }
}

impl Prompter for Answers {
    fn confirm(&mut self, _message: &str) -> Outcome<bool> {
        self.asked += 1;
        self.confirm.clone()
    }

    fn text(&mut self, _message: &str) -> Outcome<String> {
        self.asked += 1;
        self.text.clone()
    }

    fn select(&mut self, _message: &str, _options: &[&str]) -> Outcome<usize> {
        self.asked += 1;
        Outcome::Cancelled
    }
}

#[test]
fn test_settings_defaults() {
    let settings: Settings = toml::from_str("").unwrap();
    assert!(!settings.strict_mode);
    assert!(settings.require_clean_git);
    assert!(settings.show_migration_diff);
}

#[test]
fn test_unknown_settings_key_is_rejected() {
    assert!(toml::from_str::<Settings>("strict = true").is_err());
}

#[test]
fn test_resolution_order() {
    let envs = environments();
    let resolver = EnvironmentResolver::new(&envs);

    let cases = [
        ("main", "production", MatchType::Exact),
        ("develop", "staging", MatchType::Exact),
        ("release/1.2", "staging", MatchType::Wildcard),
        ("feature/login", "local", MatchType::Fallback),
    ];
    for (branch, expected, match_type) in cases {
        let resolved = resolver.resolve(branch).unwrap();
        assert_eq!((resolved.name, resolved.match_type), (expected, match_type), "{}", branch);
    }
}

#[test]
fn test_locked_production_blocks_push() {
    let envs = environments();
    let settings = Settings::default();
    let resolved = EnvironmentResolver::new(&envs).resolve("main").unwrap();

    let context = GuardContext::new(Operation::Push, resolved.name, resolved.environment, &settings)
        .with_branch("main");
    let verdict = run_guards(&context, Some("prodref"));

    assert!(verdict.is_blocked());
    assert_eq!(verdict.risk(), RiskLevel::Critical);
    assert!(verdict.reason.unwrap().contains("locked"));
}

#[test]
fn test_lock_is_checked_before_project() {
    let envs = environments();
    let settings = Settings::default();
    let production = &envs["production"];

    let context = GuardContext::new(Operation::Reset, "production", production, &settings)
        .with_uncommitted_changes(true);
    let verdict = run_guards(&context, Some("stagingref"));

    assert!(verdict.reason.unwrap().contains("locked"));
}

#[test]
fn test_non_destructive_operation_ignores_lock() {
    let envs = environments();
    let settings = Settings::default();
    let production = &envs["production"];

    let context = GuardContext::new(Operation::Diff, "production", production, &settings);
    let verdict = run_guards(&context, Some("prodref"));

    assert!(verdict.allowed);
    assert!(!verdict.requires_confirmation);
}

#[test]
fn test_forced_production_push_needs_typed_word() {
    let envs = environments();
    let settings = Settings::default();
    let production = &envs["production"];

    let context = GuardContext::new(Operation::Push, "production", production, &settings)
        .with_force(true);
    let verdict = run_guards(&context, Some("prodref"));

    assert!(verdict.allowed);
    assert_eq!(verdict.risk(), RiskLevel::Critical);

    let mut engine = ConfirmationEngine::from_verdict(&verdict, "production", false);
    assert_eq!(engine.prompt_kind(), PromptKind::TypedWord("ship-it".to_string()));

    let mut answers = Answers::new(Outcome::Value(true), Outcome::Value("Ship-It".to_string()));
    let outcome = engine.run(&mut answers, "push production");
    assert!(!outcome.confirmed);
    assert!(!outcome.cancelled);
    assert_eq!(engine.state(), ConfirmState::Declined);
}

#[test]
fn test_staging_reset_yes_no() {
    let envs = environments();
    let settings = Settings::default();
    let staging = &envs["staging"];

    let context = GuardContext::new(Operation::Reset, "staging", staging, &settings)
        .with_branch("develop");
    let verdict = run_guards(&context, Some("stagingref"));
    assert_eq!(verdict.risk(), RiskLevel::High);

    let mut engine = ConfirmationEngine::from_verdict(&verdict, "staging", false);
    let mut answers = Answers::new(Outcome::Value(true), Outcome::Cancelled);
    let outcome = engine.run(&mut answers, "reset staging");

    assert!(outcome.confirmed);
    assert_eq!(answers.asked, 1);
}

#[test]
fn test_ci_declines_without_prompting() {
    let envs = environments();
    let settings = Settings::default();
    let staging = &envs["staging"];

    let context = GuardContext::new(Operation::Reset, "staging", staging, &settings).with_ci(true);
    let verdict = run_guards(&context, Some("stagingref"));

    let mut engine = ConfirmationEngine::from_verdict(&verdict, "staging", true);
    let mut answers = Answers::new(Outcome::Value(true), Outcome::Cancelled);
    let outcome = engine.run(&mut answers, "reset staging");

    assert!(!outcome.confirmed);
    assert!(!outcome.prompted);
    assert_eq!(answers.asked, 0);
}

#[test]
fn test_cancel_is_not_decline() {
    let envs = environments();
    let settings = Settings::default();
    let staging = &envs["staging"];

    let context = GuardContext::new(Operation::Reset, "staging", staging, &settings);
    let verdict = run_guards(&context, Some("stagingref"));

    let mut engine = ConfirmationEngine::from_verdict(&verdict, "staging", false);
    let mut answers = Answers::new(Outcome::Cancelled, Outcome::Cancelled);
    let outcome = engine.run(&mut answers, "reset staging");

    assert!(outcome.cancelled);
    assert_eq!(engine.state(), ConfirmState::Cancelled);
}

#[test]
fn test_dirty_tree_blocks_pull_but_not_diff() {
    let envs = environments();
    let settings = Settings::default();
    let staging = &envs["staging"];

    let pull = GuardContext::new(Operation::Pull, "staging", staging, &settings)
        .with_uncommitted_changes(true);
    assert!(run_guards(&pull, Some("stagingref")).is_blocked());

    let diff = GuardContext::new(Operation::Diff, "staging", staging, &settings)
        .with_uncommitted_changes(true);
    assert!(!run_guards(&diff, Some("stagingref")).is_blocked());
}

#[test]
fn test_combine_results_of_allowed_verdicts() {
    let combined = combine_results(&[
        GuardResult::allow()
            .with_risk(RiskLevel::Medium)
            .with_suggestion("stash first"),
        GuardResult::allow()
            .with_risk(RiskLevel::High)
            .with_confirmation(true, Some("staging".to_string()))
            .with_suggestion("stash first"),
    ]);

    assert!(combined.allowed);
    assert_eq!(combined.risk(), RiskLevel::High);
    assert!(combined.requires_confirmation);
    assert_eq!(combined.confirm_word.as_deref(), Some("staging"));
    assert_eq!(combined.suggestions, vec!["stash first".to_string()]);
}
