//! Operation risk guard.
//!
//! Never blocks. Assigns a risk level from the table below and decides
//! whether confirmation is needed. Protection is opt-in: an operation only
//! requires confirmation when listed in the environment's
//! `protected_operations`.

use super::{GuardContext, GuardResult, RiskLevel};
use crate::environment::{EnvironmentClass, Operation};

/// Risk of an operation against an environment class.
///
/// | operation          | production | staging | development |
/// |--------------------|------------|---------|-------------|
/// | reset              | critical   | high    | medium      |
/// | push, seed         | high       | medium  | low         |
/// | pull               | medium     | low     | low         |
/// | diff, link, unlink | low        | low     | low         |
pub fn risk_for(operation: Operation, class: EnvironmentClass) -> RiskLevel {
    use EnvironmentClass::{Development, Production, Staging};
    use RiskLevel::{Critical, High, Low, Medium};

    match (operation, class) {
        (Operation::Reset, Production) => Critical,
        (Operation::Reset, Staging) => High,
        (Operation::Reset, Development) => Medium,
        (Operation::Push | Operation::Seed, Production) => High,
        (Operation::Push | Operation::Seed, Staging) => Medium,
        (Operation::Push | Operation::Seed, Development) => Low,
        (Operation::Pull, Production) => Medium,
        (Operation::Pull, Staging | Development) => Low,
        (Operation::Diff | Operation::Link | Operation::Unlink, _) => Low,
    }
}

/// Assign risk and confirmation requirements.
pub fn check(context: &GuardContext<'_>) -> GuardResult {
    let class = EnvironmentClass::classify(context.environment_name, context.environment);
    let risk = risk_for(context.operation, class);
    let requires_confirmation = context.environment.is_protected(context.operation);

    let confirm_word = context.environment.confirm_word.clone().or_else(|| {
        (risk == RiskLevel::Critical).then(|| context.environment_name.to_string())
    });

    GuardResult::allow()
        .with_risk(risk)
        .with_confirmation(requires_confirmation, confirm_word)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::environment::{Environment, Settings};

    #[test]
    fn test_risk_table() {
        assert_eq!(
            risk_for(Operation::Reset, EnvironmentClass::Production),
            RiskLevel::Critical
        );
        assert_eq!(
            risk_for(Operation::Reset, EnvironmentClass::Staging),
            RiskLevel::High
        );
        assert_eq!(
            risk_for(Operation::Reset, EnvironmentClass::Development),
            RiskLevel::Medium
        );
        assert_eq!(
            risk_for(Operation::Push, EnvironmentClass::Production),
            RiskLevel::High
        );
        assert_eq!(
            risk_for(Operation::Push, EnvironmentClass::Staging),
            RiskLevel::Medium
        );
        for class in [
            EnvironmentClass::Production,
            EnvironmentClass::Staging,
            EnvironmentClass::Development,
        ] {
            assert_eq!(risk_for(Operation::Diff, class), RiskLevel::Low);
        }
    }

    #[test]
    fn test_protected_operation_requires_confirmation() {
        let env = Environment::new().protect(Operation::Push);
        let settings = Settings::default();

        let push = GuardContext::new(Operation::Push, "staging", &env, &settings);
        assert!(check(&push).requires_confirmation);

        let reset = GuardContext::new(Operation::Reset, "staging", &env, &settings);
        assert!(!check(&reset).requires_confirmation);
    }

    #[test]
    fn test_confirm_word_falls_back_to_name_when_critical() {
        let env = Environment::new().protect(Operation::Reset);
        let settings = Settings::default();

        let ctx = GuardContext::new(Operation::Reset, "production", &env, &settings);
        let result = check(&ctx);
        assert_eq!(result.risk_level, Some(RiskLevel::Critical));
        assert_eq!(result.confirm_word.as_deref(), Some("production"));

        let ctx = GuardContext::new(Operation::Push, "production", &env, &settings);
        assert_eq!(check(&ctx).confirm_word, None);
    }

    #[test]
    fn test_custom_confirm_word_passes_through() {
        let env = Environment::new()
            .protect(Operation::Push)
            .with_confirm_word("ship-it");
        let settings = Settings::default();
        let ctx = GuardContext::new(Operation::Push, "staging", &env, &settings);
        assert_eq!(check(&ctx).confirm_word.as_deref(), Some("ship-it"));
    }
}
