//! Confirmation engine.
//!
//! ```text
//!            ┌──────────────▶ Confirmed   (nothing to confirm)
//!            │
//!  Idle ─────┼──────────────▶ Declined    (CI mode)
//!            │
//!            └──▶ Prompting ─┬─▶ Confirmed
//!                            ├─▶ Declined
//!                            └─▶ Cancelled
//! ```
//!
//! Critical operations demand the exact confirmation word (case-sensitive);
//! anything below critical asks yes/no. Prompt surfaces return
//! [`Outcome::Cancelled`] rather than failing, and the engine reports
//! cancellation separately from a decline.

use tracing::debug;

use crate::guard::{GuardResult, RiskLevel};

/// Value returned from an interactive prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome<T> {
    /// The user answered.
    Value(T),
    /// The user cancelled the prompt.
    Cancelled,
}

impl<T> Outcome<T> {
    /// Whether the prompt was cancelled.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Outcome::Cancelled)
    }

    /// The answer, if any.
    pub fn value(self) -> Option<T> {
        match self {
            Outcome::Value(v) => Some(v),
            Outcome::Cancelled => None,
        }
    }

    /// Map the answer.
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Outcome<U> {
        match self {
            Outcome::Value(v) => Outcome::Value(f(v)),
            Outcome::Cancelled => Outcome::Cancelled,
        }
    }
}

/// Interactive input surface.
pub trait Prompter {
    /// Ask a yes/no question.
    fn confirm(&mut self, message: &str) -> Outcome<bool>;

    /// Ask for free text.
    fn text(&mut self, message: &str) -> Outcome<String>;

    /// Ask the user to pick one of `options`; returns its index.
    fn select(&mut self, message: &str, options: &[&str]) -> Outcome<usize>;
}

/// Engine state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfirmState {
    /// Not started.
    Idle,
    /// Waiting for input.
    Prompting,
    /// May proceed.
    Confirmed,
    /// User (or CI policy) said no.
    Declined,
    /// User cancelled the prompt.
    Cancelled,
}

impl ConfirmState {
    /// Whether no further transitions are possible.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ConfirmState::Confirmed | ConfirmState::Declined | ConfirmState::Cancelled
        )
    }
}

/// What kind of prompt the engine will show.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PromptKind {
    /// No confirmation needed.
    Skip,
    /// CI mode: decline without prompting.
    Decline,
    /// Yes/no question.
    YesNo,
    /// The given word must be typed exactly.
    TypedWord(String),
}

/// Result of running the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConfirmationOutcome {
    /// The operation may proceed.
    pub confirmed: bool,
    /// The user cancelled.
    pub cancelled: bool,
    /// A prompt was shown.
    pub prompted: bool,
}

/// Decides whether and how to ask for confirmation.
#[derive(Debug, Clone)]
pub struct ConfirmationEngine {
    state: ConfirmState,
    risk: RiskLevel,
    requires_confirmation: bool,
    confirm_word: String,
    ci: bool,
}

impl ConfirmationEngine {
    /// Create an engine.
    ///
    /// When a critical confirmation has no word, `environment_name` is used.
    pub fn new(
        risk: RiskLevel,
        requires_confirmation: bool,
        confirm_word: Option<&str>,
        environment_name: &str,
        ci: bool,
    ) -> Self {
        Self {
            state: ConfirmState::Idle,
            risk,
            requires_confirmation,
            confirm_word: confirm_word
                .filter(|w| !w.is_empty())
                .unwrap_or(environment_name)
                .to_string(),
            ci,
        }
    }

    /// Create an engine from an aggregated guard verdict.
    pub fn from_verdict(verdict: &GuardResult, environment_name: &str, ci: bool) -> Self {
        Self::new(
            verdict.risk(),
            verdict.requires_confirmation,
            verdict.confirm_word.as_deref(),
            environment_name,
            ci,
        )
    }

    /// Current state.
    pub fn state(&self) -> ConfirmState {
        self.state
    }

    /// The prompt that [`run`](Self::run) will show.
    pub fn prompt_kind(&self) -> PromptKind {
        if !self.requires_confirmation {
            PromptKind::Skip
        } else if self.ci {
            PromptKind::Decline
        } else if self.risk == RiskLevel::Critical {
            PromptKind::TypedWord(self.confirm_word.clone())
        } else {
            PromptKind::YesNo
        }
    }

    /// Run the engine to a terminal state. `action` describes the operation,
    /// e.g. "reset production".
    ///
    /// Running an engine that already finished returns its outcome again
    /// without prompting.
    pub fn run(&mut self, prompter: &mut dyn Prompter, action: &str) -> ConfirmationOutcome {
        if self.state.is_terminal() {
            return self.outcome(false);
        }

        match self.prompt_kind() {
            PromptKind::Skip => {
                self.transition(ConfirmState::Confirmed);
                self.outcome(false)
            }
            PromptKind::Decline => {
                self.transition(ConfirmState::Declined);
                self.outcome(false)
            }
            PromptKind::YesNo => {
                self.transition(ConfirmState::Prompting);
                let next = match prompter.confirm(&format!("Proceed to {}?", action)) {
                    Outcome::Value(true) => ConfirmState::Confirmed,
                    Outcome::Value(false) => ConfirmState::Declined,
                    Outcome::Cancelled => ConfirmState::Cancelled,
                };
                self.transition(next);
                self.outcome(true)
            }
            PromptKind::TypedWord(word) => {
                self.transition(ConfirmState::Prompting);
                let message = format!("This will {}. Type '{}' to confirm", action, word);
                let next = match prompter.text(&message) {
                    Outcome::Value(typed) if typed == word => ConfirmState::Confirmed,
                    Outcome::Value(_) => ConfirmState::Declined,
                    Outcome::Cancelled => ConfirmState::Cancelled,
                };
                self.transition(next);
                self.outcome(true)
            }
        }
    }

    fn transition(&mut self, next: ConfirmState) {
        debug!(from = ?self.state, to = ?next, "confirmation state");
        self.state = next;
    }

    fn outcome(&self, prompted: bool) -> ConfirmationOutcome {
        ConfirmationOutcome {
            confirmed: self.state == ConfirmState::Confirmed,
            cancelled: self.state == ConfirmState::Cancelled,
            prompted,
        }
    }
}


#[cfg(test)]
mod tests {
    use super::testing::ScriptedPrompter;
    use super::*;

    fn critical(ci: bool) -> ConfirmationEngine {
        ConfirmationEngine::new(RiskLevel::Critical, true, Some("production"), "production", ci)
    }

    fn typed(text: &str) -> ScriptedPrompter {
        ScriptedPrompter::new().text_with(Outcome::Value(text.to_string()))
    }

    #[test]
    fn test_exact_word_confirms() {
        let mut engine = critical(false);
        let outcome = engine.run(&mut typed("production"), "reset production");
        assert!(outcome.confirmed);
        assert!(!outcome.cancelled);
        assert_eq!(engine.state(), ConfirmState::Confirmed);
    }

    #[test]
    fn test_word_is_case_sensitive() {
        let outcome = critical(false).run(&mut typed("Production"), "reset production");
        assert!(!outcome.confirmed);
        assert!(!outcome.cancelled);
    }

    #[test]
    fn test_empty_word_declines() {
        let mut engine = critical(false);
        let outcome = engine.run(&mut typed(""), "reset production");
        assert!(!outcome.confirmed);
        assert_eq!(engine.state(), ConfirmState::Declined);
    }

    #[test]
    fn test_cancel_is_distinct_from_decline() {
        let mut prompter = ScriptedPrompter::new().text_with(Outcome::Cancelled);
        let mut engine = critical(false);
        let outcome = engine.run(&mut prompter, "reset production");
        assert!(outcome.cancelled);
        assert!(!outcome.confirmed);
        assert_eq!(engine.state(), ConfirmState::Cancelled);
    }

    #[test]
    fn test_ci_declines_without_prompting() {
        let mut prompter = ScriptedPrompter::new();
        let mut engine = critical(true);
        let outcome = engine.run(&mut prompter, "reset production");
        assert!(!outcome.confirmed);
        assert!(!outcome.prompted);
        assert!(prompter.messages.is_empty());
        assert_eq!(engine.state(), ConfirmState::Declined);

        let mut engine = ConfirmationEngine::new(RiskLevel::Medium, true, None, "staging", true);
        assert!(!engine.run(&mut prompter, "push staging").confirmed);
        assert!(prompter.messages.is_empty());
    }

    #[test]
    fn test_yes_no_below_critical() {
        let mut yes = ScriptedPrompter::new().confirm_with(Outcome::Value(true));
        let mut engine = ConfirmationEngine::new(RiskLevel::High, true, None, "staging", false);
        assert_eq!(engine.prompt_kind(), PromptKind::YesNo);
        assert!(engine.run(&mut yes, "reset staging").confirmed);
        assert!(yes.messages[0].contains("reset staging"));

        let mut no = ScriptedPrompter::new().confirm_with(Outcome::Value(false));
        let mut engine = ConfirmationEngine::new(RiskLevel::High, true, None, "staging", false);
        let outcome = engine.run(&mut no, "reset staging");
        assert!(!outcome.confirmed && !outcome.cancelled);

        let mut cancel = ScriptedPrompter::new().confirm_with(Outcome::Cancelled);
        let mut engine = ConfirmationEngine::new(RiskLevel::High, true, None, "staging", false);
        assert!(engine.run(&mut cancel, "reset staging").cancelled);
    }

    #[test]
    fn test_not_required_skips_prompt() {
        let mut prompter = ScriptedPrompter::new();
        let mut engine =
            ConfirmationEngine::new(RiskLevel::Critical, false, None, "production", false);
        let outcome = engine.run(&mut prompter, "reset production");
        assert!(outcome.confirmed);
        assert!(!outcome.prompted);
        assert!(prompter.messages.is_empty());
    }

    #[test]
    fn test_word_falls_back_to_environment_name() {
        let engine = ConfirmationEngine::new(RiskLevel::Critical, true, None, "prod-eu", false);
        assert_eq!(
            engine.prompt_kind(),
            PromptKind::TypedWord("prod-eu".to_string())
        );
    }

    #[test]
    fn test_terminal_engine_does_not_prompt_again() {
        let mut prompter = typed("production");
        let mut engine = critical(false);
        assert!(engine.run(&mut prompter, "reset production").confirmed);
        let again = engine.run(&mut prompter, "reset production");
        assert!(again.confirmed);
        assert_eq!(prompter.messages.len(), 1);
    }
}
