//! # dbguard-core
//!
//! Decision engine for guarding database operations across environments.
//!
//! This crate provides:
//! - Environment resolution from git branches or linked project refs
//! - A guard pipeline (lock, project match, clean working tree, risk)
//! - A confirmation engine driven by the aggregated risk level
//! - Migration drift detection between local files and remote history
//! - Repair and rescue actions for reconciling drift
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐     ┌────────────────┐     ┌──────────────┐
//! │ Environment  │────▶│ Guard Pipeline │────▶│ Confirmation │
//! │ Resolver     │     │ (short-circuit)│     │ Engine       │
//! └──────────────┘     └────────────────┘     └──────────────┘
//!                                                     │
//!                                                     ▼
//! ┌──────────────┐     ┌────────────────┐     ┌──────────────┐
//! │ Rescue       │◀────│ Sync Engine    │◀────│ Migration    │
//! │ (repair/pull)│     │ (drift check)  │     │ Tool         │
//! └──────────────┘     └────────────────┘     └──────────────┘
//! ```
//!
//! ## Example
//!
//! ```rust,ignore
//! use dbguard_core::prelude::*;
//!
//! let resolver = EnvironmentResolver::new(&environments);
//! let resolved = resolver.resolve("feature/login").expect("environment");
//!
//! let context = GuardContext::new(Operation::Push, resolved.name, resolved.environment, &settings)
//!     .with_branch("feature/login");
//!
//! let verdict = run_guards(&context, linked_ref.as_deref());
//! if !verdict.allowed {
//!     eprintln!("blocked: {}", verdict.reason.unwrap_or_default());
//! }
//! ```

pub mod confirm;
pub mod diff;
pub mod environment;
pub mod error;
pub mod git;
pub mod guard;
pub mod rescue;
pub mod sync;
pub mod tool;

pub use confirm::{
    ConfirmState, ConfirmationEngine, ConfirmationOutcome, Outcome, PromptKind, Prompter,
};
pub use diff::{Clock, SimpleDiff, SystemClock, compute_simple_diff, content_hash};
pub use environment::{
    Environment, EnvironmentClass, EnvironmentResolver, LockState, MatchType, Operation,
    Resolution, Settings,
};
pub use error::{CoreError, CoreResult};
pub use git::GitState;
pub use guard::{GuardContext, GuardResult, RiskLevel, combine_results, run_guards};
pub use sync::{LocalMigration, MigrationSync, MigrationSyncStatus};
pub use tool::{MigrationTool, ProcessTool, ToolAction, ToolOutput};

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::confirm::{ConfirmationEngine, ConfirmationOutcome, Outcome, Prompter};
    pub use crate::environment::{
        Environment, EnvironmentResolver, LockState, MatchType, Operation, Settings,
    };
    pub use crate::error::{CoreError, CoreResult};
    pub use crate::guard::{GuardContext, GuardResult, RiskLevel, run_guards};
    pub use crate::rescue::{ConflictChoice, Rescue};
    pub use crate::sync::{MigrationSync, MigrationSyncStatus};
    pub use crate::tool::{MigrationTool, ProcessTool, ToolAction};
}
