//! # dbguard
//!
//! Safety guards for running database migrations across local, staging and
//! production environments.
//!
//! dbguard provides:
//! - Environment resolution from the linked project or the current git branch
//! - Lock, project-match, clean-tree and risk guards evaluated in a fixed order
//! - Risk-scaled confirmation (yes/no, or a typed confirm word when critical)
//! - Drift detection between local migration files and the remote history
//! - Interactive repair, pull and per-conflict rescue actions
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use dbguard::prelude::*;
//!
//! let resolver = EnvironmentResolver::new(&environments);
//! let resolved = resolver.resolve("main").expect("environment");
//!
//! let context = GuardContext::new(Operation::Reset, resolved.name, resolved.environment, &settings)
//!     .with_branch("main");
//! let verdict = run_guards(&context, Some("prodref"));
//!
//! if verdict.is_blocked() {
//!     for suggestion in &verdict.suggestions {
//!         println!("hint: {}", suggestion);
//!     }
//! }
//! ```
//!
//! The `dbguard` binary lives in the `dbguard-cli` crate.

#![cfg_attr(docsrs, feature(doc_cfg))]
#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

/// Guard pipeline and risk levels.
pub mod guard {
    pub use dbguard_core::guard::*;
}

/// Migration drift detection and rescue.
pub mod migrations {
    pub use dbguard_core::rescue::*;
    pub use dbguard_core::sync::*;
}

/// Prelude module for convenient imports.
pub mod prelude {
    pub use dbguard_core::prelude::*;
}

// Re-export key types at the crate root
pub use dbguard_core::{
    ConfirmationEngine, CoreError, CoreResult, Environment, EnvironmentResolver, GuardContext,
    GuardResult, MigrationSyncStatus, Operation, RiskLevel, Settings,
};
