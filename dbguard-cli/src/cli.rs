//! CLI argument definitions using clap.

use clap::builder::FalseyValueParser;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// dbguard - Guard rails for multi-environment database migrations
#[derive(Parser, Debug)]
#[command(name = "dbguard")]
#[command(author = "Pegasus Heavy Industries LLC")]
#[command(version)]
#[command(
    about = "dbguard - Guard rails for multi-environment database migrations",
    long_about = None
)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Options shared by every command
    #[command(flatten)]
    pub global: GlobalArgs,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Command,
}

/// Options shared by every command
#[derive(Args, Debug, Clone, Default)]
pub struct GlobalArgs {
    /// Path to dbguard.toml (defaults to ./dbguard.toml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Show debug logs and full error reports
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Non-interactive mode; protected operations need --yes
    #[arg(long, global = true, env = "CI", value_parser = FalseyValueParser::new())]
    pub ci: bool,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Create a starter dbguard.toml
    Init(InitArgs),

    /// Push local migrations to the target database
    Push(PushArgs),

    /// Reset the target database
    Reset(GuardArgs),

    /// Pull migrations from the remote database
    Pull(GuardArgs),

    /// Seed the target database
    Seed(GuardArgs),

    /// Diff the schema against the target database
    Diff(GuardArgs),

    /// Link the working copy to an environment's project
    Link(GuardArgs),

    /// Remove the project link
    Unlink(GuardArgs),

    /// Show the resolved environment and migration sync status
    Status(StatusArgs),

    /// Detect and repair migration drift
    Sync(SyncArgs),

    /// Lock an environment against destructive operations
    Lock(LockArgs),

    /// Unlock an environment
    Unlock(LockArgs),
}

// =============================================================================
// Init Command
// =============================================================================

/// Arguments for the `init` command
#[derive(Args, Debug)]
pub struct InitArgs {
    /// Directory to initialize (defaults to current directory)
    #[arg(default_value = ".")]
    pub path: PathBuf,

    /// Overwrite an existing dbguard.toml
    #[arg(short, long)]
    pub force: bool,
}

// =============================================================================
// Guarded Commands
// =============================================================================

/// Arguments shared by guarded operations
#[derive(Args, Debug, Clone, Default)]
pub struct GuardArgs {
    /// Environment to target (defaults to the linked project, then git branch)
    #[arg(short, long)]
    pub env: Option<String>,

    /// Override an environment lock (not recommended for production)
    #[arg(long)]
    pub force: bool,

    /// Skip the confirmation prompt
    #[arg(short = 'y', long)]
    pub yes: bool,
}

/// Arguments for the `push` command
#[derive(Args, Debug, Clone, Default)]
pub struct PushArgs {
    #[command(flatten)]
    pub guard: GuardArgs,

    /// Skip the migration sync check before pushing
    #[arg(long)]
    pub skip_sync: bool,
}

// =============================================================================
// Status / Sync Commands
// =============================================================================

/// Arguments for the `status` command
#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Environment to inspect
    #[arg(short, long)]
    pub env: Option<String>,

    /// Print the sync status as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the `sync` command
#[derive(Args, Debug)]
pub struct SyncArgs {
    /// Environment to reconcile against
    #[arg(short, long)]
    pub env: Option<String>,

    /// Skip comparing migration bodies with the remote
    #[arg(long)]
    pub skip_conflicts: bool,

    /// Override an environment lock for repair (not recommended for production)
    #[arg(long)]
    pub force: bool,
}

// =============================================================================
// Lock Commands
// =============================================================================

/// Arguments for `lock` and `unlock`
#[derive(Args, Debug)]
pub struct LockArgs {
    /// Environment name
    pub environment: String,

    /// Skip the confirmation prompt
    #[arg(short = 'y', long)]
    pub yes: bool,
}
