//! dbguard CLI - Command-line interface for guarded database operations.

use clap::Parser;
use tracing_subscriber::EnvFilter;

use dbguard_cli::cli::{Cli, Command};
use dbguard_cli::commands;
use dbguard_cli::error::CliResult;
use dbguard_cli::output;
use dbguard_core::Operation;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.global.verbose);

    let verbose = cli.global.verbose;
    if let Err(e) = run(cli).await {
        output::newline();
        output::error(&e.to_string());
        if verbose {
            eprintln!("{:?}", miette::Report::new(e));
        }
        std::process::exit(1);
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

async fn run(cli: Cli) -> CliResult<()> {
    let global = cli.global;

    match cli.command {
        Command::Init(args) => commands::init::run(&global, args).await,
        Command::Push(args) => commands::guarded::run_push(&global, args).await,
        Command::Reset(args) => commands::guarded::run(&global, Operation::Reset, args).await,
        Command::Pull(args) => commands::guarded::run(&global, Operation::Pull, args).await,
        Command::Seed(args) => commands::guarded::run(&global, Operation::Seed, args).await,
        Command::Diff(args) => commands::guarded::run(&global, Operation::Diff, args).await,
        Command::Link(args) => commands::guarded::run(&global, Operation::Link, args).await,
        Command::Unlink(args) => commands::guarded::run(&global, Operation::Unlink, args).await,
        Command::Status(args) => commands::status::run(&global, args).await,
        Command::Sync(args) => commands::sync::run(&global, args).await,
        Command::Lock(args) => commands::lock::run_lock(&global, args).await,
        Command::Unlock(args) => commands::lock::run_unlock(&global, args).await,
    }
}
