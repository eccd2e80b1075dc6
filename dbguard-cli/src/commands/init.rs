//! `dbguard init` command - Write a starter configuration.

use crate::cli::{GlobalArgs, InitArgs};
use crate::config::{CONFIG_FILE_NAME, Config, STARTER_CONFIG};
use crate::error::{CliError, CliResult};
use crate::output;

/// Run the init command
pub async fn run(global: &GlobalArgs, args: InitArgs) -> CliResult<()> {
    output::header("Initialize dbguard");

    let config_path = match &global.config {
        Some(path) => path.clone(),
        None => args.path.join(CONFIG_FILE_NAME),
    };

    if config_path.exists() && !args.force {
        return Err(CliError::Command(format!(
            "{} already exists; pass --force to overwrite it",
            config_path.display()
        )));
    }

    // The template must stay loadable.
    Config::parse(STARTER_CONFIG, &config_path)?;

    if let Some(parent) = config_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(&config_path, STARTER_CONFIG)?;

    output::success(&format!("Created {}", config_path.display()));
    output::newline();
    output::section("Next steps");
    output::list_item("Declare staging and production environments with their project refs");
    output::list_item("Map git branches to environments with git_branches");
    output::list_item("Run `dbguard status` to check the resolved environment");
    Ok(())
}
