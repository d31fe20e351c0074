use clap::Parser;
use tracing::{error, info};

use hookrun::cli::{self, Cli, Commands};
use hookrun::config::SystemConfig;
use hookrun::types::Result;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // A missing system config file falls back to defaults; a broken one is fatal
    let system_config = SystemConfig::load_optional(&cli.config)?;

    hookrun::logging::init(
        cli.log_level_override(),
        cli.log_format_override(),
        system_config.as_ref(),
    )?;

    hookrun::metrics::init_metrics();

    let system_config = system_config.unwrap_or_default();

    match cli.command.clone() {
        Commands::Run(args) => {
            info!(task = %args.task, "Running task");
            match cli::run_task(&cli, args, system_config).await {
                Ok(exit_code) => std::process::exit(exit_code),
                Err(e) => {
                    error!(error = %e, "Task run failed");
                    std::process::exit(1);
                }
            }
        }
        Commands::Validate => cli::validate_config(&cli, system_config),
        Commands::List => cli::list_tasks(&cli, system_config),
    }
}
