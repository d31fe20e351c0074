use clap::{Args, Parser, Subcommand, ValueEnum};
use std::collections::BTreeMap;
use std::path::PathBuf;
use tracing::{error, info, instrument};

use crate::config::{SystemConfig, TasksConfig};
use crate::manager::TaskManager;
use crate::types::{Error, Result};

#[derive(Parser)]
#[command(name = "hookrun")]
#[command(about = "Run configured commands for named tasks")]
#[command(long_about = "
Runs externally configured commands on behalf of named tasks. Commands marked
non-reentrant never run concurrently with another invocation of the same command.
")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// System configuration file path
    #[arg(short, long, default_value = "/etc/hookrun/config.toml")]
    pub config: PathBuf,

    /// Task configuration file path
    #[arg(short, long, default_value = "/etc/hookrun/tasks.toml")]
    pub tasks: PathBuf,

    /// Override log level
    #[arg(long, value_enum)]
    pub log_level: Option<LogLevel>,

    /// Override log format
    #[arg(long, value_enum)]
    pub log_format: Option<LogFormat>,

    /// Enable verbose output (sets log level to debug)
    #[arg(short, long)]
    pub verbose: bool,

    /// Run in quiet mode (minimal output)
    #[arg(short, long, conflicts_with = "verbose")]
    pub quiet: bool,
}

#[derive(ValueEnum, Clone, Debug)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

#[derive(ValueEnum, Clone, Debug)]
pub enum LogFormat {
    Json,
    Pretty,
    Compact,
}

#[derive(Subcommand, Clone)]
pub enum Commands {
    /// Run one task and print its result
    Run(RunArgs),
    /// Validate configuration files
    Validate,
    /// List configured tasks
    List,
}

#[derive(Args, Clone)]
pub struct RunArgs {
    /// Task name
    pub task: String,

    /// Request value available to templates as {{request "key"}} (repeatable)
    #[arg(long = "set", value_name = "KEY=VALUE", value_parser = parse_key_value)]
    pub values: Vec<(String, String)>,

    /// Print the result as JSON
    #[arg(long)]
    pub json: bool,

    /// Print Prometheus metrics after the run
    #[arg(long)]
    pub metrics: bool,
}

fn parse_key_value(s: &str) -> std::result::Result<(String, String), String> {
    let (key, value) = s
        .split_once('=')
        .ok_or_else(|| format!("invalid KEY=VALUE: no '=' found in '{}'", s))?;
    if key.is_empty() {
        return Err(format!("invalid KEY=VALUE: empty key in '{}'", s));
    }
    Ok((key.to_string(), value.to_string()))
}

impl Cli {
    /// Get effective log level considering verbose/quiet flags
    pub fn effective_log_level(&self) -> LogLevel {
        if self.verbose {
            LogLevel::Debug
        } else if self.quiet {
            LogLevel::Error
        } else {
            self.log_level.clone().unwrap_or(LogLevel::Info)
        }
    }

    /// Log level override, if any flag asked for one
    pub fn log_level_override(&self) -> Option<&'static str> {
        if self.log_level.is_none() && !self.verbose && !self.quiet {
            return None;
        }
        Some(match self.effective_log_level() {
            LogLevel::Trace => crate::logging::level::TRACE,
            LogLevel::Debug => crate::logging::level::DEBUG,
            LogLevel::Info => crate::logging::level::INFO,
            LogLevel::Warn => crate::logging::level::WARN,
            LogLevel::Error => crate::logging::level::ERROR,
        })
    }

    pub fn log_format_override(&self) -> Option<&'static str> {
        self.log_format.as_ref().map(|fmt| match fmt {
            LogFormat::Json => crate::logging::format::JSON,
            LogFormat::Pretty => crate::logging::format::PRETTY,
            LogFormat::Compact => crate::logging::format::COMPACT,
        })
    }
}

fn load_tasks(cli: &Cli, system_config: &SystemConfig) -> Result<TasksConfig> {
    let tasks = TasksConfig::load_from_file(&cli.tasks)?
        .with_default_timeout(system_config.limits.command_timeout);
    tasks.validate()?;
    Ok(tasks)
}

/// Run a single task and return its exit code
#[instrument(skip(cli, args, system_config), fields(task = %args.task))]
pub async fn run_task(cli: &Cli, args: RunArgs, system_config: SystemConfig) -> Result<i32> {
    system_config.validate()?;
    let tasks = load_tasks(cli, &system_config)?;

    let manager = TaskManager::builder(tasks.into_map())
        .with_queue_capacity(system_config.limits.queue_capacity)
        .build();

    let values: BTreeMap<String, String> = args.values.into_iter().collect();
    let handle = manager.run_task(&args.task, values).await?;
    let result = handle.await.ok_or_else(|| {
        Error::Application(format!("No result delivered for task {}", args.task))
    })?;

    if args.json {
        let json = serde_json::to_string_pretty(&result)
            .map_err(|e| Error::Application(format!("Failed to encode result: {}", e)))?;
        println!("{}", json);
    } else {
        println!("{} exited {}", result.name, result.exit_code);
        if !result.stdout.is_empty() {
            println!("stdout: {}", result.stdout);
        }
        if !result.stderr.is_empty() {
            println!("stderr: {}", result.stderr);
        }
        if !result.message.is_empty() {
            println!("message: {}", result.message);
        }
    }

    if args.metrics {
        let metrics = crate::metrics::gather_metrics().map_err(Error::Application)?;
        print!("{}", metrics);
    }

    Ok(result.exit_code)
}

/// Validate configuration files
#[instrument(skip(cli, system_config))]
pub fn validate_config(cli: &Cli, system_config: SystemConfig) -> Result<()> {
    info!("Validating configuration files...");

    match system_config.validate() {
        Ok(()) => info!(
            config_path = %cli.config.display(),
            "System configuration is valid"
        ),
        Err(e) => {
            error!(
                config_path = %cli.config.display(),
                error = %e,
                "System configuration validation failed"
            );
            return Err(e);
        }
    }

    match load_tasks(cli, &system_config) {
        Ok(tasks) => info!(
            tasks_path = %cli.tasks.display(),
            tasks_count = tasks.tasks.len(),
            "Task configuration is valid"
        ),
        Err(e) => {
            error!(
                tasks_path = %cli.tasks.display(),
                error = %e,
                "Task configuration validation failed"
            );
            return Err(e);
        }
    }

    info!("All configuration files are valid");
    Ok(())
}

/// Print configured tasks
pub fn list_tasks(cli: &Cli, system_config: SystemConfig) -> Result<()> {
    let tasks = load_tasks(cli, &system_config)?;

    let mut names: Vec<&String> = tasks.tasks.keys().collect();
    names.sort();
    for name in names {
        let task = &tasks.tasks[name];
        let mode = if task.reentrant { "reentrant" } else { "serialized" };
        println!("{}\t{}\t{}", name, mode, task.command);
    }
    Ok(())
}
