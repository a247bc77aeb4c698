//! Sequor CLI - run a tool-calling conversation from the terminal.

#![allow(clippy::print_stdout)] // CLI program intentionally uses stdout

mod tools;

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use anyhow::{Context, bail};
use clap::{Args, Parser, Subcommand};
use sequor::config::{self, IssueLevel, SequorConfig};
use sequor::prelude::*;
use tracing::Level;
use tracing_subscriber::EnvFilter;

/// Sequor - sequential tool-calling orchestrator
#[derive(Parser)]
#[command(name = "sequor")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Configuration file path
    #[arg(short, long, env = "SEQUOR_CONFIG", global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one conversation turn to completion
    Run(RunArgs),

    /// Manage configuration
    Config(ConfigArgs),
}

/// Arguments for the run command
#[derive(Args)]
struct RunArgs {
    /// User message to send
    #[arg(short, long)]
    message: String,

    /// Optional system prompt
    #[arg(short, long)]
    system: Option<String>,

    /// Model to use (overrides config)
    #[arg(short = 'M', long, env = "SEQUOR_MODEL")]
    model: Option<String>,

    /// Maximum tool-use iterations (overrides config)
    #[arg(long)]
    max_iterations: Option<usize>,

    /// Run timeout in seconds (overrides config)
    #[arg(long)]
    timeout: Option<f64>,

    /// Print the full message history as JSON instead of the final answer
    #[arg(long)]
    json: bool,
}

/// Arguments for the config command
#[derive(Args)]
struct ConfigArgs {
    #[command(subcommand)]
    command: ConfigCommands,
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Write a default configuration file
    Init {
        /// Overwrite an existing file
        #[arg(short, long)]
        force: bool,
    },
    /// Show the effective configuration
    Show,
    /// Show configuration file path
    Path,
    /// Validate configuration
    Validate,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    init_logging(cli.verbose);

    let rt = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            tracing::error!("failed to create tokio runtime: {e}");
            return ExitCode::FAILURE;
        }
    };

    match rt.block_on(run(cli)) {
        Ok(code) => code,
        Err(e) => {
            tracing::error!("{e:#}");
            ExitCode::FAILURE
        }
    }
}

/// Initialize logging with the given verbosity level.
fn init_logging(verbosity: u8) {
    let level = match verbosity {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "sequor={level},sequor_cli={level},{}",
            if verbosity >= 3 { "debug" } else { "warn" }
        ))
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(verbosity >= 2)
        .with_writer(std::io::stderr)
        .init();
}

async fn run(cli: Cli) -> anyhow::Result<ExitCode> {
    match cli.command {
        Commands::Run(args) => cmd_run(args, cli.config).await,
        Commands::Config(args) => cmd_config(args, cli.config).await,
    }
}

async fn load(path: Option<PathBuf>) -> anyhow::Result<SequorConfig> {
    let path = path.unwrap_or_else(config::config_path);
    let config = config::load_config_from(&path)
        .await
        .with_context(|| format!("failed to load config from {}", path.display()))?;
    Ok(config.with_env())
}

/// Execute one supervised run.
async fn cmd_run(args: RunArgs, config_path: Option<PathBuf>) -> anyhow::Result<ExitCode> {
    let config = load(config_path).await?;
    report_issues(&config);
    if !config.is_valid() {
        bail!("configuration has errors, see `sequor config validate`");
    }

    let openai = config
        .openai
        .clone()
        .context("no OpenAI endpoint configured: set OPENAI_API_KEY or add an [openai] table")?;
    let provider = OpenAI::new(openai).context("failed to create OpenAI client")?;

    let mut run_config = config.run;
    if let Some(model) = args.model {
        run_config = run_config.model(model);
    }
    if let Some(max) = args.max_iterations {
        run_config = run_config.max_iterations(max);
    }
    if let Some(secs) = args.timeout {
        let timeout = Duration::try_from_secs_f64(secs).context("invalid --timeout")?;
        run_config = run_config.timeout(timeout);
    }

    let mut history = Vec::with_capacity(2);
    if let Some(system) = args.system {
        history.push(Message::system(system));
    }
    history.push(Message::user(args.message));

    let cwd = std::env::current_dir().context("cannot determine working directory")?;
    let tools = tools::builtin(cwd);

    let supervisor = Supervisor::new(provider).with_hooks(LoggingRunHooks::new());
    let result = supervisor.run(history, &tools, &run_config).await;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        if let Some(text) = result.final_text() {
            println!("{text}");
        }
        println!();
        println!(
            "[{}] iterations: {}, tool calls: {}, {}",
            result.status,
            result.iterations,
            result.tool_calls.len(),
            result.usage
        );
    }

    Ok(if result.is_success() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

/// Manage configuration.
async fn cmd_config(args: ConfigArgs, config_path: Option<PathBuf>) -> anyhow::Result<ExitCode> {
    match args.command {
        ConfigCommands::Init { force } => {
            let path = config_path.unwrap_or_else(config::config_path);
            if !force && tokio::fs::try_exists(&path).await? {
                bail!(
                    "{} already exists, use --force to overwrite",
                    path.display()
                );
            }
            config::save_config_to(&SequorConfig::default(), &path).await?;
            println!("Wrote {}", path.display());
        }
        ConfigCommands::Path => {
            let path = config_path.unwrap_or_else(config::config_path);
            println!("{}", path.display());
        }
        ConfigCommands::Show => {
            let mut config = load(config_path).await?;
            if let Some(openai) = config.openai.as_mut()
                && !openai.api_key.is_empty()
            {
                openai.api_key = "********".to_owned();
            }
            println!("{}", toml::to_string_pretty(&config)?);
        }
        ConfigCommands::Validate => {
            let config = load(config_path).await?;
            let issues = config.validate();
            if issues.is_empty() {
                println!("Configuration is valid.");
            }
            for issue in &issues {
                println!("{issue}");
            }
            if issues.iter().any(|i| i.level == IssueLevel::Error) {
                return Ok(ExitCode::FAILURE);
            }
        }
    }
    Ok(ExitCode::SUCCESS)
}

fn report_issues(config: &SequorConfig) {
    for issue in config.validate() {
        match issue.level {
            IssueLevel::Error => tracing::error!(path = %issue.path, "{}", issue.message),
            IssueLevel::Warning => tracing::warn!(path = %issue.path, "{}", issue.message),
        }
    }
}
