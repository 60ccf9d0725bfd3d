//! mediaplan - command line interface for media plan files
//!
//! - Migrate a plan to another schema version
//! - Validate a plan against its schema
//! - Upgrade every plan in a workspace
//! - Inspect, set and select metric formulas

use clap::{Parser, Subcommand};
use mediaplan_workspace::{LoggingConfig, ToolkitConfig};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;
mod output;

use commands::{formula, migrate, upgrade, validate, Context};
use output::{print_error, OutputFormat};

/// mediaplan CLI application
#[derive(Parser)]
#[command(name = "mediaplan")]
#[command(about = "Media plan schema migration and metric formula toolkit", long_about = None)]
#[command(version)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, env = "MEDIAPLAN_CONFIG")]
    config: Option<String>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "text")]
    output: OutputFormat,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Available commands
#[derive(Subcommand)]
enum Commands {
    /// Migrate a plan file to another schema version
    Migrate(migrate::MigrateArgs),

    /// Validate a plan file
    Validate(validate::ValidateArgs),

    /// Upgrade every plan in the workspace to the current schema
    Upgrade(upgrade::UpgradeArgs),

    /// Metric formulas
    Formula {
        #[command(subcommand)]
        command: formula::FormulaCommands,
    },

    /// Show the effective configuration
    Config,
}

fn init_tracing(logging: &LoggingConfig, verbose: bool) {
    let default = if verbose { "debug" } else { logging.level.as_str() };
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| default.into());

    if logging.json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .without_time()
                    .with_writer(std::io::stderr),
            )
            .init();
    }
}

fn run(cli: Cli, config: ToolkitConfig) -> anyhow::Result<()> {
    let ctx = Context {
        config,
        format: cli.output,
    };

    match cli.command {
        Commands::Migrate(args) => migrate::execute(args, &ctx),
        Commands::Validate(args) => validate::execute(args, &ctx),
        Commands::Upgrade(args) => upgrade::execute(args, &ctx),
        Commands::Formula { command } => formula::execute(command, &ctx),
        Commands::Config => output::print_json(&ctx.config),
    }
}

fn main() {
    let cli = Cli::parse();

    let config = match ToolkitConfig::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            print_error(&format!("failed to load configuration: {e}"));
            std::process::exit(2);
        }
    };
    init_tracing(&config.logging, cli.verbose);

    if let Err(e) = run(cli, config) {
        print_error(&format!("{e:#}"));
        std::process::exit(1);
    }
}
