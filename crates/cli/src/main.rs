//! vipauto-verify - Main Entry Point
//!
//! Verifies that the Vip-Auto CRM login flow works end to end and leaves a
//! screenshot behind. Without a subcommand it runs the built-in login check.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

mod commands;
mod output;

use commands::{check, list, login, run};

/// Vip-Auto CRM login verification
#[derive(Parser)]
#[command(name = "vipauto-verify")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Base URL of the running application
    #[arg(long, env = "BASE_URL", global = true)]
    base_url: Option<String>,

    /// YAML configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Report format
    #[arg(long, default_value = "table", global = true)]
    format: output::OutputFormat,

    /// Log line format (logs go to stderr)
    #[arg(long, value_enum, default_value = "text", global = true)]
    log_format: LogFormat,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Log in through the browser and capture the dashboard (default)
    Login(login::LoginArgs),

    /// Run YAML scenarios
    Run(run::RunArgs),

    /// Only check that the base URL answers
    Check(check::CheckArgs),

    /// List scenarios in the specs directory
    List(list::ListArgs),
}

fn init_logging(verbose: bool, format: LogFormat) {
    let log_level = if verbose { "debug" } else { "info" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);

    match format {
        LogFormat::Text => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.log_format);

    let global = commands::GlobalArgs {
        base_url: cli.base_url,
        config: cli.config,
        format: cli.format,
    };

    let outcome = match cli.command.unwrap_or_default() {
        Commands::Login(args) => login::execute(args, &global).await,
        Commands::Run(args) => run::execute(args, &global).await,
        Commands::Check(args) => check::execute(args, &global).await,
        Commands::List(args) => list::execute(args, &global),
    };

    if let Err(e) = &outcome {
        output::print_error(&format!("{:#}", e));
    }
    std::process::exit(commands::exit_code(&outcome));
}

impl Default for Commands {
    fn default() -> Self {
        Commands::Login(login::LoginArgs::default())
    }
}
