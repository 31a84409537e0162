//! vvctl - V&V automation CLI
//!
//! Drives the V&V REST API (SRS intake, test generation, runs, reports) and
//! provides the lint gate used before scripts are executed.

use clap::{Parser, Subcommand};
use std::time::Duration;

mod client;
mod commands;
mod output;

use commands::{lint, report, runs, scripts, srs, testcases};

/// V&V automation CLI
#[derive(Parser)]
#[command(name = "vvctl")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Backend base URL
    #[arg(
        long,
        env = "VV_API_URL",
        default_value = "http://localhost:3001",
        global = true
    )]
    api_url: String,

    /// Request timeout in seconds (runs block until pytest finishes)
    #[arg(long, default_value = "1900", global = true)]
    timeout_secs: u64,

    /// Output format
    #[arg(long, default_value = "table", global = true)]
    format: output::OutputFormat,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the linter; exits 1 when it reports problems
    Lint(lint::LintArgs),

    /// Manage SRS documents
    #[command(subcommand)]
    Srs(srs::SrsCommands),

    /// Generate and list test cases
    #[command(subcommand, name = "testcases")]
    TestCases(testcases::TestCaseCommands),

    /// Generate and list scripts
    #[command(subcommand)]
    Scripts(scripts::ScriptCommands),

    /// Execute scripts and inspect runs
    #[command(subcommand)]
    Runs(runs::RunCommands),

    /// Summary of the latest run
    Report,

    /// Check backend health
    Status,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let client = client::ApiClient::new(&cli.api_url, Duration::from_secs(cli.timeout_secs))?;

    match cli.command {
        // Runs locally; the backend is not contacted
        Commands::Lint(args) => std::process::exit(lint::execute(args)),
        Commands::Srs(cmd) => srs::execute(cmd, &client, cli.format).await?,
        Commands::TestCases(cmd) => testcases::execute(cmd, &client, cli.format).await?,
        Commands::Scripts(cmd) => scripts::execute(cmd, &client, cli.format).await?,
        Commands::Runs(cmd) => runs::execute(cmd, &client, cli.format).await?,
        Commands::Report => report::execute(&client, cli.format).await?,
        Commands::Status => {
            if client.health_check().await {
                println!("✅ Backend is healthy at {}", client.base_url());
            } else {
                println!("❌ Backend is not responding at {}", client.base_url());
                std::process::exit(1);
            }
        }
    }

    Ok(())
}
