// clamrest - REST bridge for the ClamAV daemon
// Main entry point

use anyhow::{Context, Result};
use clap::Parser;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clamrest::config::{load_config, Config};
use clamrest::scan::{Outcome, Scanner};
use clamrest::server::ScanServer;
use tracing_subscriber::prelude::*;

#[derive(Parser, Debug)]
#[command(name = "clamrest")]
#[command(about = "REST bridge for the ClamAV daemon", version)]
struct Args {
    /// Path to a TOML config file (default: <config dir>/clamrest/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Run mode (default: serve)
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Parser, Debug)]
enum Command {
    /// Wait for clamd, then run the HTTP server
    Serve,
    /// Check that clamd answers PING
    Ping,
    /// Print the clamd engine and database version
    Version,
    /// Print clamd statistics as JSON
    Stats,
    /// Stream a local file to clamd and print the verdict
    Scan {
        /// File to scan
        file: PathBuf,
    },
    /// Ask clamd to scan a path on its own filesystem
    ScanPath {
        /// Path as seen by clamd
        path: String,
    },
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let args = Args::parse();

    init_tracing();

    let config = load_config(args.config.as_deref())?;

    match args.command.unwrap_or(Command::Serve) {
        Command::Serve => run_serve(config).await,
        Command::Ping => run_ping(&config).await,
        Command::Version => run_version(&config).await,
        Command::Stats => run_stats(&config).await,
        Command::Scan { file } => run_scan(&config, &file).await,
        Command::ScanPath { path } => run_scan_path(&config, &path).await,
    }
}

fn init_tracing() {
    // Default: INFO level, overridable with RUST_LOG
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    // Logs go to stderr so command output on stdout stays machine readable
    let fmt_layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .init();
}

async fn run_serve(config: Config) -> Result<ExitCode> {
    tracing::info!(
        clamd = %config.clamd_address,
        listen = %config.listen,
        "Starting clamrest"
    );

    let gate = config.readiness_gate();
    let version = gate
        .wait(&config.client())
        .await
        .context("clamd never became ready")?;
    tracing::info!(version = %version, "clamd is ready");

    ScanServer::new(config)?.serve().await?;
    Ok(ExitCode::SUCCESS)
}

async fn run_ping(config: &Config) -> Result<ExitCode> {
    config.client().ping().await?;
    println!("PONG");
    Ok(ExitCode::SUCCESS)
}

async fn run_version(config: &Config) -> Result<ExitCode> {
    let version = config.client().version().await?;
    println!("{}", version);
    Ok(ExitCode::SUCCESS)
}

async fn run_stats(config: &Config) -> Result<ExitCode> {
    let stats = config.client().stats().await?;
    println!("{}", serde_json::to_string_pretty(&stats)?);
    Ok(ExitCode::SUCCESS)
}

async fn run_scan(config: &Config, file: &Path) -> Result<ExitCode> {
    let source = tokio::fs::File::open(file)
        .await
        .with_context(|| format!("Failed to open {}", file.display()))?;
    let filename = file
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| file.display().to_string());

    let verdict = Scanner::new(config.client())
        .scan_upload(&filename, source)
        .await?;

    match &verdict.result {
        Some(result) => println!("{}", serde_json::to_string_pretty(result)?),
        None => println!("clamd returned no verdict"),
    }

    Ok(match verdict.outcome {
        Outcome::Clean => ExitCode::SUCCESS,
        Outcome::Infected => ExitCode::from(1),
        _ => ExitCode::from(2),
    })
}

async fn run_scan_path(config: &Config, path: &str) -> Result<ExitCode> {
    let results = Scanner::new(config.client()).scan_path(path).await?;
    println!("{}", serde_json::to_string_pretty(&results)?);

    let infected = results.iter().any(|r| r.is_infected());
    Ok(if infected {
        ExitCode::from(1)
    } else {
        ExitCode::SUCCESS
    })
}
