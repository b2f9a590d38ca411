// repobar command line.
// Prints repository snapshots, cache maintenance and request diagnostics as JSON.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing_subscriber::EnvFilter;

use repobar::{Config, RepoBarError, RepoSync, Result};

#[derive(Debug, Parser)]
#[command(name = "repobar", version, about = "GitHub repository details with rate-limit aware caching")]
struct Cli {
    /// Config file (defaults to the platform config directory)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// GitHub token, overriding GITHUB_TOKEN and the config file
    #[arg(long, global = true)]
    token: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Print full snapshots for one or more repositories
    Show {
        /// Repositories as owner/name
        #[arg(required = true)]
        repos: Vec<String>,

        /// Also print request diagnostics after the snapshots
        #[arg(long)]
        diagnostics: bool,
    },
    /// Delete cached repository details and request state
    ClearCache,
    /// Print request diagnostics
    Diagnostics,
}

fn parse_repo(full_name: &str) -> Result<(&str, &str)> {
    match full_name.split_once('/') {
        Some((owner, name)) if !owner.is_empty() && !name.is_empty() && !name.contains('/') => {
            Ok((owner, name))
        }
        _ => Err(RepoBarError::Other(format!(
            "Invalid repository '{full_name}', expected owner/name"
        ))),
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

async fn run(cli: Cli) -> Result<()> {
    let mut config = Config::load(cli.config.as_deref())?;
    config.override_token(cli.token);
    let sync = RepoSync::from_config(&config)?;

    match cli.command {
        Command::Show { repos, diagnostics } => {
            config.require_token()?;
            let targets = repos
                .iter()
                .map(|r| parse_repo(r))
                .collect::<Result<Vec<_>>>()?;
            let snapshots = futures::future::join_all(
                targets
                    .iter()
                    .map(|(owner, name)| sync.full_repository(owner, name)),
            )
            .await;
            print_json(&snapshots)?;
            if diagnostics {
                print_json(&sync.diagnostics())?;
            }
        }
        Command::ClearCache => sync.clear_cache().await,
        Command::Diagnostics => print_json(&sync.diagnostics())?,
    }
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("repobar=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    match run(Cli::parse()).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}
