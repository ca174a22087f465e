//! Clipjob CLI
//!
//! Command-line front end for generating videos on a remote provider:
//! submit a job, come back later with `continue`, and find the finished
//! artifact under the local artifact root.

mod commands;
mod config;
mod types;

use anyhow::Result;
use clap::Parser;
use commands::{Commands, handle_command};
use config::{Context, Overrides};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "clipjob")]
#[command(about = "Generate videos with a remote provider and track the jobs", long_about = None)]
struct Cli {
    /// Provider API token
    #[arg(long, env = "CLIPJOB_API_TOKEN", hide_env_values = true)]
    api_token: Option<String>,

    /// Provider API root
    #[arg(long, env = "CLIPJOB_PROVIDER_URL")]
    provider_url: Option<String>,

    /// Directory holding job records and artifacts
    #[arg(long, env = "CLIPJOB_ARTIFACTS_ROOT")]
    artifacts_root: Option<PathBuf>,

    /// Print machine-readable JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Logs go to stderr; stdout carries command output only
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "clipjob=info,clipjob_orchestrator=info,clipjob_client=info".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    let ctx = Context {
        overrides: Overrides {
            api_token: cli.api_token,
            provider_url: cli.provider_url,
            artifacts_root: cli.artifacts_root,
        },
        json: cli.json,
    };

    handle_command(cli.command, &ctx).await
}
