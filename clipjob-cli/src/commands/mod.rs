//! Commands module
//!
//! Defines all CLI commands and their handlers.

mod job;
mod models;

use anyhow::Result;
use clap::Subcommand;
use serde_json::Value;
use std::path::PathBuf;

use crate::config::Context;
use crate::types::parse_param;

/// Options shared by the generation commands
#[derive(clap::Args, Debug, Clone)]
pub struct GenerateOptions {
    /// Model alias (see `clipjob models`)
    #[arg(short, long)]
    pub model: Option<String>,

    /// Output resolution (e.g., 480p, 720p, 1080p)
    #[arg(short, long)]
    pub resolution: Option<String>,

    /// Aspect ratio (e.g., 16:9, 9:16)
    #[arg(long)]
    pub aspect_ratio: Option<String>,

    /// What the video should not contain
    #[arg(long)]
    pub negative_prompt: Option<String>,

    /// Duration in seconds, for models that support it
    #[arg(short, long)]
    pub duration: Option<u32>,

    /// Artifact file name
    #[arg(short, long)]
    pub filename: Option<String>,
}

/// Top-level CLI commands
#[derive(Subcommand)]
pub enum Commands {
    /// Submit a job from raw provider parameters
    Submit {
        /// Parameters as key=value pairs; must include model=<alias or owner/name[:version]>
        #[arg(required = true, value_parser = parse_param)]
        params: Vec<(String, Value)>,

        /// Artifact file name
        #[arg(short, long)]
        filename: Option<String>,
    },
    /// Generate a video from a text prompt
    TextToVideo {
        /// Text prompt
        prompt: String,

        #[command(flatten)]
        options: GenerateOptions,
    },
    /// Generate a video from an image and a prompt
    ImageToVideo {
        /// Source image (jpg, png, webp or gif)
        image: PathBuf,

        /// Text prompt
        prompt: String,

        #[command(flatten)]
        options: GenerateOptions,
    },
    /// Check on a job, waiting a bounded time for it to finish
    Continue {
        /// Local id or remote id
        id: String,

        /// Seconds to wait before reporting the job as still processing
        #[arg(short, long)]
        wait: Option<u64>,
    },
    /// Cancel a job
    Cancel {
        /// Local id or remote id
        id: String,
    },
    /// Show the stored state of a job without contacting the provider
    Show {
        /// Local id or remote id
        id: String,
    },
    /// List the known video models
    Models,
}

/// Handle a CLI command
///
/// Routes the command to the appropriate handler module.
pub async fn handle_command(command: Commands, ctx: &Context) -> Result<()> {
    match command {
        Commands::Models => models::list_models(ctx.json),
        command => job::handle_job_command(command, ctx).await,
    }
}
