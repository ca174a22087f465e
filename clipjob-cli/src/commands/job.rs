//! Job command handlers
//!
//! Handles submitting generation jobs, checking on them, cancelling them
//! and showing their stored state.

use anyhow::{Context as _, Result};
use clipjob_core::catalog::{self, VideoRequest};
use clipjob_core::domain::job::{InputParams, JobSpec, JobState};
use clipjob_core::dto::job::{JobSnapshot, SubmitReceipt};
use clipjob_orchestrator::service::media;
use clipjob_orchestrator::{JobOrchestrator, OrchestratorError};
use colored::*;
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::{Commands, GenerateOptions};
use crate::config::Context;

/// Handle job commands
///
/// Loads the configuration, builds the orchestrator and routes the command.
pub async fn handle_job_command(command: Commands, ctx: &Context) -> Result<()> {
    let config = ctx.config()?;
    let orchestrator = ctx.orchestrator(&config)?;
    debug!("Using artifact root {}", config.artifacts_root.display());

    match command {
        Commands::Submit { params, filename } => {
            let input: InputParams = params.into_iter().collect();
            let spec = JobSpec::from_flat(input)?.with_filename(filename);
            submit(&orchestrator, spec, ctx.json).await
        }
        Commands::TextToVideo { prompt, options } => {
            let request = video_request(prompt, options);
            let spec = catalog::shape_text_to_video(&request)?;
            submit(&orchestrator, spec, ctx.json).await
        }
        Commands::ImageToVideo {
            image,
            prompt,
            options,
        } => {
            let data_url = media::read_image_data_url(&image).await?;
            let request = video_request(prompt, options);
            let spec = catalog::shape_image_to_video(&request, &data_url)?
                .with_input_image(image.to_string_lossy());
            submit(&orchestrator, spec, ctx.json).await
        }
        Commands::Continue { id, wait } => {
            let wait = config.clamp_wait(wait.map(Duration::from_secs));
            continue_job(&orchestrator, &id, wait, ctx.json).await
        }
        Commands::Cancel { id } => {
            let snapshot = orchestrator.cancel(&id).await?;
            print_output(&snapshot, ctx.json, print_snapshot)
        }
        Commands::Show { id } => {
            let snapshot = orchestrator.snapshot(&id).await?;
            print_output(&snapshot, ctx.json, print_snapshot)
        }
        Commands::Models => super::models::list_models(ctx.json),
    }
}

fn video_request(prompt: String, options: GenerateOptions) -> VideoRequest {
    VideoRequest {
        prompt,
        model: options.model,
        resolution: options.resolution,
        aspect_ratio: options.aspect_ratio,
        negative_prompt: options.negative_prompt,
        duration: options.duration,
        filename: options.filename,
    }
}

/// Submit a job and print both identities
async fn submit(orchestrator: &JobOrchestrator, spec: JobSpec, json: bool) -> Result<()> {
    let receipt = match orchestrator.submit(spec).await {
        Ok(receipt) => receipt,
        Err(e) if e.is_billing() => {
            return Err(e).context("The provider refused the job for billing reasons");
        }
        Err(e) => return Err(e.into()),
    };

    print_output(&receipt, json, print_receipt)
}

/// Wait on a job for at most `wait`; Ctrl-C ends the wait early
async fn continue_job(
    orchestrator: &JobOrchestrator,
    id: &str,
    wait: Duration,
    json: bool,
) -> Result<()> {
    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    let watcher = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_interrupt.cancel();
        }
    });

    if !json {
        println!(
            "{}",
            format!("Checking job {} (waiting up to {}s)...", id, wait.as_secs()).dimmed()
        );
    }
    let result = orchestrator.continue_job(id, wait, &cancel).await;
    watcher.abort();

    match result {
        Ok(snapshot) => print_output(&snapshot, json, print_snapshot),
        Err(e @ OrchestratorError::Transient(_)) => {
            Err(e).context("Temporary provider problem; run `clipjob continue` again")
        }
        Err(e) => Err(e.into()),
    }
}

/// Print a value as JSON or with a human-readable printer
fn print_output<T: Serialize>(value: &T, json: bool, human: fn(&T)) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(value)?);
    } else {
        human(value);
    }
    Ok(())
}

/// Print a submission receipt
fn print_receipt(receipt: &SubmitReceipt) {
    println!("{}", "✓ Job submitted successfully!".green().bold());
    println!("  Local ID:  {}", receipt.local_id.as_str().cyan());
    println!("  Remote ID: {}", receipt.remote_id.dimmed());
    println!("  Status:    {}", colorize_state(receipt.status));
    println!();
    println!(
        "{}",
        format!("Run `clipjob continue {}` to check on it.", receipt.local_id).dimmed()
    );
}

/// Print detailed job information
fn print_snapshot(snapshot: &JobSnapshot) {
    println!("{}", "Job Details:".bold());
    println!("  Local ID:  {}", snapshot.local_id.as_str().cyan());
    println!("  Remote ID: {}", snapshot.remote_id.dimmed());
    println!("  Status:    {}", colorize_state(snapshot.status));

    if let Some(model) = &snapshot.model {
        println!("  Model:     {}", model);
    }
    if let Some(prompt) = &snapshot.prompt {
        println!("  Prompt:    {}", prompt);
    }

    if let Some(path) = &snapshot.result_path {
        println!("\n{}", "Result:".bold());
        println!("  File:      {}", path.display().to_string().green());
    }

    if let Some(metrics) = &snapshot.metrics {
        println!("  Size:      {}", format_size(metrics.size_bytes));
        if let Some(ms) = metrics.download_ms {
            println!("  Download:  {} ms", ms);
        }
        if let Some(secs) = metrics.generation_secs {
            println!("  Generated: {:.1}s", secs);
        }
        if let Some(resolution) = &metrics.resolution {
            println!("  Video:     {}", resolution);
        }
        if let Some(duration) = metrics.duration_secs {
            println!("  Duration:  {:.1}s", duration);
        }
    }

    if let Some(error) = &snapshot.error {
        println!("\n{}", "Error:".bold());
        println!("{}", error.red());
    }

    if snapshot.status.is_pending() {
        println!();
        println!(
            "{}",
            format!(
                "Still running. Run `clipjob continue {}` again later.",
                snapshot.local_id
            )
            .dimmed()
        );
    }

    if !snapshot.parameters.is_empty() {
        println!("\n{}", "Parameters:".bold());
        for (key, value) in &snapshot.parameters {
            println!("  {} = {}", key.cyan(), display_value(value));
        }
    }
}

/// Shorten inline image data so it does not flood the terminal
fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) if s.starts_with("data:") => {
            format!("<{} bytes of inline data>", s.len())
        }
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn format_size(bytes: u64) -> String {
    const MB: f64 = 1024.0 * 1024.0;
    if bytes as f64 >= MB {
        format!("{:.2} MB", bytes as f64 / MB)
    } else {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    }
}

/// Colorize job state for display
fn colorize_state(state: JobState) -> ColoredString {
    let label = state.as_str();
    match state {
        JobState::Submitted => label.yellow(),
        JobState::Processing => label.cyan(),
        JobState::Completed => label.green(),
        JobState::Failed => label.red(),
        JobState::Canceled => label.dimmed(),
        JobState::TimedOut => label.red(),
    }
}
