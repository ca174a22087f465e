//! Model catalog listing

use anyhow::Result;
use clipjob_core::catalog::{self, ModelKind};
use colored::*;

/// Print every catalog model
pub fn list_models(json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(catalog::MODELS)?);
        return Ok(());
    }

    println!("{}", format!("{} model(s):", catalog::MODELS.len()).bold());
    println!();
    for model in catalog::MODELS {
        println!("  {} {}", "▸".cyan(), model.alias.bold());
        println!("    Name:       {}", model.name);
        println!("    Provider:   {}", model.id.dimmed());
        println!("    Supports:   {}", describe_kind(model.kind));
        println!("    Resolution: {}", model.default_resolution);
        if model.max_duration > 0 {
            println!("    Duration:   up to {}s", model.max_duration);
        }
        if !model.features.is_empty() {
            println!("    Features:   {}", model.features.join(", ").dimmed());
        }
        println!();
    }

    Ok(())
}

fn describe_kind(kind: ModelKind) -> &'static str {
    match kind {
        ModelKind::TextToVideo => "text-to-video",
        ModelKind::ImageToVideo => "image-to-video",
        ModelKind::Both => "text-to-video, image-to-video",
    }
}
