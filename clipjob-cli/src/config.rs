//! Configuration module
//!
//! Merges command-line overrides with the environment and builds the
//! orchestrator the commands run against.

use anyhow::{Context as _, Result};
use clipjob_client::ProviderClient;
use clipjob_orchestrator::{Config, FsArtifactStore, JobOrchestrator};
use std::path::PathBuf;
use std::sync::Arc;

/// Settings given on the command line; these win over the environment
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub api_token: Option<String>,
    pub provider_url: Option<String>,
    pub artifacts_root: Option<PathBuf>,
}

/// CLI context shared by every command
#[derive(Debug, Clone)]
pub struct Context {
    pub overrides: Overrides,
    /// Print JSON instead of human-readable output
    pub json: bool,
}

impl Context {
    /// Load and validate the orchestrator configuration
    pub fn config(&self) -> Result<Config> {
        let overrides = &self.overrides;
        let config = Config::from_lookup(|name| match name {
            "CLIPJOB_API_TOKEN" if overrides.api_token.is_some() => overrides.api_token.clone(),
            "CLIPJOB_PROVIDER_URL" if overrides.provider_url.is_some() => {
                overrides.provider_url.clone()
            }
            "CLIPJOB_ARTIFACTS_ROOT" if overrides.artifacts_root.is_some() => overrides
                .artifacts_root
                .as_ref()
                .map(|path| path.to_string_lossy().into_owned()),
            _ => std::env::var(name).ok(),
        })
        .context("Failed to load configuration")?;

        config.validate().context("Invalid configuration")?;
        Ok(config)
    }

    /// Build an orchestrator from the configuration
    pub fn orchestrator(&self, config: &Config) -> Result<JobOrchestrator> {
        let http = reqwest::Client::builder()
            .timeout(config.http_timeout)
            .build()
            .context("Failed to build HTTP client")?;

        let provider = ProviderClient::with_client(&config.provider_url, &config.api_token, http)
            .with_poll_interval(config.poll_interval);
        let store = FsArtifactStore::new(&config.artifacts_root);

        Ok(JobOrchestrator::new(
            Arc::new(provider),
            Arc::new(store),
            config.policy(),
        ))
    }
}
