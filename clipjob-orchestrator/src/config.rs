//! Orchestrator configuration
//!
//! Defines the provider connection settings, the artifact root, and every
//! interval and budget the job lifecycle depends on.

use std::path::PathBuf;
use std::time::Duration;

use clipjob_client::DEFAULT_BASE_URL;

use crate::service::JobPolicy;

/// Orchestrator configuration
///
/// All timeouts and intervals are configurable to allow tuning for slow
/// models or flaky networks.
#[derive(Debug, Clone)]
pub struct Config {
    /// Bearer credential for the provider API
    pub api_token: String,

    /// Provider API root (e.g., "https://api.replicate.com/v1")
    pub provider_url: String,

    /// Directory holding one subdirectory per job
    pub artifacts_root: PathBuf,

    /// Pause between status checks while waiting
    pub poll_interval: Duration,

    /// Wait budget used when the caller gives none
    pub default_wait: Duration,

    /// Smallest wait budget a front end may request
    pub min_wait: Duration,

    /// Largest wait budget a front end may request
    pub max_wait: Duration,

    /// Age after which a still-running job is recorded as timed out
    pub job_deadline: Duration,

    /// Per-request HTTP timeout
    pub http_timeout: Duration,

    /// Age after which an abandoned materialization claim may be taken over
    pub claim_ttl: Duration,

    /// Measure resolution and duration of downloaded artifacts with ffprobe
    pub probe_media: bool,
}

impl Config {
    /// Creates a new configuration with defaults
    pub fn new(api_token: String, artifacts_root: PathBuf) -> Self {
        Self {
            api_token,
            provider_url: DEFAULT_BASE_URL.to_string(),
            artifacts_root,
            poll_interval: Duration::from_secs(2),
            default_wait: Duration::from_secs(30),
            min_wait: Duration::from_secs(5),
            max_wait: Duration::from_secs(60),
            job_deadline: Duration::from_secs(30 * 60),
            http_timeout: Duration::from_secs(60),
            claim_ttl: Duration::from_secs(10 * 60),
            probe_media: true,
        }
    }

    /// Creates configuration from environment variables
    ///
    /// Expected environment variables:
    /// - CLIPJOB_API_TOKEN or REPLICATE_API_TOKEN (required)
    /// - CLIPJOB_PROVIDER_URL (optional, default: https://api.replicate.com/v1)
    /// - CLIPJOB_ARTIFACTS_ROOT (optional, default: $HOME/.local/share/clipjob)
    /// - CLIPJOB_POLL_INTERVAL (optional, seconds, default: 2)
    /// - CLIPJOB_DEFAULT_WAIT (optional, seconds, default: 30)
    /// - CLIPJOB_MIN_WAIT (optional, seconds, default: 5)
    /// - CLIPJOB_MAX_WAIT (optional, seconds, default: 60)
    /// - CLIPJOB_JOB_DEADLINE (optional, seconds, default: 1800)
    /// - CLIPJOB_HTTP_TIMEOUT (optional, seconds, default: 60)
    /// - CLIPJOB_CLAIM_TTL (optional, seconds, default: 600)
    /// - CLIPJOB_PROBE_MEDIA (optional, true/false, default: true)
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Same as [`Config::from_env`], reading variables through `lookup`
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let api_token = lookup("CLIPJOB_API_TOKEN")
            .or_else(|| lookup("REPLICATE_API_TOKEN"))
            .filter(|token| !token.trim().is_empty())
            .ok_or_else(|| anyhow::anyhow!("CLIPJOB_API_TOKEN environment variable not set"))?;

        let artifacts_root = lookup("CLIPJOB_ARTIFACTS_ROOT")
            .map(PathBuf::from)
            .or_else(|| lookup("HOME").map(|home| PathBuf::from(home).join(".local/share/clipjob")))
            .unwrap_or_else(|| PathBuf::from("clipjob-artifacts"));

        let mut config = Self::new(api_token, artifacts_root);

        if let Some(url) = lookup("CLIPJOB_PROVIDER_URL") {
            config.provider_url = url;
        }

        let secs = |name: &str, default: Duration| {
            lookup(name)
                .and_then(|s| s.trim().parse::<u64>().ok())
                .map(Duration::from_secs)
                .unwrap_or(default)
        };

        config.poll_interval = secs("CLIPJOB_POLL_INTERVAL", config.poll_interval);
        config.default_wait = secs("CLIPJOB_DEFAULT_WAIT", config.default_wait);
        config.min_wait = secs("CLIPJOB_MIN_WAIT", config.min_wait);
        config.max_wait = secs("CLIPJOB_MAX_WAIT", config.max_wait);
        config.job_deadline = secs("CLIPJOB_JOB_DEADLINE", config.job_deadline);
        config.http_timeout = secs("CLIPJOB_HTTP_TIMEOUT", config.http_timeout);
        config.claim_ttl = secs("CLIPJOB_CLAIM_TTL", config.claim_ttl);

        config.probe_media = lookup("CLIPJOB_PROBE_MEDIA")
            .and_then(|s| s.trim().parse::<bool>().ok())
            .unwrap_or(config.probe_media);

        Ok(config)
    }

    /// Validates the configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.api_token.is_empty() {
            anyhow::bail!("api_token cannot be empty");
        }

        if !self.provider_url.starts_with("http://") && !self.provider_url.starts_with("https://")
        {
            anyhow::bail!("provider_url must start with http:// or https://");
        }

        if self.artifacts_root.as_os_str().is_empty() {
            anyhow::bail!("artifacts_root cannot be empty");
        }

        if self.poll_interval.is_zero() {
            anyhow::bail!("poll_interval must be greater than 0");
        }

        if self.http_timeout.is_zero() {
            anyhow::bail!("http_timeout must be greater than 0");
        }

        if self.min_wait > self.max_wait {
            anyhow::bail!("min_wait cannot exceed max_wait");
        }

        Ok(())
    }

    /// Clamps a requested wait budget into `[min_wait, max_wait]`
    pub fn clamp_wait(&self, requested: Option<Duration>) -> Duration {
        requested
            .unwrap_or(self.default_wait)
            .max(self.min_wait)
            .min(self.max_wait)
    }

    /// Lifecycle policy handed to the orchestrator
    pub fn policy(&self) -> JobPolicy {
        JobPolicy {
            job_deadline: self.job_deadline,
            claim_ttl: self.claim_ttl,
            probe_media: self.probe_media,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new(String::from("unset"), PathBuf::from("clipjob-artifacts"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.poll_interval, Duration::from_secs(2));
        assert_eq!(config.default_wait, Duration::from_secs(30));
        assert_eq!(config.provider_url, DEFAULT_BASE_URL);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_lookup_reads_overrides() {
        let config = Config::from_lookup(lookup(&[
            ("REPLICATE_API_TOKEN", "r8_abc"),
            ("HOME", "/home/me"),
            ("CLIPJOB_POLL_INTERVAL", "5"),
            ("CLIPJOB_MAX_WAIT", "not-a-number"),
            ("CLIPJOB_PROBE_MEDIA", "false"),
        ]))
        .unwrap();

        assert_eq!(config.api_token, "r8_abc");
        assert_eq!(config.artifacts_root, PathBuf::from("/home/me/.local/share/clipjob"));
        assert_eq!(config.poll_interval, Duration::from_secs(5));
        assert_eq!(config.max_wait, Duration::from_secs(60));
        assert!(!config.probe_media);
    }

    #[test]
    fn test_token_is_required() {
        assert!(Config::from_lookup(lookup(&[("HOME", "/home/me")])).is_err());
    }

    #[test]
    fn test_config_validation() {
        let mut config = Config::default();
        assert!(config.validate().is_ok());

        config.provider_url = "not-a-url".to_string();
        assert!(config.validate().is_err());
        config.provider_url = DEFAULT_BASE_URL.to_string();

        config.min_wait = Duration::from_secs(90);
        assert!(config.validate().is_err());
        config.min_wait = Duration::from_secs(5);

        config.poll_interval = Duration::ZERO;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_clamp_wait() {
        let config = Config::default();
        assert_eq!(config.clamp_wait(None), Duration::from_secs(30));
        assert_eq!(config.clamp_wait(Some(Duration::from_secs(1))), Duration::from_secs(5));
        assert_eq!(config.clamp_wait(Some(Duration::from_secs(600))), Duration::from_secs(60));
    }
}
