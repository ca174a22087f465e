//! Artifact measurement with ffprobe
//!
//! Measuring is optional: when ffprobe is missing or fails, the job still
//! completes and snapshots fall back to the requested values.

use std::path::Path;
use tokio::process::Command;
use tracing::{debug, warn};

/// Measured properties of a video artifact
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MediaInfo {
    /// `WIDTHxHEIGHT` of the first video stream
    pub resolution: Option<String>,
    /// Container duration in seconds
    pub duration: Option<f64>,
}

/// Runs ffprobe against downloaded artifacts
#[derive(Debug, Clone)]
pub struct MediaProbe {
    program: String,
}

impl Default for MediaProbe {
    fn default() -> Self {
        Self::new("ffprobe")
    }
}

impl MediaProbe {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// Measures `path`; returns `None` when nothing could be measured
    pub async fn measure(&self, path: &Path) -> Option<MediaInfo> {
        let duration = self
            .run(&[
                "-v",
                "error",
                "-show_entries",
                "format=duration",
                "-of",
                "default=noprint_wrappers=1:nokey=1",
            ], path)
            .await
            .and_then(|out| parse_duration(&out));

        let resolution = self
            .run(&[
                "-v",
                "error",
                "-select_streams",
                "v:0",
                "-show_entries",
                "stream=width,height",
                "-of",
                "csv=s=x:p=0",
            ], path)
            .await
            .and_then(|out| parse_resolution(&out));

        if duration.is_none() && resolution.is_none() {
            return None;
        }
        debug!("Measured {}: {:?} {:?}", path.display(), resolution, duration);
        Some(MediaInfo {
            resolution,
            duration,
        })
    }

    async fn run(&self, args: &[&str], path: &Path) -> Option<String> {
        let output = match Command::new(&self.program).args(args).arg(path).output().await {
            Ok(output) => output,
            Err(e) => {
                debug!("{} unavailable, skipping measurement: {}", self.program, e);
                return None;
            }
        };
        if !output.status.success() {
            warn!(
                "{} failed on {}: {}",
                self.program,
                path.display(),
                String::from_utf8_lossy(&output.stderr).trim()
            );
            return None;
        }
        Some(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

/// Parses ffprobe's bare `format=duration` output
pub fn parse_duration(output: &str) -> Option<f64> {
    output
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|d| d.is_finite() && *d > 0.0)
}

/// Parses ffprobe's `WIDTHxHEIGHT` output
pub fn parse_resolution(output: &str) -> Option<String> {
    let line = output.lines().next()?.trim().trim_end_matches('x');
    let (width, height) = line.split_once('x')?;
    let width: u32 = width.parse().ok()?;
    let height: u32 = height.parse().ok()?;
    Some(format!("{}x{}", width, height))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_duration() {
        assert_eq!(parse_duration("5.062500\n"), Some(5.0625));
        assert_eq!(parse_duration("N/A"), None);
        assert_eq!(parse_duration("0"), None);
    }

    #[test]
    fn test_parse_resolution() {
        assert_eq!(parse_resolution("832x480\n").as_deref(), Some("832x480"));
        assert_eq!(parse_resolution("1920x1080x\n").as_deref(), Some("1920x1080"));
        assert_eq!(parse_resolution(""), None);
        assert_eq!(parse_resolution("garbage"), None);
    }

    #[tokio::test]
    async fn test_missing_program_measures_nothing() {
        let probe = MediaProbe::new("clipjob-no-such-ffprobe");
        assert_eq!(probe.measure(Path::new("video.mp4")).await, None);
    }
}
