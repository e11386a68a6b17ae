//! FFprobe duration probing.

use std::path::Path;
use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;

use crate::command::{check_ffprobe, stderr_tail};
use crate::error::{MediaError, MediaResult};

/// Container duration in whole seconds (fractional part truncated).
pub async fn probe_duration_secs(path: impl AsRef<Path>) -> MediaResult<u64> {
    let path = path.as_ref();

    if !path.exists() {
        return Err(MediaError::FileNotFound(path.to_path_buf()));
    }

    let ffprobe = check_ffprobe()?;

    let output = Command::new(ffprobe)
        .args([
            "-v",
            "error",
            "-show_entries",
            "format=duration",
            "-of",
            "default=noprint_wrappers=1:nokey=1",
        ])
        .arg(path)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .await?;

    if !output.status.success() {
        return Err(MediaError::ffprobe_failed(
            "FFprobe failed",
            Some(stderr_tail(&output.stderr)),
        ));
    }

    let duration = parse_duration_output(&String::from_utf8_lossy(&output.stdout))?;
    debug!("Probed {}: {}s", path.display(), duration);
    Ok(duration)
}

/// Reads the duration of an uploaded file.
#[async_trait]
pub trait DurationProbe: Send + Sync {
    async fn probe_duration(&self, path: &Path) -> MediaResult<u64>;
}

/// [`DurationProbe`] backed by the `ffprobe` binary.
#[derive(Debug, Clone, Copy, Default)]
pub struct FfprobeDurationProbe;

#[async_trait]
impl DurationProbe for FfprobeDurationProbe {
    async fn probe_duration(&self, path: &Path) -> MediaResult<u64> {
        probe_duration_secs(path).await
    }
}

/// Parse ffprobe's bare `format=duration` value.
pub fn parse_duration_output(stdout: &str) -> MediaResult<u64> {
    let raw = stdout.trim();
    let secs: f64 = raw
        .parse()
        .map_err(|_| MediaError::InvalidDuration(raw.to_string()))?;
    if !secs.is_finite() || secs < 0.0 {
        return Err(MediaError::InvalidDuration(raw.to_string()));
    }
    Ok(secs.trunc() as u64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_duration_truncates() {
        assert_eq!(parse_duration_output("1500.960000\n").unwrap(), 1500);
        assert_eq!(parse_duration_output("0.4").unwrap(), 0);
        assert_eq!(parse_duration_output("42").unwrap(), 42);
    }

    #[test]
    fn test_parse_duration_rejects_garbage() {
        for raw in ["N/A", "", "-3.0", "inf", "abc"] {
            assert!(
                matches!(parse_duration_output(raw), Err(MediaError::InvalidDuration(_))),
                "{raw:?} should be rejected"
            );
        }
    }

    #[tokio::test]
    async fn test_probe_missing_file() {
        let err = probe_duration_secs("/definitely/not/here.mp4").await.unwrap_err();
        assert!(matches!(err, MediaError::FileNotFound(_)));
    }
}
