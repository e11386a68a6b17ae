//! FFmpeg command builder and runner.

use std::path::{Path, PathBuf};
use std::process::{Output, Stdio};
use std::time::Duration;
use tokio::process::{Child, Command};
use tracing::{debug, warn};

use crate::error::{MediaError, MediaResult};

/// How much of stderr to keep in error messages.
const STDERR_TAIL_BYTES: usize = 2048;

/// Builder for FFmpeg commands.
#[derive(Debug, Clone)]
pub struct FfmpegCommand {
    /// Input file path
    input: PathBuf,
    /// Output file path or pattern
    output: PathBuf,
    /// Input arguments (before -i)
    input_args: Vec<String>,
    /// Output arguments (after -i)
    output_args: Vec<String>,
    /// Whether to overwrite output
    overwrite: bool,
    /// Log level
    log_level: String,
}

impl FfmpegCommand {
    /// Create a new FFmpeg command.
    pub fn new(input: impl AsRef<Path>, output: impl AsRef<Path>) -> Self {
        Self {
            input: input.as_ref().to_path_buf(),
            output: output.as_ref().to_path_buf(),
            input_args: Vec::new(),
            output_args: Vec::new(),
            overwrite: true,
            log_level: "error".to_string(),
        }
    }

    /// Add input arguments (before -i).
    pub fn input_arg(mut self, arg: impl Into<String>) -> Self {
        self.input_args.push(arg.into());
        self
    }

    /// Add output arguments (after -i).
    pub fn output_arg(mut self, arg: impl Into<String>) -> Self {
        self.output_args.push(arg.into());
        self
    }

    /// Seek the input to `seconds` before decoding.
    pub fn seek(self, seconds: f64) -> Self {
        self.input_arg("-ss").input_arg(format!("{:.3}", seconds))
    }

    /// Stop reading the input at `seconds`.
    pub fn until(self, seconds: f64) -> Self {
        self.input_arg("-to").input_arg(format!("{:.3}", seconds))
    }

    /// Set video filter.
    pub fn video_filter(self, filter: impl Into<String>) -> Self {
        self.output_arg("-vf").output_arg(filter)
    }

    /// Image quality for image2 outputs (2 is near-lossless).
    pub fn quality(self, q: u8) -> Self {
        self.output_arg("-q:v").output_arg(q.to_string())
    }

    /// Set log level.
    pub fn log_level(mut self, level: impl Into<String>) -> Self {
        self.log_level = level.into();
        self
    }

    /// Build the command arguments.
    pub fn build_args(&self) -> Vec<String> {
        let mut args = Vec::new();

        if self.overwrite {
            args.push("-y".to_string());
        }

        args.push("-v".to_string());
        args.push(self.log_level.clone());

        args.extend(self.input_args.clone());

        args.push("-i".to_string());
        args.push(self.input.to_string_lossy().to_string());

        args.extend(self.output_args.clone());

        args.push(self.output.to_string_lossy().to_string());

        args
    }
}

/// Runs FFmpeg commands, capturing stderr for diagnostics.
#[derive(Debug, Clone, Default)]
pub struct FfmpegRunner {
    timeout: Option<Duration>,
}

impl FfmpegRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Kill the process if it runs longer than `limit`.
    pub fn with_timeout(mut self, limit: Duration) -> Self {
        self.timeout = Some(limit);
        self
    }

    /// Run an FFmpeg command to completion.
    pub async fn run(&self, cmd: &FfmpegCommand) -> MediaResult<()> {
        let ffmpeg = check_ffmpeg()?;

        let args = cmd.build_args();
        debug!("Running FFmpeg: ffmpeg {}", args.join(" "));

        let child = Command::new(ffmpeg)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        let output = wait_bounded(child, self.timeout).await?;

        if output.status.success() {
            Ok(())
        } else {
            Err(MediaError::ffmpeg_failed(
                "FFmpeg exited with non-zero status",
                Some(stderr_tail(&output.stderr)),
                output.status.code(),
            ))
        }
    }
}

/// Wait for `child`, killing it once `limit` elapses.
///
/// The child must have been spawned with `kill_on_drop(true)`.
async fn wait_bounded(child: Child, limit: Option<Duration>) -> MediaResult<Output> {
    let Some(limit) = limit else {
        return Ok(child.wait_with_output().await?);
    };
    match tokio::time::timeout(limit, child.wait_with_output()).await {
        Ok(result) => Ok(result?),
        Err(_) => {
            // Dropping the future drops the child, which kills it
            warn!("FFmpeg timed out after {:?}", limit);
            Err(MediaError::Timeout(limit.as_secs()))
        }
    }
}

/// Last few KB of a process's stderr, lossily decoded.
pub(crate) fn stderr_tail(stderr: &[u8]) -> String {
    let start = stderr.len().saturating_sub(STDERR_TAIL_BYTES);
    String::from_utf8_lossy(&stderr[start..]).trim().to_string()
}

/// Check if FFmpeg is available.
pub fn check_ffmpeg() -> MediaResult<PathBuf> {
    which::which("ffmpeg").map_err(|_| MediaError::FfmpegNotFound)
}

/// Check if FFprobe is available.
pub fn check_ffprobe() -> MediaResult<PathBuf> {
    which::which("ffprobe").map_err(|_| MediaError::FfprobeNotFound)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ranged_decode_args() {
        let cmd = FfmpegCommand::new("master.mp4", "/tmp/x/%06d.png")
            .seek(600.0)
            .until(1200.0)
            .video_filter("fps=2")
            .quality(2);

        assert_eq!(
            cmd.build_args(),
            vec![
                "-y", "-v", "error", "-ss", "600.000", "-to", "1200.000", "-i", "master.mp4",
                "-vf", "fps=2", "-q:v", "2", "/tmp/x/%06d.png",
            ]
        );
    }

    #[test]
    fn test_log_level_override() {
        let args = FfmpegCommand::new("a", "b").log_level("warning").build_args();
        assert_eq!(&args[1..3], &["-v".to_string(), "warning".to_string()]);
    }

    #[test]
    fn test_stderr_tail_truncates_from_the_front() {
        let long = vec![b'a'; STDERR_TAIL_BYTES + 10];
        assert_eq!(stderr_tail(&long).len(), STDERR_TAIL_BYTES);
        assert_eq!(stderr_tail(b"  boom\n"), "boom");
    }

    #[cfg(unix)]
    fn sleeper(secs: &str) -> Child {
        Command::new("sleep")
            .arg(secs)
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .unwrap()
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_wait_bounded_kills_hung_process() {
        let started = std::time::Instant::now();
        let result = wait_bounded(sleeper("30"), Some(Duration::from_millis(100))).await;
        assert!(matches!(result, Err(MediaError::Timeout(_))));
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_wait_bounded_returns_output_in_time() {
        let output = wait_bounded(sleeper("0"), Some(Duration::from_secs(5)))
            .await
            .unwrap();
        assert!(output.status.success());

        let unbounded = wait_bounded(sleeper("0"), None).await.unwrap();
        assert!(unbounded.status.success());
    }
}
