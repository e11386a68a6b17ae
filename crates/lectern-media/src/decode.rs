//! Ranged candidate-frame decoding.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tempfile::TempDir;
use tokio::fs;
use tracing::debug;

use crate::command::{FfmpegCommand, FfmpegRunner};
use crate::error::{MediaError, MediaResult};

/// A still image sampled from the source at a fixed rate.
#[derive(Debug, Clone, PartialEq)]
pub struct CandidateFrame {
    /// 0-based position in the sampled sequence
    pub ordinal: usize,
    /// Seconds from the start of the recording
    pub timestamp: f64,
    pub path: PathBuf,
}

/// Decoded candidates plus the scratch directory holding them.
///
/// The directory and its images are deleted when this value is dropped.
#[derive(Debug)]
pub struct DecodedFrames {
    frames: Vec<CandidateFrame>,
    _workdir: TempDir,
}

impl DecodedFrames {
    pub fn new(frames: Vec<CandidateFrame>, workdir: TempDir) -> Self {
        Self {
            frames,
            _workdir: workdir,
        }
    }

    pub fn frames(&self) -> &[CandidateFrame] {
        &self.frames
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}

/// Decodes `[t_start, t_end)` of a source at `fps` frames per second.
#[async_trait]
pub trait FrameDecoder: Send + Sync {
    async fn decode(
        &self,
        source: &Path,
        t_start: f64,
        t_end: f64,
        fps: f64,
    ) -> MediaResult<DecodedFrames>;
}

/// FFmpeg-backed decoder using input seeking, so only the range is decoded.
#[derive(Debug, Clone, Default)]
pub struct FfmpegFrameDecoder {
    runner: FfmpegRunner,
}

impl FfmpegFrameDecoder {
    pub fn new(runner: FfmpegRunner) -> Self {
        Self { runner }
    }
}

#[async_trait]
impl FrameDecoder for FfmpegFrameDecoder {
    async fn decode(
        &self,
        source: &Path,
        t_start: f64,
        t_end: f64,
        fps: f64,
    ) -> MediaResult<DecodedFrames> {
        if !(fps.is_finite() && fps > 0.0) {
            return Err(MediaError::invalid_argument(format!("candidate fps must be > 0, got {}", fps)));
        }
        if !source.exists() {
            return Err(MediaError::FileNotFound(source.to_path_buf()));
        }

        let workdir = tempfile::Builder::new().prefix("lectern-frames-").tempdir()?;
        let cmd = FfmpegCommand::new(source, workdir.path().join("%06d.png"))
            .seek(t_start)
            .until(t_end)
            .video_filter(format!("fps={}", fps))
            .quality(2);
        self.runner.run(&cmd).await?;

        let frames = collect_candidates(workdir.path(), t_start, fps).await?;
        debug!(
            "Decoded {} candidates for [{:.3}, {:.3}) at {} fps",
            frames.len(),
            t_start,
            t_end,
            fps
        );
        Ok(DecodedFrames::new(frames, workdir))
    }
}

/// List `NNNNNN.png` outputs in sequence order and assign timestamps.
///
/// FFmpeg numbers images from 1; candidate `i` (0-based) sits at
/// `t_start + i / fps`.
pub(crate) async fn collect_candidates(
    dir: &Path,
    t_start: f64,
    fps: f64,
) -> MediaResult<Vec<CandidateFrame>> {
    let mut numbered = Vec::new();
    let mut entries = fs::read_dir(dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) != Some("png") {
            continue;
        }
        let number = path
            .file_stem()
            .and_then(|s| s.to_str())
            .and_then(|s| s.parse::<usize>().ok());
        if let Some(n) = number.filter(|n| *n >= 1) {
            numbered.push((n, path));
        }
    }
    numbered.sort_by_key(|(n, _)| *n);

    Ok(numbered
        .into_iter()
        .map(|(n, path)| {
            let ordinal = n - 1;
            CandidateFrame {
                ordinal,
                timestamp: t_start + ordinal as f64 / fps,
                path,
            }
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_collect_candidates_orders_and_times() {
        let dir = TempDir::new().unwrap();
        for name in ["000010.png", "000002.png", "000001.png", "notes.txt", "x.png"] {
            fs::write(dir.path().join(name), b"").await.unwrap();
        }

        let frames = collect_candidates(dir.path(), 600.0, 2.0).await.unwrap();
        let got: Vec<(usize, f64)> = frames.iter().map(|f| (f.ordinal, f.timestamp)).collect();
        assert_eq!(got, vec![(0, 600.0), (1, 600.5), (9, 604.5)]);
    }

    #[tokio::test]
    async fn test_decode_rejects_bad_rate() {
        let err = FfmpegFrameDecoder::default()
            .decode(Path::new("in.mp4"), 0.0, 10.0, 0.0)
            .await
            .unwrap_err();
        assert!(matches!(err, MediaError::InvalidArgument(_)));
    }

    #[test]
    fn test_workdir_removed_on_drop() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().to_path_buf();
        let decoded = DecodedFrames::new(Vec::new(), dir);
        assert!(decoded.is_empty());
        drop(decoded);
        assert!(!path.exists());
    }
}
