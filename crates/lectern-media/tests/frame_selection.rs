//! End-to-end frame selection against synthetic candidates.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use image::{DynamicImage, GrayImage, Luma};
use tempfile::TempDir;

use lectern_media::{
    CandidateFrame, DecodedFrames, FrameDecoder, FrameSelector, MediaError, MediaResult,
    SelectionParams, TextEmbedder, TextExtractor,
};

/// Decoder that renders one PNG per candidate; `levels[i]` distinct gray
/// values give candidate `i` an entropy of `log2(levels[i])`.
struct SyntheticDecoder {
    levels: HashMap<usize, u32>,
    calls: AtomicUsize,
}

impl SyntheticDecoder {
    fn new(levels: &[(usize, u32)]) -> Self {
        Self {
            levels: levels.iter().copied().collect(),
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl FrameDecoder for SyntheticDecoder {
    async fn decode(
        &self,
        _source: &Path,
        t_start: f64,
        t_end: f64,
        fps: f64,
    ) -> MediaResult<DecodedFrames> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let dir = TempDir::new()?;
        let count = ((t_end - t_start) * fps).ceil() as usize;
        let mut frames = Vec::with_capacity(count);
        for ordinal in 0..count {
            let levels = self.levels.get(&ordinal).copied().unwrap_or(1);
            let step = 256 / levels;
            let img = GrayImage::from_fn(64, 4, |x, _| Luma([((x % levels) * step) as u8]));
            let path = dir.path().join(format!("{:06}.png", ordinal + 1));
            DynamicImage::ImageLuma8(img).save(&path)?;
            frames.push(CandidateFrame {
                ordinal,
                timestamp: t_start + ordinal as f64 / fps,
                path,
            });
        }
        Ok(DecodedFrames::new(frames, dir))
    }
}

struct FailingDecoder;

#[async_trait]
impl FrameDecoder for FailingDecoder {
    async fn decode(&self, _: &Path, _: f64, _: f64, _: f64) -> MediaResult<DecodedFrames> {
        Err(MediaError::ffmpeg_failed("decode failed", None, Some(1)))
    }
}

/// Returns fixed text for chosen image file names.
struct FixedText(HashMap<String, String>);

#[async_trait]
impl TextExtractor for FixedText {
    fn name(&self) -> &'static str {
        "fixed"
    }

    async fn extract_text(&self, image: &Path) -> MediaResult<String> {
        let name = image.file_name().unwrap().to_string_lossy().into_owned();
        Ok(self.0.get(&name).cloned().unwrap_or_default())
    }
}

/// Embeds "lecture"-ish text along one axis and everything else along another.
struct AxisEmbedder {
    calls: AtomicUsize,
    prompt_calls: AtomicUsize,
}

#[async_trait]
impl TextEmbedder for AxisEmbedder {
    async fn embed(&self, text: &str) -> MediaResult<Option<Vec<f32>>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if text == "theorems" {
            self.prompt_calls.fetch_add(1, Ordering::SeqCst);
        }
        if text.contains("theorem") {
            Ok(Some(vec![1.0, 0.0]))
        } else {
            Ok(Some(vec![0.0, 1.0]))
        }
    }
}

fn params(fps: f64, top_k: usize) -> SelectionParams {
    SelectionParams {
        candidate_fps: fps,
        top_k,
        ..SelectionParams::default()
    }
}

fn names(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

#[tokio::test]
async fn selects_high_entropy_frames_with_spacing() {
    let out = TempDir::new().unwrap();
    // 60 candidates at 1 fps; min gap = max(5, 60 / (3 * 1.5)) = 13.33s
    let decoder = Arc::new(SyntheticDecoder::new(&[(10, 64), (12, 32), (30, 16), (50, 8)]));
    let selector = FrameSelector::new(decoder);

    let frames = selector
        .select(Path::new("lecture.mp4"), 0.0, 60.0, out.path(), &params(1.0, 3))
        .await
        .unwrap();

    let times: Vec<f64> = frames.iter().map(|f| f.timestamp).collect();
    assert_eq!(times, vec![10.0, 30.0, 50.0]);
    let frame_names: Vec<&str> = frames.iter().map(|f| f.name.as_str()).collect();
    assert_eq!(frame_names, vec!["000.jpg", "001.jpg", "002.jpg"]);
    assert_eq!(names(out.path()), vec!["000.jpg", "001.jpg", "002.jpg"]);
    assert!((frames[0].score - 0.55 * 6.0).abs() < 1e-9);

    // Written files are decodable JPEGs
    let img = image::open(out.path().join("000.jpg")).unwrap();
    assert_eq!((img.width(), img.height()), (64, 4));
}

#[tokio::test]
async fn timestamps_are_offset_by_window_start() {
    let out = TempDir::new().unwrap();
    let decoder = Arc::new(SyntheticDecoder::new(&[(3, 64)]));
    let selector = FrameSelector::new(decoder);

    let frames = selector
        .select(Path::new("lecture.mp4"), 600.0, 630.0, out.path(), &params(3.0, 1))
        .await
        .unwrap();
    assert_eq!(frames.len(), 1);
    assert_eq!(frames[0].timestamp, 601.0);
}

#[tokio::test]
async fn zero_k_skips_decoding() {
    let out = TempDir::new().unwrap();
    let decoder = Arc::new(SyntheticDecoder::new(&[]));
    let selector = FrameSelector::new(decoder.clone());

    let frames = selector
        .select(Path::new("lecture.mp4"), 0.0, 60.0, out.path(), &params(1.0, 0))
        .await
        .unwrap();
    assert!(frames.is_empty());
    assert_eq!(decoder.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn empty_window_yields_no_frames() {
    let out = TempDir::new().unwrap();
    let selector = FrameSelector::new(Arc::new(SyntheticDecoder::new(&[])));

    let frames = selector
        .select(Path::new("lecture.mp4"), 0.0, 0.0, out.path(), &params(2.0, 6))
        .await
        .unwrap();
    assert!(frames.is_empty());
}

#[tokio::test]
async fn decode_failure_is_an_error() {
    let out = TempDir::new().unwrap();
    let selector = FrameSelector::new(Arc::new(FailingDecoder));
    let err = selector
        .select(Path::new("lecture.mp4"), 0.0, 60.0, out.path(), &params(2.0, 6))
        .await
        .unwrap_err();
    assert!(matches!(err, MediaError::FfmpegFailed { .. }));
}

#[tokio::test]
async fn text_signals_break_entropy_ties() {
    let out = TempDir::new().unwrap();
    // All candidates flat (entropy 0); only text differs
    let decoder = Arc::new(SyntheticDecoder::new(&[]));
    let text: HashMap<String, String> = [
        ("000021.png".to_string(), "x".repeat(100)),
        ("000041.png".to_string(), "theorem 1".to_string()),
    ]
    .into_iter()
    .collect();
    let embedder = Arc::new(AxisEmbedder {
        calls: AtomicUsize::new(0),
        prompt_calls: AtomicUsize::new(0),
    });
    let selector = FrameSelector::new(decoder)
        .with_text_extractor(Arc::new(FixedText(text)))
        .with_embedder(embedder.clone());

    let mut p = params(1.0, 2);
    p.relevance_prompt = Some("theorems".to_string());
    let frames = selector
        .select(Path::new("lecture.mp4"), 0.0, 60.0, out.path(), &p)
        .await
        .unwrap();

    let times: Vec<f64> = frames.iter().map(|f| f.timestamp).collect();
    assert_eq!(times, vec![20.0, 40.0]);
    // 100 chars -> 0.30 * 0.5
    assert!((frames[0].score - 0.15).abs() < 1e-9);
    // 9 chars -> 0.30 * 9/200, plus full semantic match 0.15
    assert!((frames[1].score - (0.30 * 9.0 / 200.0 + 0.15)).abs() < 1e-9);

    // Prompt embedded once; only non-empty texts embedded
    assert_eq!(embedder.prompt_calls.load(Ordering::SeqCst), 1);
    assert_eq!(embedder.calls.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn never_returns_more_than_k_and_respects_gap() {
    let out = TempDir::new().unwrap();
    let levels: Vec<(usize, u32)> = (0..120).map(|i| (i, [1u32, 2, 4, 8, 16, 32, 64][i % 7])).collect();
    let selector = FrameSelector::new(Arc::new(SyntheticDecoder::new(&levels)));

    let frames = selector
        .select(Path::new("lecture.mp4"), 0.0, 60.0, out.path(), &params(2.0, 6))
        .await
        .unwrap();

    assert!(frames.len() <= 6);
    for pair in frames.windows(2) {
        assert!(pair[1].timestamp - pair[0].timestamp >= 60.0 / 9.0);
    }
    let produced: Vec<PathBuf> = frames.iter().map(|f| out.path().join(&f.name)).collect();
    assert!(produced.iter().all(|p| p.exists()));
}
