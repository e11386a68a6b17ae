//! Representative frame selection for one time window.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use futures_util::stream::{self, StreamExt};
use image::ImageFormat;
use rayon::prelude::*;
use tokio::fs;
use tracing::{debug, warn};

use super::scoring::{
    grayscale_entropy, semantic_relevance, text_density, NoEmbedder, ScoreWeights, SignalScores,
    TextEmbedder, DEFAULT_RELEVANCE_PROMPT,
};
use crate::decode::{CandidateFrame, FrameDecoder};
use crate::error::{MediaError, MediaResult};
use crate::ocr::{NoTextExtractor, TextExtractor};

/// Lower bound on the spacing between selected frames, in seconds.
pub const MIN_GAP_FLOOR_SECS: f64 = 5.0;

/// Concurrent OCR / embedding calls per selection.
const SIGNAL_CONCURRENCY: usize = 4;

/// Tunables for one selection.
#[derive(Debug, Clone, PartialEq)]
pub struct SelectionParams {
    /// Candidate sampling rate in frames per second
    pub candidate_fps: f64,
    /// Maximum frames to return
    pub top_k: usize,
    pub min_gap_factor: f64,
    /// Overrides [`DEFAULT_RELEVANCE_PROMPT`]
    pub relevance_prompt: Option<String>,
}

impl Default for SelectionParams {
    fn default() -> Self {
        Self {
            candidate_fps: 2.0,
            top_k: 6,
            min_gap_factor: 1.5,
            relevance_prompt: None,
        }
    }
}

impl SelectionParams {
    pub fn prompt(&self) -> &str {
        self.relevance_prompt
            .as_deref()
            .unwrap_or(DEFAULT_RELEVANCE_PROMPT)
    }
}

/// A frame chosen for a window, written to the output directory.
#[derive(Debug, Clone, PartialEq)]
pub struct SelectedFrame {
    /// Seconds from the start of the recording, rounded to milliseconds
    pub timestamp: f64,
    /// File name inside the output directory (`000.jpg`, ...)
    pub name: String,
    pub score: f64,
}

/// Minimum spacing: `max(5 s, window_len / (top_k * factor))`.
pub fn min_gap(window_len: f64, top_k: usize, factor: f64) -> f64 {
    let denom = top_k as f64 * factor;
    if denom <= 0.0 || !denom.is_finite() {
        return MIN_GAP_FLOOR_SECS;
    }
    (window_len / denom).max(MIN_GAP_FLOOR_SECS)
}

/// Greedy temporally-spaced top-k over `(timestamp, score)` pairs.
///
/// Candidates are visited by descending score (earlier timestamp first on
/// ties). A candidate strictly closer than `min_gap` to an accepted one is
/// skipped. Returns indices into `candidates`, in chronological order.
pub fn greedy_select(candidates: &[(f64, f64)], top_k: usize, min_gap: f64) -> Vec<usize> {
    let mut order: Vec<usize> = (0..candidates.len()).collect();
    order.sort_by(|&a, &b| {
        let (ta, sa) = candidates[a];
        let (tb, sb) = candidates[b];
        sb.total_cmp(&sa).then_with(|| ta.total_cmp(&tb))
    });

    let mut accepted: Vec<usize> = Vec::with_capacity(top_k);
    for i in order {
        if accepted.len() >= top_k {
            break;
        }
        let t = candidates[i].0;
        if accepted
            .iter()
            .any(|&j| (t - candidates[j].0).abs() < min_gap)
        {
            continue;
        }
        accepted.push(i);
    }

    accepted.sort_by(|&a, &b| candidates[a].0.total_cmp(&candidates[b].0));
    accepted
}

struct Scored {
    frame: CandidateFrame,
    score: f64,
}

/// Picks a few informative, well-spaced frames from a window.
#[derive(Clone)]
pub struct FrameSelector {
    decoder: Arc<dyn FrameDecoder>,
    extractor: Arc<dyn TextExtractor>,
    embedder: Arc<dyn TextEmbedder>,
    weights: ScoreWeights,
}

impl FrameSelector {
    /// Selector scoring on entropy only until other capabilities are attached.
    pub fn new(decoder: Arc<dyn FrameDecoder>) -> Self {
        Self {
            decoder,
            extractor: Arc::new(NoTextExtractor),
            embedder: Arc::new(NoEmbedder),
            weights: ScoreWeights::default(),
        }
    }

    pub fn with_text_extractor(mut self, extractor: Arc<dyn TextExtractor>) -> Self {
        self.extractor = extractor;
        self
    }

    pub fn with_embedder(mut self, embedder: Arc<dyn TextEmbedder>) -> Self {
        self.embedder = embedder;
        self
    }

    /// Select frames from `[t_start, t_end)` of `source` into `out_dir`.
    ///
    /// Returns frames in chronological order, saved as `000.jpg`, `001.jpg`, ...
    /// by chronological rank. No candidates yields an empty result.
    pub async fn select(
        &self,
        source: &Path,
        t_start: f64,
        t_end: f64,
        out_dir: &Path,
        params: &SelectionParams,
    ) -> MediaResult<Vec<SelectedFrame>> {
        if params.top_k == 0 {
            return Ok(Vec::new());
        }
        if !(params.candidate_fps.is_finite() && params.candidate_fps > 0.0) {
            return Err(MediaError::invalid_argument(format!(
                "candidate fps must be > 0, got {}",
                params.candidate_fps
            )));
        }

        let decoded = self
            .decoder
            .decode(source, t_start, t_end, params.candidate_fps)
            .await?;
        if decoded.is_empty() {
            debug!("No candidates in [{:.3}, {:.3})", t_start, t_end);
            return Ok(Vec::new());
        }

        let scored = self.score(decoded.frames(), params).await?;
        let pairs: Vec<(f64, f64)> = scored
            .iter()
            .map(|s| (s.frame.timestamp, s.score))
            .collect();
        let gap = min_gap(t_end - t_start, params.top_k, params.min_gap_factor);
        let keep = greedy_select(&pairs, params.top_k, gap);

        fs::create_dir_all(out_dir).await?;
        let mut selected = Vec::with_capacity(keep.len());
        for (rank, i) in keep.into_iter().enumerate() {
            let name = format!("{:03}.jpg", rank);
            save_jpeg(scored[i].frame.path.clone(), out_dir.join(&name)).await?;
            selected.push(SelectedFrame {
                timestamp: round_millis(scored[i].frame.timestamp),
                name,
                score: scored[i].score,
            });
        }

        debug!(
            "Selected {} of {} candidates in [{:.3}, {:.3}) (min gap {:.2}s)",
            selected.len(),
            scored.len(),
            t_start,
            t_end,
            gap
        );
        Ok(selected)
    }

    /// Score every readable candidate; unreadable images are skipped.
    async fn score(
        &self,
        frames: &[CandidateFrame],
        params: &SelectionParams,
    ) -> MediaResult<Vec<Scored>> {
        let entropies = entropies(frames.iter().map(|f| f.path.clone()).collect()).await?;
        let readable: Vec<(CandidateFrame, f64)> = frames
            .iter()
            .cloned()
            .zip(entropies)
            .filter_map(|(frame, entropy)| entropy.map(|e| (frame, e)))
            .collect();

        // OCR once per candidate; the text feeds both text signals
        let paths: Vec<PathBuf> = readable.iter().map(|(frame, _)| frame.path.clone()).collect();
        let texts: Vec<String> = stream::iter(paths)
            .map(|path| ocr_text(Arc::clone(&self.extractor), path))
            .buffered(SIGNAL_CONCURRENCY)
            .collect()
            .await;

        let semantic = self.semantic_scores(&texts, params.prompt()).await;

        Ok(readable
            .into_iter()
            .zip(texts.iter().zip(semantic))
            .map(|((frame, entropy), (text, semantic))| {
                let signals = SignalScores {
                    entropy,
                    text_density: text_density(text),
                    semantic,
                };
                Scored {
                    frame,
                    score: signals.combined(&self.weights),
                }
            })
            .collect())
    }

    /// Semantic signal per text; the prompt is embedded at most once.
    async fn semantic_scores(&self, texts: &[String], prompt: &str) -> Vec<f64> {
        if texts.iter().all(|t| t.trim().is_empty()) {
            return vec![0.0; texts.len()];
        }

        let prompt_embedding = match self.embedder.embed(prompt).await {
            Ok(Some(embedding)) => Arc::new(embedding),
            Ok(None) => return vec![0.0; texts.len()],
            Err(e) => {
                warn!("Prompt embedding failed, semantic signal disabled: {}", e);
                return vec![0.0; texts.len()];
            }
        };

        let trimmed: Vec<String> = texts.iter().map(|t| t.trim().to_string()).collect();
        stream::iter(trimmed)
            .map(|text| {
                relevance(
                    Arc::clone(&self.embedder),
                    text,
                    Arc::clone(&prompt_embedding),
                )
            })
            .buffered(SIGNAL_CONCURRENCY)
            .collect()
            .await
    }
}

async fn ocr_text(extractor: Arc<dyn TextExtractor>, path: PathBuf) -> String {
    match extractor.extract_text(&path).await {
        Ok(text) => text,
        Err(e) => {
            warn!("{} OCR failed for {}: {}", extractor.name(), path.display(), e);
            String::new()
        }
    }
}

async fn relevance(embedder: Arc<dyn TextEmbedder>, text: String, prompt: Arc<Vec<f32>>) -> f64 {
    if text.is_empty() {
        return 0.0;
    }
    match embedder.embed(&text).await {
        Ok(Some(embedding)) => semantic_relevance(&embedding, &prompt),
        Ok(None) => 0.0,
        Err(e) => {
            warn!("Text embedding failed: {}", e);
            0.0
        }
    }
}

impl std::fmt::Debug for FrameSelector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameSelector")
            .field("extractor", &self.extractor.name())
            .field("weights", &self.weights)
            .finish()
    }
}

/// Entropy for each image in parallel on the blocking pool; `None` if unreadable.
async fn entropies(paths: Vec<PathBuf>) -> MediaResult<Vec<Option<f64>>> {
    tokio::task::spawn_blocking(move || {
        paths
            .par_iter()
            .map(|path| match image::open(path) {
                Ok(img) => Some(grayscale_entropy(&img)),
                Err(e) => {
                    warn!("Skipping unreadable candidate {}: {}", path.display(), e);
                    None
                }
            })
            .collect::<Vec<_>>()
    })
    .await
    .map_err(|e| MediaError::internal(format!("entropy task failed: {}", e)))
}

async fn save_jpeg(src: PathBuf, dst: PathBuf) -> MediaResult<()> {
    tokio::task::spawn_blocking(move || -> MediaResult<()> {
        let img = image::open(&src)?;
        img.to_rgb8().save_with_format(&dst, ImageFormat::Jpeg)?;
        Ok(())
    })
    .await
    .map_err(|e| MediaError::internal(format!("jpeg task failed: {}", e)))?
}

fn round_millis(t: f64) -> f64 {
    (t * 1000.0).round() / 1000.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_min_gap() {
        assert!((min_gap(600.0, 6, 1.5) - 600.0 / 9.0).abs() < 1e-9);
        assert_eq!(min_gap(30.0, 6, 1.5), 5.0);
        assert_eq!(min_gap(600.0, 0, 1.5), 5.0);
    }

    #[test]
    fn test_greedy_select_spacing_and_order() {
        let candidates = [(10.0, 6.0), (12.0, 5.0), (30.0, 4.0), (50.0, 3.0), (0.0, 0.0)];
        assert_eq!(greedy_select(&candidates, 3, 13.0), vec![0, 2, 3]);
    }

    #[test]
    fn test_greedy_select_ties_prefer_earlier() {
        let candidates = [(20.0, 1.0), (10.0, 1.0), (40.0, 1.0)];
        assert_eq!(greedy_select(&candidates, 1, 5.0), vec![1]);
    }

    #[test]
    fn test_greedy_select_gap_boundary_is_inclusive() {
        // Exactly min_gap apart is allowed
        let candidates = [(0.0, 2.0), (5.0, 1.0)];
        assert_eq!(greedy_select(&candidates, 2, 5.0), vec![0, 1]);
        let candidates = [(0.0, 2.0), (4.999, 1.0)];
        assert_eq!(greedy_select(&candidates, 2, 5.0), vec![0]);
    }

    #[test]
    fn test_greedy_select_fewer_than_k() {
        let candidates = [(0.0, 1.0), (1.0, 2.0), (2.0, 3.0)];
        assert_eq!(greedy_select(&candidates, 6, 5.0), vec![2]);
        assert!(greedy_select(&[], 6, 5.0).is_empty());
    }

    #[test]
    fn test_greedy_select_properties() {
        // Deterministic pseudo-random scores
        let mut seed = 0x2545_f491_u64;
        let candidates: Vec<(f64, f64)> = (0..1200)
            .map(|i| {
                seed = seed.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
                (i as f64 * 0.5, (seed >> 33) as f64 / u32::MAX as f64)
            })
            .collect();

        for k in [1, 3, 6, 20] {
            let gap = min_gap(600.0, k, 1.5);
            let keep = greedy_select(&candidates, k, gap);
            assert!(keep.len() <= k);
            for pair in keep.windows(2) {
                let (a, b) = (candidates[pair[0]].0, candidates[pair[1]].0);
                assert!(a < b);
                assert!(b - a >= gap);
            }
        }
    }

    #[test]
    fn test_round_millis() {
        assert_eq!(round_millis(600.0 + 1.0 / 3.0), 600.333);
    }

    #[test]
    fn test_default_prompt() {
        let mut params = SelectionParams::default();
        assert_eq!(params.prompt(), DEFAULT_RELEVANCE_PROMPT);
        params.relevance_prompt = Some("graphs".into());
        assert_eq!(params.prompt(), "graphs");
    }
}
