//! Per-candidate scoring signals.
//!
//! A candidate's score is a weighted sum of three signals:
//! - grayscale histogram entropy (0..8 bits)
//! - extracted text length, normalized by [`TEXT_LENGTH_NORM`]
//! - cosine similarity of the extracted text to a relevance prompt, clamped to 0..1
//!
//! Each signal contributes 0 when its capability is unavailable.

use async_trait::async_trait;
use image::DynamicImage;

use crate::error::MediaResult;

/// Prompt used for semantic relevance when the caller supplies none.
pub const DEFAULT_RELEVANCE_PROMPT: &str =
    "lecture slide key points equations definitions theorems summary topic headings";

/// Character count that maps to a text-density signal of 1.0.
pub const TEXT_LENGTH_NORM: f64 = 200.0;

/// Embeds text into a vector space for semantic comparison.
#[async_trait]
pub trait TextEmbedder: Send + Sync {
    /// `Ok(None)` means the embedder has no opinion (capability unavailable).
    async fn embed(&self, text: &str) -> MediaResult<Option<Vec<f32>>>;
}

/// Embedder used when no embedding model is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoEmbedder;

#[async_trait]
impl TextEmbedder for NoEmbedder {
    async fn embed(&self, _text: &str) -> MediaResult<Option<Vec<f32>>> {
        Ok(None)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoreWeights {
    pub entropy: f64,
    pub text_density: f64,
    pub semantic: f64,
}

impl Default for ScoreWeights {
    fn default() -> Self {
        Self {
            entropy: 0.55,
            text_density: 0.30,
            semantic: 0.15,
        }
    }
}

/// Raw signal values for one candidate.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SignalScores {
    pub entropy: f64,
    pub text_density: f64,
    pub semantic: f64,
}

impl SignalScores {
    pub fn combined(&self, weights: &ScoreWeights) -> f64 {
        weights.entropy * self.entropy
            + weights.text_density * self.text_density
            + weights.semantic * self.semantic
    }
}

/// Shannon entropy (log2, 256 bins) of the image's grayscale histogram.
pub fn grayscale_entropy(img: &DynamicImage) -> f64 {
    let gray = img.to_luma8();
    let mut hist = [0u64; 256];
    for pixel in gray.pixels() {
        hist[pixel.0[0] as usize] += 1;
    }

    let total: u64 = hist.iter().sum();
    if total == 0 {
        return 0.0;
    }
    let total = total as f64;

    hist.iter()
        .filter(|&&count| count > 0)
        .map(|&count| {
            let p = count as f64 / total;
            -p * p.log2()
        })
        .sum()
}

/// Trimmed character count divided by [`TEXT_LENGTH_NORM`].
pub fn text_density(text: &str) -> f64 {
    text.trim().chars().count() as f64 / TEXT_LENGTH_NORM
}

/// Cosine similarity; 0 for mismatched lengths or zero vectors.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let (mut dot, mut na, mut nb) = (0.0f64, 0.0f64, 0.0f64);
    for (x, y) in a.iter().zip(b) {
        let (x, y) = (*x as f64, *y as f64);
        dot += x * y;
        na += x * x;
        nb += y * y;
    }
    if na == 0.0 || nb == 0.0 {
        return 0.0;
    }
    dot / (na.sqrt() * nb.sqrt())
}

/// Semantic signal: similarity clamped into `[0, 1]`.
pub fn semantic_relevance(text_embedding: &[f32], prompt_embedding: &[f32]) -> f64 {
    cosine_similarity(text_embedding, prompt_embedding).clamp(0.0, 1.0)
}
