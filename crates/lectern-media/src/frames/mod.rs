//! Frame selection: multi-signal scoring plus temporal deduplication.

pub mod scoring;
pub mod selector;

pub use scoring::{
    cosine_similarity, grayscale_entropy, text_density, NoEmbedder, ScoreWeights, SignalScores,
    TextEmbedder, DEFAULT_RELEVANCE_PROMPT, TEXT_LENGTH_NORM,
};
pub use selector::{
    greedy_select, min_gap, FrameSelector, SelectedFrame, SelectionParams, MIN_GAP_FLOOR_SECS,
};
