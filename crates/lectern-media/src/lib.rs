//! Media helpers for the lecture pipeline.
//!
//! This crate provides:
//! - FFmpeg command building and execution
//! - Duration probing via FFprobe
//! - Ranged candidate-frame decoding
//! - OCR through the Tesseract CLI
//! - Representative frame selection

pub mod command;
pub mod decode;
pub mod error;
pub mod frames;
pub mod ocr;
pub mod probe;

pub use command::{check_ffmpeg, check_ffprobe, FfmpegCommand, FfmpegRunner};
pub use decode::{CandidateFrame, DecodedFrames, FfmpegFrameDecoder, FrameDecoder};
pub use error::{MediaError, MediaResult};
pub use frames::{
    FrameSelector, NoEmbedder, ScoreWeights, SelectedFrame, SelectionParams, TextEmbedder,
    DEFAULT_RELEVANCE_PROMPT,
};
pub use ocr::{NoTextExtractor, TesseractCli, TextExtractor};
pub use probe::{probe_duration_secs, DurationProbe, FfprobeDurationProbe};
