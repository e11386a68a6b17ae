//! Windowed lecture pipeline.
//!
//! This crate provides:
//! - The per-video orchestrator that walks a recording window by window
//! - Transcription and summarization capabilities with placeholder defaults
//! - A fixed-size job dispatcher with explicit admission control

pub mod collaborators;
pub mod config;
pub mod error;
pub mod executor;
pub mod logging;
pub mod orchestrator;

pub use collaborators::{
    PlaceholderSummarizer, PlaceholderTranscriber, ServiceEmbedder, ServiceSummarizer,
    ServiceTranscriber, SummaryArtifact, Summarizer, TranscriptArtifact, TranscriptOutput,
    Transcriber, WindowContext, PLACEHOLDER_TRANSCRIPT_TEXT,
};
pub use config::{AdmissionPolicy, WorkerConfig};
pub use error::{WorkerError, WorkerResult};
pub use executor::{JobDispatcher, PipelineRunner};
pub use logging::JobLogger;
pub use orchestrator::{Stage, StageFailure, VideoPipeline, WindowError};
