//! Shared data models for the lectern pipeline.
//!
//! This crate provides Serde-serializable types for:
//! - Video and window documents
//! - The windower that partitions a recording into fixed-length windows
//! - Progress event schemas

pub mod event;
pub mod video;
pub mod window;

// Re-export common types
pub use event::{EventType, PipelineEvent};
pub use video::{BriefStatus, VideoDocument, VideoId, VideoStatus, WindowBrief};
pub use window::{
    windows, FrameRef, Phase, TranscriptSegment, Window, WindowDocument, WindowProgress,
    WindowStatus, Windows, DEFAULT_WINDOW_SECONDS,
};
