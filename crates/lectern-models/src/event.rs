//! Progress event schema.
//!
//! Events are serialized as JSON objects tagged by `type` and pushed to
//! event-stream subscribers, one object per line.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::video::{VideoId, VideoStatus};

/// Event type names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    VideoStarted,
    WindowStarted,
    WindowTranscribed,
    WindowFrames,
    WindowDone,
    WindowFailed,
    VideoDone,
}

impl EventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::VideoStarted => "video_started",
            EventType::WindowStarted => "window_started",
            EventType::WindowTranscribed => "window_transcribed",
            EventType::WindowFrames => "window_frames",
            EventType::WindowDone => "window_done",
            EventType::WindowFailed => "window_failed",
            EventType::VideoDone => "video_done",
        }
    }
}

/// Pipeline progress event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PipelineEvent {
    /// Upload accepted and probed
    VideoStarted { id: VideoId, duration_sec: u64 },

    WindowStarted { index: u32 },

    WindowTranscribed { index: u32 },

    WindowFrames { index: u32 },

    WindowDone { index: u32, summary_ref: String },

    WindowFailed { index: u32, error: String },

    /// Every window attempted
    VideoDone { status: VideoStatus },
}

impl PipelineEvent {
    pub fn video_started(id: VideoId, duration_sec: u64) -> Self {
        PipelineEvent::VideoStarted { id, duration_sec }
    }

    pub fn window_started(index: u32) -> Self {
        PipelineEvent::WindowStarted { index }
    }

    pub fn window_transcribed(index: u32) -> Self {
        PipelineEvent::WindowTranscribed { index }
    }

    pub fn window_frames(index: u32) -> Self {
        PipelineEvent::WindowFrames { index }
    }

    pub fn window_done(index: u32, summary_ref: impl Into<String>) -> Self {
        PipelineEvent::WindowDone {
            index,
            summary_ref: summary_ref.into(),
        }
    }

    pub fn window_failed(index: u32, error: impl Into<String>) -> Self {
        PipelineEvent::WindowFailed {
            index,
            error: error.into(),
        }
    }

    pub fn video_done(status: VideoStatus) -> Self {
        PipelineEvent::VideoDone { status }
    }

    pub fn event_type(&self) -> EventType {
        match self {
            PipelineEvent::VideoStarted { .. } => EventType::VideoStarted,
            PipelineEvent::WindowStarted { .. } => EventType::WindowStarted,
            PipelineEvent::WindowTranscribed { .. } => EventType::WindowTranscribed,
            PipelineEvent::WindowFrames { .. } => EventType::WindowFrames,
            PipelineEvent::WindowDone { .. } => EventType::WindowDone,
            PipelineEvent::WindowFailed { .. } => EventType::WindowFailed,
            PipelineEvent::VideoDone { .. } => EventType::VideoDone,
        }
    }

    /// Window index for window-scoped events.
    pub fn window_index(&self) -> Option<u32> {
        match self {
            PipelineEvent::WindowStarted { index }
            | PipelineEvent::WindowTranscribed { index }
            | PipelineEvent::WindowFrames { index }
            | PipelineEvent::WindowDone { index, .. }
            | PipelineEvent::WindowFailed { index, .. } => Some(*index),
            PipelineEvent::VideoStarted { .. } | PipelineEvent::VideoDone { .. } => None,
        }
    }
}
