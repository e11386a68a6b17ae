//! Time windows and window-level documents.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::num::NonZeroU64;

use crate::video::VideoId;

/// Window length used when none is configured.
pub const DEFAULT_WINDOW_SECONDS: u64 = 600;

/// A fixed-length slice `[t_start, t_end)` of the source recording, in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
pub struct Window {
    pub index: u32,
    pub t_start: u64,
    pub t_end: u64,
}

impl Window {
    /// Document ID for a window index (`w_000`, `w_001`, ...).
    pub fn id_for(index: u32) -> String {
        format!("w_{:03}", index)
    }

    pub fn id(&self) -> String {
        Self::id_for(self.index)
    }
}

impl fmt::Display for Window {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{} [{}s, {}s)", self.index, self.t_start, self.t_end)
    }
}

/// Lazy iterator over the windows partitioning `[0, duration)`.
#[derive(Debug, Clone)]
pub struct Windows {
    duration: u64,
    step: u64,
    next_index: u32,
}

impl Iterator for Windows {
    type Item = Window;

    fn next(&mut self) -> Option<Window> {
        let t_start = u64::from(self.next_index).checked_mul(self.step)?;
        if t_start >= self.duration {
            return None;
        }
        let t_end = t_start.saturating_add(self.step).min(self.duration);
        let window = Window {
            index: self.next_index,
            t_start,
            t_end,
        };
        self.next_index += 1;
        Some(window)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let total = self.duration.div_ceil(self.step);
        let remaining = total.saturating_sub(u64::from(self.next_index)) as usize;
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for Windows {}

/// Partition `[0, duration)` into consecutive windows of `step` seconds.
///
/// The last window is shorter when `duration` is not a multiple of `step`.
/// A zero duration yields no windows.
pub fn windows(duration: u64, step: NonZeroU64) -> Windows {
    Windows {
        duration,
        step: step.get(),
        next_index: 0,
    }
}

/// Processing status of a single window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum WindowStatus {
    #[default]
    Processing,
    Done,
    Failed,
}

impl WindowStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            WindowStatus::Processing => "processing",
            WindowStatus::Done => "done",
            WindowStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for WindowStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Last stage a window reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    #[default]
    Start,
    Transcribe,
    Frames,
    Summarize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema, Default)]
pub struct WindowProgress {
    pub phase: Phase,
    /// 0-100
    pub percent: u8,
}

impl WindowProgress {
    pub fn new(phase: Phase, percent: u8) -> Self {
        Self {
            phase,
            percent: percent.min(100),
        }
    }

    /// Stage finished.
    pub fn completed(phase: Phase) -> Self {
        Self::new(phase, 100)
    }
}

/// Public reference to a selected frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct FrameRef {
    /// Timestamp in seconds from the start of the recording
    pub t: f64,
    pub uri: String,
}

/// One timed span of transcript text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct TranscriptSegment {
    pub t_start: f64,
    pub t_end: f64,
    pub text: String,
}

/// Window document persisted as `windows/<index>.json`.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct WindowDocument {
    pub id: String,
    pub video_id: VideoId,
    pub index: u32,
    pub t_start: u64,
    pub t_end: u64,
    #[serde(default)]
    pub status: WindowStatus,
    #[serde(default)]
    pub progress: WindowProgress,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transcript_ref: Option<String>,
    #[serde(default)]
    pub frames: Vec<FrameRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary_ref: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl WindowDocument {
    /// Fresh document for a window that is about to be processed.
    pub fn start(video_id: VideoId, window: &Window) -> Self {
        Self {
            id: window.id(),
            video_id,
            index: window.index,
            t_start: window.t_start,
            t_end: window.t_end,
            status: WindowStatus::Processing,
            progress: WindowProgress::new(Phase::Start, 0),
            transcript_ref: None,
            frames: Vec::new(),
            summary_ref: None,
            error: None,
            updated_at: Utc::now(),
        }
    }

    pub fn set_progress(&mut self, progress: WindowProgress) {
        self.progress = progress;
        self.updated_at = Utc::now();
    }

    pub fn mark_done(&mut self) {
        self.status = WindowStatus::Done;
        self.set_progress(WindowProgress::completed(Phase::Summarize));
    }

    /// Record a stage failure; progress keeps the last phase reached.
    pub fn mark_failed(&mut self, error: impl Into<String>) {
        self.status = WindowStatus::Failed;
        self.error = Some(error.into());
        self.updated_at = Utc::now();
    }
}
