//! Video-level document models.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::window::{Window, WindowDocument, WindowStatus};

/// Prefix for generated video IDs.
pub const VIDEO_ID_PREFIX: &str = "v_";

/// Number of random hex characters after the prefix.
const VIDEO_ID_SUFFIX_LEN: usize = 8;

/// Unique identifier for an uploaded video.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct VideoId(pub String);

impl VideoId {
    /// Generate a new random video ID (`v_` + 8 hex characters).
    pub fn generate() -> Self {
        let hex = Uuid::new_v4().simple().to_string();
        Self(format!("{}{}", VIDEO_ID_PREFIX, &hex[..VIDEO_ID_SUFFIX_LEN]))
    }

    /// Get the inner string.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether this ID has the shape produced by [`VideoId::generate`].
    ///
    /// Only well-formed IDs are safe to join onto filesystem paths.
    pub fn is_well_formed(&self) -> bool {
        match self.0.strip_prefix(VIDEO_ID_PREFIX) {
            Some(suffix) => {
                suffix.len() == VIDEO_ID_SUFFIX_LEN
                    && suffix.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase())
            }
            None => false,
        }
    }
}

impl fmt::Display for VideoId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for VideoId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for VideoId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Video processing status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum VideoStatus {
    /// Windows are being processed
    #[default]
    Processing,
    /// Every window completed
    Done,
    /// All windows attempted, at least one failed
    DoneWithErrors,
}

impl VideoStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            VideoStatus::Processing => "processing",
            VideoStatus::Done => "done",
            VideoStatus::DoneWithErrors => "done_with_errors",
        }
    }
}

impl fmt::Display for VideoStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Status shown in the video-level window list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum BriefStatus {
    Processing,
    Done,
    Failed,
    /// Placeholder for a position that has not been reached yet
    Skipped,
}

impl From<WindowStatus> for BriefStatus {
    fn from(status: WindowStatus) -> Self {
        match status {
            WindowStatus::Processing => BriefStatus::Processing,
            WindowStatus::Done => BriefStatus::Done,
            WindowStatus::Failed => BriefStatus::Failed,
        }
    }
}

/// Compact per-window entry embedded in the video document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct WindowBrief {
    pub id: String,
    pub index: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub t_start: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub t_end: Option<u64>,
    pub status: BriefStatus,
}

impl WindowBrief {
    /// Placeholder for a window position that was not reached.
    pub fn skipped(index: u32) -> Self {
        Self {
            id: Window::id_for(index),
            index,
            t_start: None,
            t_end: None,
            status: BriefStatus::Skipped,
        }
    }
}

impl From<&WindowDocument> for WindowBrief {
    fn from(doc: &WindowDocument) -> Self {
        Self {
            id: doc.id.clone(),
            index: doc.index,
            t_start: Some(doc.t_start),
            t_end: Some(doc.t_end),
            status: doc.status.into(),
        }
    }
}

/// Video document persisted as `video.json`.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct VideoDocument {
    pub id: VideoId,

    /// Original upload filename
    pub filename: String,

    #[serde(default)]
    pub status: VideoStatus,

    /// Probed duration in whole seconds
    pub duration_sec: u64,

    /// Window length used for this video
    pub window_seconds: u64,

    /// Per-window briefs, position == window index
    #[serde(default)]
    pub windows: Vec<WindowBrief>,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,
}

impl VideoDocument {
    /// Create a fresh document for a just-uploaded video.
    pub fn new(
        id: VideoId,
        filename: impl Into<String>,
        duration_sec: u64,
        window_seconds: u64,
    ) -> Self {
        let now = Utc::now();
        Self {
            id,
            filename: filename.into(),
            status: VideoStatus::Processing,
            duration_sec,
            window_seconds,
            windows: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Set the brief at its index, padding unreached positions with `skipped`.
    pub fn record_brief(&mut self, brief: WindowBrief) {
        let index = brief.index as usize;
        while self.windows.len() < index {
            let pad = self.windows.len() as u32;
            self.windows.push(WindowBrief::skipped(pad));
        }
        if index < self.windows.len() {
            self.windows[index] = brief;
        } else {
            self.windows.push(brief);
        }
        self.touch();
    }

    /// Status once every window has been attempted.
    pub fn final_status(&self) -> VideoStatus {
        if self.windows.iter().any(|w| w.status == BriefStatus::Failed) {
            VideoStatus::DoneWithErrors
        } else {
            VideoStatus::Done
        }
    }

    /// Update the status and modification time.
    pub fn set_status(&mut self, status: VideoStatus) {
        self.status = status;
        self.touch();
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn brief(index: u32, status: BriefStatus) -> WindowBrief {
        WindowBrief {
            id: Window::id_for(index),
            index,
            t_start: Some(index as u64 * 600),
            t_end: Some(index as u64 * 600 + 600),
            status,
        }
    }

    #[test]
    fn test_video_id_generation() {
        let id1 = VideoId::generate();
        let id2 = VideoId::generate();
        assert_ne!(id1, id2);
        assert!(id1.as_str().starts_with("v_"));
        assert_eq!(id1.as_str().len(), 10);
        assert!(id1.is_well_formed());
    }

    #[test]
    fn test_video_id_rejects_path_like_input() {
        assert!(!VideoId::from("../etc").is_well_formed());
        assert!(!VideoId::from("v_1234").is_well_formed());
        assert!(!VideoId::from("v_ABCDEF12").is_well_formed());
        assert!(!VideoId::from("x_abcdef12").is_well_formed());
        assert!(VideoId::from("v_abcdef12").is_well_formed());
    }

    #[test]
    fn test_status_serialization() {
        let json = serde_json::to_string(&VideoStatus::DoneWithErrors).unwrap();
        assert_eq!(json, "\"done_with_errors\"");
    }

    #[test]
    fn test_record_brief_appends_in_order() {
        let mut doc = VideoDocument::new(VideoId::generate(), "lecture.mp4", 1500, 600);
        doc.record_brief(brief(0, BriefStatus::Done));
        doc.record_brief(brief(1, BriefStatus::Failed));
        assert_eq!(doc.windows.len(), 2);
        assert_eq!(doc.windows[1].status, BriefStatus::Failed);
    }

    #[test]
    fn test_record_brief_pads_gaps_with_skipped() {
        let mut doc = VideoDocument::new(VideoId::generate(), "lecture.mp4", 3000, 600);
        doc.record_brief(brief(3, BriefStatus::Done));

        assert_eq!(doc.windows.len(), 4);
        for (i, w) in doc.windows.iter().take(3).enumerate() {
            assert_eq!(w.index, i as u32);
            assert_eq!(w.status, BriefStatus::Skipped);
            assert_eq!(w.id, format!("w_{:03}", i));
            assert!(w.t_start.is_none());
        }

        // Later arrival overwrites the placeholder in place
        doc.record_brief(brief(1, BriefStatus::Done));
        assert_eq!(doc.windows.len(), 4);
        assert_eq!(doc.windows[1].status, BriefStatus::Done);
    }

    #[test]
    fn test_final_status() {
        let mut doc = VideoDocument::new(VideoId::generate(), "lecture.mp4", 1200, 600);
        assert_eq!(doc.final_status(), VideoStatus::Done);
        doc.record_brief(brief(0, BriefStatus::Done));
        assert_eq!(doc.final_status(), VideoStatus::Done);
        doc.record_brief(brief(1, BriefStatus::Failed));
        assert_eq!(doc.final_status(), VideoStatus::DoneWithErrors);
    }

    #[test]
    fn test_skipped_brief_omits_times() {
        let json = serde_json::to_value(WindowBrief::skipped(2)).unwrap();
        assert_eq!(json["status"], "skipped");
        assert_eq!(json["id"], "w_002");
        assert!(json.get("t_start").is_none());
    }
}
