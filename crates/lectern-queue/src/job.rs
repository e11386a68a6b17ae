//! Job messages handed to the dispatcher.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use lectern_models::VideoId;

/// Run the windowed pipeline for one uploaded video.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessVideoJob {
    pub video_id: VideoId,
    /// Uploaded master file
    pub source_path: PathBuf,
    pub submitted_at: DateTime<Utc>,
}

impl ProcessVideoJob {
    pub fn new(video_id: VideoId, source_path: impl Into<PathBuf>) -> Self {
        Self {
            video_id,
            source_path: source_path.into(),
            submitted_at: Utc::now(),
        }
    }

    /// Seconds this job has been waiting since submission.
    pub fn queued_secs(&self) -> f64 {
        (Utc::now() - self.submitted_at).num_milliseconds().max(0) as f64 / 1000.0
    }
}
