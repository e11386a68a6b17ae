//! ML service request/response types.

use serde::{Deserialize, Serialize};

use lectern_models::{FrameRef, TranscriptSegment};

/// Transcribe `[t_start, t_end)` of a local media file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscribeRequest {
    /// Path to the source media, readable by the service
    pub source_path: String,
    pub t_start: f64,
    pub t_end: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscribeResponse {
    #[serde(default)]
    pub segments: Vec<TranscriptSegment>,
}

/// Summarize one window from its transcript and selected frames.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SummarizeRequest {
    pub window_index: u32,
    pub t_start: f64,
    pub t_end: f64,
    pub transcript: Vec<TranscriptSegment>,
    pub frames: Vec<FrameRef>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SummarizeResponse {
    pub summary: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbedRequest {
    pub texts: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbedResponse {
    /// One vector per input text, in input order
    pub embeddings: Vec<Vec<f32>>,
}

/// Health check response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: Option<String>,
}
