//! Transcription and summarization capabilities.
//!
//! Both come in two flavours: placeholders that always work and write fixed
//! artifacts, and adapters over the external ML service.

use std::path::Path;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use lectern_media::{MediaError, MediaResult, TextEmbedder};
use lectern_ml_client::MlClient;
use lectern_models::{FrameRef, TranscriptSegment, VideoId, Window};
use lectern_storage::StateStore;

use crate::error::WorkerResult;

/// Text of the placeholder transcript segment.
pub const PLACEHOLDER_TRANSCRIPT_TEXT: &str = "(transcript placeholder)";

/// The window being processed.
#[derive(Debug, Clone, Copy)]
pub struct WindowContext<'a> {
    pub video_id: &'a VideoId,
    pub source: &'a Path,
    pub window: Window,
}

/// Transcript artifact, `transcripts/<index>.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptArtifact {
    pub segments: Vec<TranscriptSegment>,
}

/// Summary artifact, `summaries/<index>.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryArtifact {
    pub summary: String,
    pub frames: Vec<FrameRef>,
    pub transcript_ref: Option<String>,
}

/// Result of the transcription stage.
#[derive(Debug, Clone, PartialEq)]
pub struct TranscriptOutput {
    /// Public locator of the transcript artifact
    pub reference: String,
    pub segments: Vec<TranscriptSegment>,
}

#[async_trait]
pub trait Transcriber: Send + Sync {
    fn name(&self) -> &'static str;

    /// Transcribe the window and persist the transcript artifact.
    async fn transcribe(&self, ctx: &WindowContext<'_>) -> WorkerResult<TranscriptOutput>;
}

#[async_trait]
pub trait Summarizer: Send + Sync {
    fn name(&self) -> &'static str;

    /// Summarize the window and persist the summary artifact; returns its locator.
    async fn summarize(
        &self,
        ctx: &WindowContext<'_>,
        frames: &[FrameRef],
        transcript: &TranscriptOutput,
    ) -> WorkerResult<String>;
}

async fn write_transcript(
    store: &StateStore,
    ctx: &WindowContext<'_>,
    segments: Vec<TranscriptSegment>,
) -> WorkerResult<TranscriptOutput> {
    let layout = store.layout();
    let index = ctx.window.index;
    let artifact = TranscriptArtifact { segments };
    store
        .write_artifact(&layout.transcript_path(ctx.video_id, index), &artifact)
        .await?;
    Ok(TranscriptOutput {
        reference: layout.transcript_uri(ctx.video_id, index),
        segments: artifact.segments,
    })
}

async fn write_summary(
    store: &StateStore,
    ctx: &WindowContext<'_>,
    summary: String,
    frames: &[FrameRef],
    transcript: &TranscriptOutput,
) -> WorkerResult<String> {
    let layout = store.layout();
    let index = ctx.window.index;
    let artifact = SummaryArtifact {
        summary,
        frames: frames.to_vec(),
        transcript_ref: Some(transcript.reference.clone()),
    };
    store
        .write_artifact(&layout.summary_path(ctx.video_id, index), &artifact)
        .await?;
    Ok(layout.summary_uri(ctx.video_id, index))
}

/// Writes a single placeholder segment spanning the window.
#[derive(Debug, Clone)]
pub struct PlaceholderTranscriber {
    store: StateStore,
}

impl PlaceholderTranscriber {
    pub fn new(store: StateStore) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Transcriber for PlaceholderTranscriber {
    fn name(&self) -> &'static str {
        "placeholder"
    }

    async fn transcribe(&self, ctx: &WindowContext<'_>) -> WorkerResult<TranscriptOutput> {
        let segment = TranscriptSegment {
            t_start: ctx.window.t_start as f64,
            t_end: ctx.window.t_end as f64,
            text: PLACEHOLDER_TRANSCRIPT_TEXT.to_string(),
        };
        write_transcript(&self.store, ctx, vec![segment]).await
    }
}

/// Writes a fixed summary naming the window's time range.
#[derive(Debug, Clone)]
pub struct PlaceholderSummarizer {
    store: StateStore,
}

impl PlaceholderSummarizer {
    pub fn new(store: StateStore) -> Self {
        Self { store }
    }

    pub fn summary_text(window: &Window) -> String {
        format!(
            "Summary for {}\u{2013}{} s (placeholder).",
            window.t_start, window.t_end
        )
    }
}

#[async_trait]
impl Summarizer for PlaceholderSummarizer {
    fn name(&self) -> &'static str {
        "placeholder"
    }

    async fn summarize(
        &self,
        ctx: &WindowContext<'_>,
        frames: &[FrameRef],
        transcript: &TranscriptOutput,
    ) -> WorkerResult<String> {
        let text = Self::summary_text(&ctx.window);
        write_summary(&self.store, ctx, text, frames, transcript).await
    }
}

/// Transcription through the ML service.
#[derive(Debug, Clone)]
pub struct ServiceTranscriber {
    client: MlClient,
    store: StateStore,
}

impl ServiceTranscriber {
    pub fn new(client: MlClient, store: StateStore) -> Self {
        Self { client, store }
    }
}

#[async_trait]
impl Transcriber for ServiceTranscriber {
    fn name(&self) -> &'static str {
        "ml-service"
    }

    async fn transcribe(&self, ctx: &WindowContext<'_>) -> WorkerResult<TranscriptOutput> {
        let segments = self
            .client
            .transcribe(
                &ctx.source.to_string_lossy(),
                ctx.window.t_start as f64,
                ctx.window.t_end as f64,
            )
            .await?;
        debug!(
            video_id = %ctx.video_id,
            index = ctx.window.index,
            "Received {} transcript segments",
            segments.len()
        );
        write_transcript(&self.store, ctx, segments).await
    }
}

/// Summarization through the ML service.
#[derive(Debug, Clone)]
pub struct ServiceSummarizer {
    client: MlClient,
    store: StateStore,
}

impl ServiceSummarizer {
    pub fn new(client: MlClient, store: StateStore) -> Self {
        Self { client, store }
    }
}

#[async_trait]
impl Summarizer for ServiceSummarizer {
    fn name(&self) -> &'static str {
        "ml-service"
    }

    async fn summarize(
        &self,
        ctx: &WindowContext<'_>,
        frames: &[FrameRef],
        transcript: &TranscriptOutput,
    ) -> WorkerResult<String> {
        let text = self
            .client
            .summarize(
                ctx.window.index,
                ctx.window.t_start as f64,
                ctx.window.t_end as f64,
                transcript.segments.clone(),
                frames.to_vec(),
            )
            .await?;
        write_summary(&self.store, ctx, text, frames, transcript).await
    }
}

/// Text embeddings from the ML service, for frame relevance scoring.
#[derive(Debug, Clone)]
pub struct ServiceEmbedder {
    client: MlClient,
}

impl ServiceEmbedder {
    pub fn new(client: MlClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl TextEmbedder for ServiceEmbedder {
    async fn embed(&self, text: &str) -> MediaResult<Option<Vec<f32>>> {
        self.client
            .embed_one(text)
            .await
            .map(Some)
            .map_err(|e| MediaError::embedding_failed(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lectern_storage::{read_json, MediaLayout};
    use tempfile::TempDir;

    fn ctx<'a>(id: &'a VideoId, source: &'a Path) -> WindowContext<'a> {
        WindowContext {
            video_id: id,
            source,
            window: Window {
                index: 1,
                t_start: 600,
                t_end: 1200,
            },
        }
    }

    #[test]
    fn test_placeholder_summary_text() {
        let w = Window {
            index: 2,
            t_start: 1200,
            t_end: 1500,
        };
        assert_eq!(
            PlaceholderSummarizer::summary_text(&w),
            "Summary for 1200\u{2013}1500 s (placeholder)."
        );
    }

    #[tokio::test]
    async fn test_placeholder_artifacts() {
        let dir = TempDir::new().unwrap();
        let store = StateStore::new(MediaLayout::new(dir.path(), "/media"));
        let id = VideoId::from("v_0123abcd");
        let source = dir.path().join("master.mp4");
        let ctx = ctx(&id, &source);

        let transcript = PlaceholderTranscriber::new(store.clone())
            .transcribe(&ctx)
            .await
            .unwrap();
        assert_eq!(transcript.reference, "/media/videos/v_0123abcd/transcripts/1.json");

        let on_disk: TranscriptArtifact = read_json(&store.layout().transcript_path(&id, 1))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(on_disk.segments.len(), 1);
        assert_eq!(on_disk.segments[0].text, PLACEHOLDER_TRANSCRIPT_TEXT);
        assert_eq!(on_disk.segments[0].t_start, 600.0);

        let frames = vec![FrameRef {
            t: 612.5,
            uri: "/media/videos/v_0123abcd/frames/1/000.jpg".to_string(),
        }];
        let summary_ref = PlaceholderSummarizer::new(store.clone())
            .summarize(&ctx, &frames, &transcript)
            .await
            .unwrap();
        assert_eq!(summary_ref, "/media/videos/v_0123abcd/summaries/1.json");

        let summary: SummaryArtifact = read_json(&store.layout().summary_path(&id, 1))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(summary.summary, "Summary for 600\u{2013}1200 s (placeholder).");
        assert_eq!(summary.frames, frames);
        assert_eq!(summary.transcript_ref.as_deref(), Some(transcript.reference.as_str()));
    }
}
