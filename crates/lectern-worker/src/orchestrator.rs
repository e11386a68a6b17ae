//! Per-video windowed pipeline.
//!
//! Windows are processed one after another, each through transcribe, frame
//! selection and summarize. A stage failure marks only that window as failed;
//! a persistence failure aborts the run.

use std::fmt;
use std::num::NonZeroU64;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use metrics::{counter, histogram};
use thiserror::Error;
use tracing::{debug, info, warn, Instrument};

use lectern_media::{
    FfmpegFrameDecoder, FfmpegRunner, FrameSelector, SelectionParams, TesseractCli,
};
use lectern_ml_client::MlClient;
use lectern_models::{
    windows, FrameRef, Phase, PipelineEvent, VideoId, VideoStatus, Window, WindowBrief,
    WindowDocument, WindowProgress, DEFAULT_WINDOW_SECONDS,
};
use lectern_queue::EventBroker;
use lectern_storage::{StateStore, StorageError};

use crate::collaborators::{
    PlaceholderSummarizer, PlaceholderTranscriber, ServiceEmbedder, ServiceSummarizer,
    ServiceTranscriber, Summarizer, Transcriber, WindowContext,
};
use crate::config::WorkerConfig;
use crate::error::{WorkerError, WorkerResult};
use crate::logging::JobLogger;

pub const METRIC_WINDOWS_TOTAL: &str = "lectern_windows_total";
pub const METRIC_WINDOW_DURATION: &str = "lectern_window_duration_seconds";

/// Processing step applied to a window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Transcribe,
    Frames,
    Summarize,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Transcribe => "transcribe",
            Stage::Frames => "frames",
            Stage::Summarize => "summarize",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A stage that failed for one window.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{stage} failed: {message}")]
pub struct StageFailure {
    pub stage: Stage,
    pub message: String,
}

impl StageFailure {
    pub fn new(stage: Stage, message: impl Into<String>) -> Self {
        Self {
            stage,
            message: message.into(),
        }
    }
}

/// Outcome of a failed window.
#[derive(Debug, Error)]
pub enum WindowError {
    /// Recorded on the window; the run moves on
    #[error(transparent)]
    Stage(StageFailure),

    /// Aborts the run
    #[error(transparent)]
    Fatal(WorkerError),
}

impl From<StorageError> for WindowError {
    fn from(e: StorageError) -> Self {
        WindowError::Fatal(e.into())
    }
}

/// Drives one video through every window.
#[derive(Clone)]
pub struct VideoPipeline {
    store: StateStore,
    broker: EventBroker,
    transcriber: Arc<dyn Transcriber>,
    summarizer: Arc<dyn Summarizer>,
    frames: FrameSelector,
    frame_params: SelectionParams,
}

impl VideoPipeline {
    /// Pipeline with placeholder transcription and summarization.
    pub fn new(store: StateStore, broker: EventBroker, frames: FrameSelector) -> Self {
        Self {
            transcriber: Arc::new(PlaceholderTranscriber::new(store.clone())),
            summarizer: Arc::new(PlaceholderSummarizer::new(store.clone())),
            store,
            broker,
            frames,
            frame_params: SelectionParams::default(),
        }
    }

    /// Wire up the production capabilities.
    ///
    /// FFmpeg decodes candidates; Tesseract is used for OCR when enabled and
    /// installed. With an ML client, transcription, summarization and
    /// relevance embeddings go through the service; without one the
    /// placeholders are used.
    pub fn from_config(
        config: &WorkerConfig,
        store: StateStore,
        broker: EventBroker,
        ml: Option<MlClient>,
    ) -> Self {
        let mut runner = FfmpegRunner::new();
        if let Some(limit) = config.decode_timeout {
            runner = runner.with_timeout(limit);
        }
        let decoder = FfmpegFrameDecoder::new(runner);
        let mut frames = FrameSelector::new(Arc::new(decoder));

        if config.ocr_enabled {
            match TesseractCli::detect() {
                Ok(tesseract) => frames = frames.with_text_extractor(Arc::new(tesseract)),
                Err(e) => info!("OCR disabled: {}", e),
            }
        }

        let pipeline = match ml {
            Some(client) => {
                info!(url = client.base_url(), "Using ML service for transcription and summaries");
                frames = frames.with_embedder(Arc::new(ServiceEmbedder::new(client.clone())));
                Self::new(store.clone(), broker, frames)
                    .with_transcriber(Arc::new(ServiceTranscriber::new(client.clone(), store.clone())))
                    .with_summarizer(Arc::new(ServiceSummarizer::new(client, store)))
            }
            None => {
                info!("ML service not configured, using placeholder transcripts and summaries");
                Self::new(store, broker, frames)
            }
        };

        pipeline.with_frame_params(config.frames.clone())
    }

    pub fn with_transcriber(mut self, transcriber: Arc<dyn Transcriber>) -> Self {
        self.transcriber = transcriber;
        self
    }

    pub fn with_summarizer(mut self, summarizer: Arc<dyn Summarizer>) -> Self {
        self.summarizer = summarizer;
        self
    }

    pub fn with_frame_params(mut self, params: SelectionParams) -> Self {
        self.frame_params = params;
        self
    }

    pub fn store(&self) -> &StateStore {
        &self.store
    }

    /// Process every window of a video.
    ///
    /// Returns `Ok(None)` if the video document does not exist, otherwise the
    /// final status. Persistence failures abort the run and leave the video in
    /// `processing`.
    pub async fn run(&self, video_id: &VideoId, source: &Path) -> WorkerResult<Option<VideoStatus>> {
        let logger = JobLogger::new(video_id, "windowed_pipeline");
        let span = logger.create_span();

        async {
            let result = self.run_windows(&logger, video_id, source).await;
            if let Err(e) = &result {
                logger.log_error(&format!("run aborted, video left processing: {}", e));
            }
            result
        }
        .instrument(span)
        .await
    }

    async fn run_windows(
        &self,
        logger: &JobLogger,
        video_id: &VideoId,
        source: &Path,
    ) -> WorkerResult<Option<VideoStatus>> {
        let Some(mut video) = self.store.read_video(video_id).await? else {
            logger.log_warning("video document not found, nothing to do");
            return Ok(None);
        };

        video.set_status(VideoStatus::Processing);
        self.store.write_video(&video).await?;

        let window_seconds = if video.window_seconds == 0 {
            warn!(video_id = %video_id, "Video has no window length, using {}s", DEFAULT_WINDOW_SECONDS);
            DEFAULT_WINDOW_SECONDS
        } else {
            video.window_seconds
        };
        let step = NonZeroU64::new(window_seconds)
            .ok_or_else(|| WorkerError::processing_failed("window length must be positive"))?;

        let plan = windows(video.duration_sec, step);
        logger.log_start(&format!(
            "{} s in {} windows of {} s",
            video.duration_sec,
            plan.len(),
            window_seconds
        ));

        for window in plan {
            let doc = self.run_window(video_id, source, window).await?;

            // The stored document is authoritative; update it in place.
            let mut latest = self
                .store
                .read_video(video_id)
                .await?
                .ok_or_else(|| WorkerError::VideoMissing(video_id.clone()))?;
            latest.record_brief(WindowBrief::from(&doc));
            self.store.write_video(&latest).await?;
            video = latest;
        }

        let status = video.final_status();
        video.set_status(status);
        self.store.write_video(&video).await?;
        self.publish(video_id, PipelineEvent::video_done(status));

        logger.log_completion(&format!("status {}", status));
        Ok(Some(status))
    }

    /// Run all stages for one window and return its final document.
    async fn run_window(
        &self,
        video_id: &VideoId,
        source: &Path,
        window: Window,
    ) -> WorkerResult<WindowDocument> {
        let started = Instant::now();
        let mut doc = WindowDocument::start(video_id.clone(), &window);
        self.store.write_window(&doc).await?;
        self.publish(video_id, PipelineEvent::window_started(window.index));

        let ctx = WindowContext {
            video_id,
            source,
            window,
        };

        match self.run_stages(&ctx, &mut doc).await {
            Ok(()) => {
                info!(video_id = %video_id, index = window.index, "Window done");
            }
            Err(WindowError::Stage(failure)) => {
                warn!(
                    video_id = %video_id,
                    index = window.index,
                    stage = %failure.stage,
                    "Window failed: {}",
                    failure.message
                );
                let message = failure.to_string();
                doc.mark_failed(message.clone());
                self.store.write_window(&doc).await?;
                self.publish(video_id, PipelineEvent::window_failed(window.index, message));
            }
            Err(WindowError::Fatal(e)) => return Err(e),
        }

        counter!(METRIC_WINDOWS_TOTAL, "status" => doc.status.as_str()).increment(1);
        histogram!(METRIC_WINDOW_DURATION).record(started.elapsed().as_secs_f64());
        Ok(doc)
    }

    async fn run_stages(
        &self,
        ctx: &WindowContext<'_>,
        doc: &mut WindowDocument,
    ) -> Result<(), WindowError> {
        let layout = self.store.layout();
        let index = ctx.window.index;

        let transcript = self
            .transcriber
            .transcribe(ctx)
            .await
            .map_err(|e| WindowError::Stage(StageFailure::new(Stage::Transcribe, e.to_string())))?;
        doc.transcript_ref = Some(transcript.reference.clone());
        doc.set_progress(WindowProgress::completed(Phase::Transcribe));
        self.store.write_window(doc).await?;
        self.publish(ctx.video_id, PipelineEvent::window_transcribed(index));

        let selected = self
            .frames
            .select(
                ctx.source,
                ctx.window.t_start as f64,
                ctx.window.t_end as f64,
                &layout.frames_dir(ctx.video_id, index),
                &self.frame_params,
            )
            .await
            .map_err(|e| WindowError::Stage(StageFailure::new(Stage::Frames, e.to_string())))?;
        doc.frames = selected
            .iter()
            .map(|frame| FrameRef {
                t: frame.timestamp,
                uri: layout.frame_uri(ctx.video_id, index, &frame.name),
            })
            .collect();
        doc.set_progress(WindowProgress::completed(Phase::Frames));
        self.store.write_window(doc).await?;
        self.publish(ctx.video_id, PipelineEvent::window_frames(index));

        let summary_ref = self
            .summarizer
            .summarize(ctx, &doc.frames, &transcript)
            .await
            .map_err(|e| WindowError::Stage(StageFailure::new(Stage::Summarize, e.to_string())))?;
        doc.summary_ref = Some(summary_ref.clone());
        doc.mark_done();
        self.store.write_window(doc).await?;
        self.publish(ctx.video_id, PipelineEvent::window_done(index, summary_ref));

        Ok(())
    }

    fn publish(&self, video_id: &VideoId, event: PipelineEvent) {
        match self.broker.publish(video_id.as_str(), &event) {
            Ok(delivered) => debug!(
                video_id = %video_id,
                event = event.event_type().as_str(),
                delivered,
                "Published event"
            ),
            Err(e) => warn!(video_id = %video_id, "Failed to publish event: {}", e),
        }
    }
}

impl fmt::Debug for VideoPipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VideoPipeline")
            .field("store", &self.store)
            .field("transcriber", &self.transcriber.name())
            .field("summarizer", &self.summarizer.name())
            .field("frame_params", &self.frame_params)
            .finish_non_exhaustive()
    }
}
