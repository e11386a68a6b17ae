//! Worker configuration.

use std::time::Duration;

use lectern_media::SelectionParams;

use crate::error::{WorkerError, WorkerResult};

/// Per-window decode limit in seconds.
const DEFAULT_DECODE_TIMEOUT_SECS: u64 = 600;

/// What `submit` does once every worker is busy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AdmissionPolicy {
    /// Queue without limit
    #[default]
    Unbounded,
    /// Fail fast once `max_queued` jobs are waiting
    Reject { max_queued: usize },
    /// Wait for a queue slot once `max_queued` jobs are waiting
    Block { max_queued: usize },
}

impl AdmissionPolicy {
    /// Parse `unbounded`, `reject` or `block`.
    pub fn parse(kind: &str, max_queued: usize) -> WorkerResult<Self> {
        match kind.trim().to_ascii_lowercase().as_str() {
            "unbounded" | "" => Ok(Self::Unbounded),
            "reject" => Ok(Self::Reject { max_queued }),
            "block" => Ok(Self::Block { max_queued }),
            other => Err(WorkerError::config_error(format!(
                "unknown admission policy '{}'",
                other
            ))),
        }
    }

    /// Queue limit, if any.
    pub fn max_queued(&self) -> Option<usize> {
        match self {
            Self::Unbounded => None,
            Self::Reject { max_queued } | Self::Block { max_queued } => Some(*max_queued),
        }
    }
}

/// Worker configuration.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Maximum concurrent pipeline runs
    pub max_concurrent_jobs: usize,
    pub admission: AdmissionPolicy,
    /// Graceful shutdown timeout
    pub shutdown_timeout: Duration,
    /// Frame selection tunables
    pub frames: SelectionParams,
    /// Use Tesseract for OCR when it is installed
    pub ocr_enabled: bool,
    /// Kill a ranged decode that runs longer than this; `None` waits forever
    pub decode_timeout: Option<Duration>,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            max_concurrent_jobs: 2,
            admission: AdmissionPolicy::Unbounded,
            shutdown_timeout: Duration::from_secs(30),
            frames: SelectionParams::default(),
            ocr_enabled: true,
            decode_timeout: Some(Duration::from_secs(DEFAULT_DECODE_TIMEOUT_SECS)),
        }
    }
}

impl WorkerConfig {
    /// Create config from environment variables.
    pub fn from_env() -> WorkerResult<Self> {
        let defaults = Self::default();
        let max_queued = env_parse("WORKER_MAX_QUEUED", 16);
        let admission = match std::env::var("WORKER_ADMISSION") {
            Ok(kind) => AdmissionPolicy::parse(&kind, max_queued)?,
            Err(_) => defaults.admission,
        };

        Ok(Self {
            max_concurrent_jobs: env_parse("WORKER_MAX_JOBS", defaults.max_concurrent_jobs).max(1),
            admission,
            shutdown_timeout: Duration::from_secs(env_parse("WORKER_SHUTDOWN_TIMEOUT", 30)),
            frames: SelectionParams {
                candidate_fps: env_parse("FRAME_CANDIDATE_FPS", defaults.frames.candidate_fps),
                top_k: env_parse("FRAME_TOP_K", defaults.frames.top_k),
                min_gap_factor: env_parse("FRAME_MIN_GAP_FACTOR", defaults.frames.min_gap_factor),
                relevance_prompt: std::env::var("FRAME_RELEVANCE_PROMPT")
                    .ok()
                    .filter(|s| !s.trim().is_empty()),
            },
            ocr_enabled: env_parse("OCR_ENABLED", defaults.ocr_enabled),
            decode_timeout: decode_timeout(env_parse(
                "FRAME_DECODE_TIMEOUT",
                DEFAULT_DECODE_TIMEOUT_SECS,
            )),
        })
    }
}

/// `0` disables the limit.
fn decode_timeout(secs: u64) -> Option<Duration> {
    (secs > 0).then(|| Duration::from_secs(secs))
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}
