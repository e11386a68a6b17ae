//! Text extraction from still images.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;

use crate::command::stderr_tail;
use crate::error::{MediaError, MediaResult};

/// Extracts visible text from an image.
#[async_trait]
pub trait TextExtractor: Send + Sync {
    /// Name for logging.
    fn name(&self) -> &'static str;

    async fn extract_text(&self, image: &Path) -> MediaResult<String>;
}

/// Used when no OCR engine is available; every image has no text.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoTextExtractor;

#[async_trait]
impl TextExtractor for NoTextExtractor {
    fn name(&self) -> &'static str {
        "none"
    }

    async fn extract_text(&self, _image: &Path) -> MediaResult<String> {
        Ok(String::new())
    }
}

/// OCR through the `tesseract` command line tool.
#[derive(Debug, Clone)]
pub struct TesseractCli {
    binary: PathBuf,
}

impl TesseractCli {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    /// Locate `tesseract` on PATH.
    pub fn detect() -> MediaResult<Self> {
        which::which("tesseract")
            .map(Self::new)
            .map_err(|_| MediaError::TesseractNotFound)
    }

    fn build_args(&self, image: &Path) -> Vec<String> {
        vec![image.to_string_lossy().to_string(), "stdout".to_string()]
    }
}

#[async_trait]
impl TextExtractor for TesseractCli {
    fn name(&self) -> &'static str {
        "tesseract"
    }

    async fn extract_text(&self, image: &Path) -> MediaResult<String> {
        let output = Command::new(&self.binary)
            .args(self.build_args(image))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await?;

        if !output.status.success() {
            return Err(MediaError::ocr_failed(format!(
                "tesseract exited with {:?}: {}",
                output.status.code(),
                stderr_tail(&output.stderr)
            )));
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}
