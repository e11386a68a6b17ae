//! Video and window document store.

use std::path::Path;

use serde::Serialize;
use tokio::fs;
use tracing::{debug, info, warn};

use lectern_models::{VideoDocument, VideoId, WindowDocument};

use crate::atomic::{is_temp_name, read_json, write_json_atomic};
use crate::error::{StorageError, StorageResult};
use crate::layout::MediaLayout;

/// How many fresh IDs to try before giving up.
const MAX_ID_ATTEMPTS: usize = 8;

/// Crash-safe store for per-video state, backed by JSON files.
///
/// Every write replaces the whole document atomically. Each video has a single
/// writer (its pipeline run) and any number of concurrent readers.
#[derive(Debug, Clone)]
pub struct StateStore {
    layout: MediaLayout,
}

impl StateStore {
    pub fn new(layout: MediaLayout) -> Self {
        Self { layout }
    }

    pub fn layout(&self) -> &MediaLayout {
        &self.layout
    }

    /// Generate an ID whose video directory does not exist yet.
    pub async fn new_video_id(&self) -> StorageResult<VideoId> {
        for _ in 0..MAX_ID_ATTEMPTS {
            let id = VideoId::generate();
            if !fs::try_exists(self.layout.video_dir(&id)).await? {
                return Ok(id);
            }
            warn!(video_id = %id, "Generated video id already in use, retrying");
        }
        Err(StorageError::IdExhausted(MAX_ID_ATTEMPTS))
    }

    /// Write the initial document for a freshly uploaded video.
    pub async fn create_video(
        &self,
        id: VideoId,
        filename: impl Into<String>,
        duration_sec: u64,
        window_seconds: u64,
    ) -> StorageResult<VideoDocument> {
        let doc = VideoDocument::new(id, filename, duration_sec, window_seconds);
        self.write_video(&doc).await?;
        info!(
            video_id = %doc.id,
            duration_sec,
            window_seconds,
            "Created video document"
        );
        Ok(doc)
    }

    pub async fn read_video(&self, id: &VideoId) -> StorageResult<Option<VideoDocument>> {
        read_json(&self.layout.video_doc_path(id)).await
    }

    pub async fn write_video(&self, doc: &VideoDocument) -> StorageResult<()> {
        write_json_atomic(&self.layout.video_doc_path(&doc.id), doc).await?;
        debug!(video_id = %doc.id, status = %doc.status, "Wrote video document");
        Ok(())
    }

    pub async fn read_window(
        &self,
        id: &VideoId,
        index: u32,
    ) -> StorageResult<Option<WindowDocument>> {
        read_json(&self.layout.window_doc_path(id, index)).await
    }

    pub async fn write_window(&self, doc: &WindowDocument) -> StorageResult<()> {
        write_json_atomic(&self.layout.window_doc_path(&doc.video_id, doc.index), doc).await?;
        debug!(
            video_id = %doc.video_id,
            index = doc.index,
            status = %doc.status,
            "Wrote window document"
        );
        Ok(())
    }

    /// All window documents of a video, ordered by ascending numeric index.
    ///
    /// A video without a windows collection yields an empty list.
    pub async fn list_windows(&self, id: &VideoId) -> StorageResult<Vec<WindowDocument>> {
        let dir = self.layout.windows_dir(id);
        let mut entries = match fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut indexed = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name().to_string_lossy().into_owned();
            if is_temp_name(&name) {
                continue;
            }
            if let Some(index) = window_index_from_name(&name) {
                indexed.push((index, entry.path()));
            }
        }
        indexed.sort_by_key(|(index, _)| *index);

        let mut out = Vec::with_capacity(indexed.len());
        for (_, path) in indexed {
            // A document can disappear only if the video is being removed.
            if let Some(doc) = read_json::<WindowDocument>(&path).await? {
                out.push(doc);
            }
        }
        Ok(out)
    }

    /// Atomically write a JSON stage artifact (transcript, summary).
    pub async fn write_artifact<T: Serialize + ?Sized>(
        &self,
        path: &Path,
        value: &T,
    ) -> StorageResult<()> {
        write_json_atomic(path, value).await
    }

    /// Remove everything stored for a video (used when an upload is rejected).
    pub async fn remove_video(&self, id: &VideoId) -> StorageResult<()> {
        match fs::remove_dir_all(self.layout.video_dir(id)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// Parse `<n>.json` into `n`.
fn window_index_from_name(name: &str) -> Option<u32> {
    name.strip_suffix(".json")?.parse().ok()
}
