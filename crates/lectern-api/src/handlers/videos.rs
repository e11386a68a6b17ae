//! Video API handlers.

use std::path::Path as FsPath;

use axum::extract::multipart::{Field, MultipartError};
use axum::extract::{Multipart, Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{info, warn};

use lectern_models::{PipelineEvent, VideoDocument, VideoId, VideoStatus, WindowDocument};
use lectern_queue::ProcessVideoJob;

use crate::error::{ApiError, ApiResult};
use crate::metrics;
use crate::state::AppState;

/// Accepted upload container extensions.
pub const ALLOWED_EXTENSIONS: [&str; 3] = ["mp4", "mov", "mkv"];

const UPLOAD_FIELD: &str = "file";

/// Response to a successful upload.
#[derive(Debug, Serialize)]
pub struct CreateVideoResponse {
    pub id: VideoId,
    pub status: VideoStatus,
    pub window_seconds: u64,
}

/// Lowercased extension of an upload filename, if it is accepted.
pub fn accepted_extension(filename: &str) -> Option<String> {
    let ext = FsPath::new(filename).extension()?.to_str()?.to_ascii_lowercase();
    ALLOWED_EXTENSIONS.contains(&ext.as_str()).then_some(ext)
}

/// Parse a path ID, treating malformed IDs as unknown.
pub(crate) fn parse_video_id(raw: String) -> ApiResult<VideoId> {
    let id = VideoId::from(raw);
    if id.is_well_formed() {
        Ok(id)
    } else {
        Err(ApiError::not_found("Video not found"))
    }
}

/// Upload a lecture recording and start processing it.
///
/// POST /videos (multipart, field `file`)
pub async fn create_video(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> ApiResult<(StatusCode, Json<CreateVideoResponse>)> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| upload_error(&state, "invalid multipart body", e))?
    {
        if field.name() == Some(UPLOAD_FIELD) {
            let response = accept_upload(&state, field).await?;
            return Ok((StatusCode::CREATED, Json(response)));
        }
    }
    Err(ApiError::bad_request("file required"))
}

async fn accept_upload(state: &AppState, mut field: Field<'_>) -> ApiResult<CreateVideoResponse> {
    let filename = field.file_name().unwrap_or_default().to_string();
    if filename.is_empty() {
        return Err(ApiError::bad_request("file required"));
    }
    let extension =
        accepted_extension(&filename).ok_or_else(|| ApiError::bad_request("unsupported file type"))?;

    let first_chunk = match read_chunk(state, &mut field).await? {
        Some(chunk) if !chunk.is_empty() => chunk,
        _ => return Err(ApiError::bad_request("file required")),
    };

    let store = &state.store;
    let id = store.new_video_id().await?;
    let master = store.layout().master_path(&id, &extension);

    let saved = save_upload(state, &master, &first_chunk, &mut field).await;
    let bytes = match saved {
        Ok(bytes) => bytes,
        Err(e) => {
            discard(state, &id).await;
            return Err(e);
        }
    };
    metrics::record_upload(bytes);

    let duration_sec = match state.prober.probe_duration(&master).await {
        Ok(duration) => duration,
        Err(e) => {
            warn!(video_id = %id, "Rejecting upload, probe failed: {}", e);
            discard(state, &id).await;
            return Err(ApiError::bad_request(format!("could not read media duration: {}", e)));
        }
    };

    let doc = store
        .create_video(id.clone(), filename, duration_sec, state.config.window_seconds)
        .await?;

    if let Err(e) = state
        .broker
        .publish(id.as_str(), &PipelineEvent::video_started(id.clone(), duration_sec))
    {
        warn!(video_id = %id, "Failed to publish video_started: {}", e);
    }

    if let Err(e) = state.dispatcher.submit(ProcessVideoJob::new(id.clone(), master)).await {
        discard(state, &id).await;
        return Err(e.into());
    }

    info!(video_id = %id, duration_sec, "Accepted upload");
    Ok(CreateVideoResponse {
        id: doc.id,
        status: doc.status,
        window_seconds: doc.window_seconds,
    })
}

async fn read_chunk(
    state: &AppState,
    field: &mut Field<'_>,
) -> ApiResult<Option<axum::body::Bytes>> {
    field
        .chunk()
        .await
        .map_err(|e| upload_error(state, "upload interrupted", e))
}

/// Body-limit overruns are 413; anything else is a malformed request.
fn upload_error(state: &AppState, context: &str, e: MultipartError) -> ApiError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ApiError::payload_too_large(format!(
            "upload exceeds {} bytes",
            state.config.max_upload_bytes
        ))
    } else {
        ApiError::bad_request(format!("{}: {}", context, e))
    }
}

/// Stream the upload to `path`; returns the number of bytes written.
async fn save_upload(
    state: &AppState,
    path: &FsPath,
    first: &[u8],
    field: &mut Field<'_>,
) -> ApiResult<u64> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).await?;
    }
    let mut file = fs::File::create(path).await?;
    file.write_all(first).await?;
    let mut written = first.len() as u64;

    while let Some(chunk) = read_chunk(state, field).await? {
        file.write_all(&chunk).await?;
        written += chunk.len() as u64;
    }
    file.flush().await?;
    Ok(written)
}

async fn discard(state: &AppState, id: &VideoId) {
    if let Err(e) = state.store.remove_video(id).await {
        warn!(video_id = %id, "Failed to remove rejected upload: {}", e);
    }
}

/// Get a video document.
///
/// GET /videos/:video_id
pub async fn get_video(
    State(state): State<AppState>,
    Path(video_id): Path<String>,
) -> ApiResult<Json<VideoDocument>> {
    let id = parse_video_id(video_id)?;
    state
        .store
        .read_video(&id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::not_found("Video not found"))
}

/// List window documents in index order.
///
/// GET /videos/:video_id/windows
pub async fn list_windows(
    State(state): State<AppState>,
    Path(video_id): Path<String>,
) -> ApiResult<Json<Vec<WindowDocument>>> {
    let id = parse_video_id(video_id)?;
    Ok(Json(state.store.list_windows(&id).await?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accepted_extension() {
        assert_eq!(accepted_extension("lecture.MP4").as_deref(), Some("mp4"));
        assert_eq!(accepted_extension("week 3.final.mkv").as_deref(), Some("mkv"));
        assert_eq!(accepted_extension("clip.mov").as_deref(), Some("mov"));
        assert_eq!(accepted_extension("slides.pdf"), None);
        assert_eq!(accepted_extension("noext"), None);
    }

    #[test]
    fn test_parse_video_id() {
        assert!(parse_video_id("v_0123abcd".to_string()).is_ok());
        assert!(parse_video_id("../etc".to_string()).is_err());
        assert!(parse_video_id("v_0123ABCD".to_string()).is_err());
    }
}
