//! On-disk layout of per-video state and stage artifacts.
//!
//! ```text
//! <media_root>/videos/<id>/
//!     master.<ext>
//!     video.json
//!     windows/<index>.json
//!     transcripts/<index>.json
//!     frames/<index>/000.jpg
//!     summaries/<index>.json
//! ```
//!
//! Documents embed public locators of the form `<media_url>/videos/<id>/<relative>`.

use std::path::PathBuf;

use lectern_models::VideoId;

const VIDEOS_DIR: &str = "videos";
const VIDEO_DOC: &str = "video.json";
const WINDOWS_DIR: &str = "windows";
const TRANSCRIPTS_DIR: &str = "transcripts";
const FRAMES_DIR: &str = "frames";
const SUMMARIES_DIR: &str = "summaries";

/// Path scheme rooted at the media directory.
#[derive(Debug, Clone)]
pub struct MediaLayout {
    root: PathBuf,
    media_url: String,
}

impl MediaLayout {
    pub fn new(root: impl Into<PathBuf>, media_url: impl Into<String>) -> Self {
        let media_url = media_url.into();
        Self {
            root: root.into(),
            media_url: media_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn videos_dir(&self) -> PathBuf {
        self.root.join(VIDEOS_DIR)
    }

    pub fn video_dir(&self, id: &VideoId) -> PathBuf {
        self.videos_dir().join(id.as_str())
    }

    pub fn video_doc_path(&self, id: &VideoId) -> PathBuf {
        self.video_dir(id).join(VIDEO_DOC)
    }

    pub fn windows_dir(&self, id: &VideoId) -> PathBuf {
        self.video_dir(id).join(WINDOWS_DIR)
    }

    pub fn window_doc_path(&self, id: &VideoId, index: u32) -> PathBuf {
        self.windows_dir(id).join(format!("{}.json", index))
    }

    /// Uploaded source file, keeping the (lowercased) upload extension.
    pub fn master_path(&self, id: &VideoId, extension: &str) -> PathBuf {
        self.video_dir(id)
            .join(format!("master.{}", extension.to_ascii_lowercase()))
    }

    pub fn transcripts_dir(&self, id: &VideoId) -> PathBuf {
        self.video_dir(id).join(TRANSCRIPTS_DIR)
    }

    pub fn transcript_path(&self, id: &VideoId, index: u32) -> PathBuf {
        self.transcripts_dir(id).join(format!("{}.json", index))
    }

    pub fn frames_dir(&self, id: &VideoId, index: u32) -> PathBuf {
        self.video_dir(id).join(FRAMES_DIR).join(index.to_string())
    }

    pub fn summaries_dir(&self, id: &VideoId) -> PathBuf {
        self.video_dir(id).join(SUMMARIES_DIR)
    }

    pub fn summary_path(&self, id: &VideoId, index: u32) -> PathBuf {
        self.summaries_dir(id).join(format!("{}.json", index))
    }

    pub fn transcript_uri(&self, id: &VideoId, index: u32) -> String {
        format!("{}/{}/{}/{}/{}.json", self.media_url, VIDEOS_DIR, id, TRANSCRIPTS_DIR, index)
    }

    pub fn frame_uri(&self, id: &VideoId, index: u32, name: &str) -> String {
        format!("{}/{}/{}/{}/{}/{}", self.media_url, VIDEOS_DIR, id, FRAMES_DIR, index, name)
    }

    pub fn summary_uri(&self, id: &VideoId, index: u32) -> String {
        format!("{}/{}/{}/{}/{}.json", self.media_url, VIDEOS_DIR, id, SUMMARIES_DIR, index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn layout() -> MediaLayout {
        MediaLayout::new("/srv/media", "/media/")
    }

    #[test]
    fn test_paths() {
        let id = VideoId::from("v_0123abcd");
        let l = layout();
        assert_eq!(
            l.video_doc_path(&id),
            PathBuf::from("/srv/media/videos/v_0123abcd/video.json")
        );
        assert_eq!(
            l.window_doc_path(&id, 12),
            PathBuf::from("/srv/media/videos/v_0123abcd/windows/12.json")
        );
        assert_eq!(
            l.frames_dir(&id, 3),
            PathBuf::from("/srv/media/videos/v_0123abcd/frames/3")
        );
        assert_eq!(
            l.master_path(&id, "MP4"),
            PathBuf::from("/srv/media/videos/v_0123abcd/master.mp4")
        );
    }

    #[test]
    fn test_uris() {
        let id = VideoId::from("v_0123abcd");
        let l = layout();
        assert_eq!(l.transcript_uri(&id, 0), "/media/videos/v_0123abcd/transcripts/0.json");
        assert_eq!(l.summary_uri(&id, 2), "/media/videos/v_0123abcd/summaries/2.json");
        assert_eq!(l.frame_uri(&id, 1, "004.jpg"), "/media/videos/v_0123abcd/frames/1/004.jpg");
    }
}
