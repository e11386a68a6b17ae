//! API configuration.

use std::path::PathBuf;
use std::time::Duration;

use lectern_models::DEFAULT_WINDOW_SECONDS;
use lectern_queue::DEFAULT_MAILBOX_CAPACITY;
use lectern_storage::MediaLayout;

/// API server configuration.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Server host
    pub host: String,
    /// Server port
    pub port: u16,
    /// CORS origins
    pub cors_origins: Vec<String>,
    /// Max upload body size
    pub max_upload_bytes: usize,
    /// Directory holding per-video state and artifacts
    pub media_root: PathBuf,
    /// URL prefix under which `media_root` is served
    pub media_url: String,
    /// Window length for new uploads
    pub window_seconds: u64,
    /// Per-subscriber event mailbox capacity
    pub event_mailbox_capacity: usize,
    /// Keep-alive interval on event streams
    pub sse_keep_alive: Duration,
    pub metrics_enabled: bool,
    /// Environment (development/production)
    pub environment: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            cors_origins: vec!["*".to_string()],
            max_upload_bytes: 2 * 1024 * 1024 * 1024, // 2 GiB
            media_root: PathBuf::from("./media"),
            media_url: "/media".to_string(),
            window_seconds: DEFAULT_WINDOW_SECONDS,
            event_mailbox_capacity: DEFAULT_MAILBOX_CAPACITY,
            sse_keep_alive: Duration::from_secs(15),
            metrics_enabled: true,
            environment: "development".to_string(),
        }
    }
}

impl ApiConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            host: std::env::var("API_HOST").unwrap_or(defaults.host),
            port: env_parse("API_PORT", defaults.port),
            cors_origins: std::env::var("CORS_ORIGINS")
                .map(|s| s.split(',').map(|s| s.trim().to_string()).collect())
                .unwrap_or(defaults.cors_origins),
            max_upload_bytes: env_parse("MAX_UPLOAD_BYTES", defaults.max_upload_bytes),
            media_root: std::env::var("MEDIA_ROOT")
                .map(PathBuf::from)
                .unwrap_or(defaults.media_root),
            media_url: std::env::var("MEDIA_URL").unwrap_or(defaults.media_url),
            window_seconds: env_parse("WINDOW_SECONDS", defaults.window_seconds).max(1),
            event_mailbox_capacity: env_parse(
                "EVENT_MAILBOX_CAPACITY",
                defaults.event_mailbox_capacity,
            ),
            sse_keep_alive: defaults.sse_keep_alive,
            metrics_enabled: std::env::var("METRICS_ENABLED")
                .map(|v| v == "true" || v == "1")
                .unwrap_or(defaults.metrics_enabled),
            environment: std::env::var("ENVIRONMENT").unwrap_or(defaults.environment),
        }
    }

    /// Check if running in production mode.
    pub fn is_production(&self) -> bool {
        self.environment.to_lowercase() == "production"
    }

    pub fn layout(&self) -> MediaLayout {
        MediaLayout::new(&self.media_root, &self.media_url)
    }

    /// Route prefix for static media; always an absolute, non-root path.
    pub fn media_mount(&self) -> String {
        let trimmed = self.media_url.trim_end_matches('/');
        if trimmed.starts_with('/') && trimmed.len() > 1 {
            trimmed.to_string()
        } else {
            "/media".to_string()
        }
    }
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}
