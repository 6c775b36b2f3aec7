use std::path::PathBuf;
use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue};

use crate::error::{Result, TesseraError};
use crate::retry::RetryPolicy;

pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/122.0.0.0 Safari/537.36";

/// URL pattern the page locator looks for, and the rewrite that turns the
/// subtitle manifest into the video manifest.
#[derive(Debug, Clone)]
pub struct LocatorPattern {
    /// Every fragment must appear in a candidate URL.
    pub required_fragments: Vec<String>,
    /// Replaced by `rewrite_to` in the matched URL.
    pub rewrite_from: String,
    pub rewrite_to: String,
}

impl Default for LocatorPattern {
    fn default() -> Self {
        Self {
            required_fragments: vec![
                "/share/streaming".to_string(),
                "M3U8_SUBTITLE_SRT".to_string(),
            ],
            rewrite_from: "M3U8_SUBTITLE_SRT".to_string(),
            rewrite_to: "M3U8_FLV_264_480".to_string(),
        }
    }
}

/// Operational settings for one tessera run.
#[derive(Debug, Clone)]
pub struct TesseraConfig {
    /// Observations each group needs before the segment set is trusted
    pub repeat_threshold: u32,

    /// Manifest polls before the poller settles for a partial set
    pub max_attempts: u32,

    /// Pause after a poll that yielded no segments
    pub empty_poll_backoff: Duration,

    /// Per-request timeout for manifest fetches
    pub manifest_timeout: Duration,

    /// How long the page locator may take to produce a manifest URL
    pub locator_timeout: Duration,

    /// Connection timeout for every HTTP request
    pub connect_timeout: Duration,

    /// Upper bound on in-flight segment downloads
    pub max_concurrent_downloads: usize,

    /// Backoff policy for transient segment failures
    pub segment_retry: RetryPolicy,

    /// Progress is reported each time a download crosses a multiple of this
    /// many percentage points
    pub progress_step: u8,

    /// Duration assumed for manifest entries without one, in seconds
    pub fallback_segment_duration: f64,

    /// Parent of the per-run artifact directories
    pub work_dir: PathBuf,

    /// Directory the assembled file is written to
    pub output_dir: PathBuf,

    pub ffmpeg_path: String,

    pub ffprobe_path: String,

    pub user_agent: String,

    pub headers: HeaderMap,

    pub locator_pattern: LocatorPattern,
}

impl Default for TesseraConfig {
    fn default() -> Self {
        Self {
            repeat_threshold: 8,
            max_attempts: 50,
            empty_poll_backoff: Duration::from_secs(2),
            manifest_timeout: Duration::from_secs(10),
            locator_timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(30),
            max_concurrent_downloads: 16,
            segment_retry: RetryPolicy::default(),
            progress_step: 10,
            fallback_segment_duration: 30.0,
            work_dir: std::env::temp_dir().join("tessera"),
            output_dir: PathBuf::from("."),
            ffmpeg_path: std::env::var("FFMPEG_PATH").unwrap_or_else(|_| "ffmpeg".to_string()),
            ffprobe_path: std::env::var("FFPROBE_PATH")
                .unwrap_or_else(|_| "ffprobe".to_string()),
            user_agent: DEFAULT_USER_AGENT.to_owned(),
            headers: TesseraConfig::get_default_headers(),
            locator_pattern: LocatorPattern::default(),
        }
    }
}

impl TesseraConfig {
    pub fn builder() -> TesseraConfigBuilder {
        TesseraConfigBuilder::new()
    }

    pub fn get_default_headers() -> HeaderMap {
        let mut default_headers = HeaderMap::new();

        default_headers.insert(reqwest::header::ACCEPT, HeaderValue::from_static("*/*"));
        default_headers.insert(
            reqwest::header::ACCEPT_LANGUAGE,
            HeaderValue::from_static("en-US,en;q=0.5"),
        );
        default_headers.insert(
            reqwest::header::CONNECTION,
            HeaderValue::from_static("keep-alive"),
        );
        default_headers
    }

    /// Build the HTTP client shared by the locator, manifest fetcher and
    /// segment fetcher.
    pub fn create_client(&self) -> Result<reqwest::Client> {
        reqwest::Client::builder()
            .user_agent(self.user_agent.clone())
            .default_headers(self.headers.clone())
            .connect_timeout(self.connect_timeout)
            .build()
            .map_err(TesseraError::from)
    }
}

/// Chained construction of a [`TesseraConfig`].
#[derive(Debug, Clone, Default)]
pub struct TesseraConfigBuilder {
    config: TesseraConfig,
}

impl TesseraConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_repeat_threshold(mut self, threshold: u32) -> Self {
        self.config.repeat_threshold = threshold;
        self
    }

    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.config.max_attempts = attempts;
        self
    }

    pub fn with_empty_poll_backoff(mut self, backoff: Duration) -> Self {
        self.config.empty_poll_backoff = backoff;
        self
    }

    pub fn with_manifest_timeout(mut self, timeout: Duration) -> Self {
        self.config.manifest_timeout = timeout;
        self
    }

    pub fn with_locator_timeout(mut self, timeout: Duration) -> Self {
        self.config.locator_timeout = timeout;
        self
    }

    pub fn with_max_concurrent_downloads(mut self, limit: usize) -> Self {
        self.config.max_concurrent_downloads = limit.max(1);
        self
    }

    pub fn with_segment_retry(mut self, policy: RetryPolicy) -> Self {
        self.config.segment_retry = policy;
        self
    }

    pub fn with_progress_step(mut self, step: u8) -> Self {
        self.config.progress_step = step.clamp(1, 100);
        self
    }

    pub fn with_work_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.work_dir = dir.into();
        self
    }

    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.output_dir = dir.into();
        self
    }

    pub fn with_ffmpeg_path(mut self, path: impl Into<String>) -> Self {
        self.config.ffmpeg_path = path.into();
        self
    }

    pub fn with_ffprobe_path(mut self, path: impl Into<String>) -> Self {
        self.config.ffprobe_path = path.into();
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.config.user_agent = user_agent.into();
        self
    }

    /// Custom headers override defaults with the same name.
    pub fn with_headers(mut self, headers: HeaderMap) -> Self {
        for (name, value) in headers.iter() {
            self.config.headers.insert(name.clone(), value.clone());
        }
        self
    }

    pub fn with_locator_pattern(mut self, pattern: LocatorPattern) -> Self {
        self.config.locator_pattern = pattern;
        self
    }

    pub fn build(self) -> TesseraConfig {
        self.config
    }
}
