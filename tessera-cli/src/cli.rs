use std::path::PathBuf;

use clap::Parser;
use tessera_engine::TesseraConfig;

/// Rebuild a media file from a page's rotating segmented stream
#[derive(Parser, Debug)]
#[command(name = "tessera", version, about, long_about = None)]
pub struct Args {
    /// Page URL that exposes the stream
    pub page_url: Option<String>,

    /// Identifier for this run's working directory [default: current epoch milliseconds]
    pub run_id: Option<String>,

    /// Directory the merged file is written to
    #[arg(short, long, default_value = ".")]
    pub output_dir: PathBuf,

    /// Parent directory for per-run segment files [default: system temp dir]
    #[arg(long, env = "TESSERA_WORK_DIR")]
    pub work_dir: Option<PathBuf>,

    /// Maximum simultaneous segment downloads
    #[arg(short, long, env = "TESSERA_CONCURRENCY")]
    pub concurrency: Option<usize>,

    /// Sightings every segment group needs before the set is trusted
    #[arg(long)]
    pub repeat_threshold: Option<u32>,

    /// Manifest polls before settling for a partial set
    #[arg(long)]
    pub max_attempts: Option<u32>,

    /// Treat the page URL as the manifest URL itself
    #[arg(long)]
    pub direct: bool,

    /// ffmpeg binary
    #[arg(long, env = "FFMPEG_PATH")]
    pub ffmpeg_path: Option<String>,

    /// ffprobe binary
    #[arg(long, env = "FFPROBE_PATH")]
    pub ffprobe_path: Option<String>,

    /// Enable debug logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Only log errors and hide progress bars
    #[arg(short, long, conflicts_with = "verbose")]
    pub quiet: bool,
}

impl Args {
    pub fn run_id(&self) -> String {
        self.run_id
            .clone()
            .unwrap_or_else(|| chrono::Utc::now().timestamp_millis().to_string())
    }

    pub fn to_config(&self) -> TesseraConfig {
        let mut builder = TesseraConfig::builder().with_output_dir(&self.output_dir);
        if let Some(dir) = &self.work_dir {
            builder = builder.with_work_dir(dir);
        }
        if let Some(concurrency) = self.concurrency {
            builder = builder.with_max_concurrent_downloads(concurrency);
        }
        if let Some(threshold) = self.repeat_threshold {
            builder = builder.with_repeat_threshold(threshold);
        }
        if let Some(attempts) = self.max_attempts {
            builder = builder.with_max_attempts(attempts);
        }
        if let Some(path) = &self.ffmpeg_path {
            builder = builder.with_ffmpeg_path(path);
        }
        if let Some(path) = &self.ffprobe_path {
            builder = builder.with_ffprobe_path(path);
        }
        builder.build()
    }
}
