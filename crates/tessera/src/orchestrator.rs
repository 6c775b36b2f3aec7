//! Run orchestration.
//!
//! One [`Orchestrator::run`] takes a page identifier through the whole
//! pipeline: locate the manifest, poll it until the segment set stabilizes,
//! download every representative segment into a run-scoped arena, then
//! assemble the completed downloads. Run-level failures come back as
//! [`TesseraError`] values; nothing here panics or exits the process.

use std::path::PathBuf;
use std::sync::Arc;

use reqwest::Client;
use tracing::{info, instrument, warn};

use crate::arena::RunArena;
use crate::assembler::{Assembler, AssemblyOutcome};
use crate::config::TesseraConfig;
use crate::encoder::{Encoder, FfmpegEncoder};
use crate::error::{Result, TesseraError};
use crate::fetcher::{DownloadResult, SegmentFetcher};
use crate::locator::{DirectLocator, HttpPageLocator, PageLocator, locate_manifest};
use crate::manifest::{HttpManifestSource, ManifestSource};
use crate::progress::ProgressCallback;
use crate::query::output_file_name;
use crate::stabilizer::{StabilizedSegmentSet, Stabilizer};

/// Everything a finished run produced.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub run_id: String,
    pub manifest_url: String,
    pub segments: StabilizedSegmentSet,
    pub downloads: Vec<DownloadResult>,
    pub outcome: AssemblyOutcome,
}

impl RunReport {
    pub fn output(&self) -> &PathBuf {
        &self.outcome.output
    }

    pub fn failed_downloads(&self) -> impl Iterator<Item = &DownloadResult> {
        self.downloads.iter().filter(|r| !r.is_complete())
    }
}

pub struct Orchestrator {
    config: TesseraConfig,
    locator: Arc<dyn PageLocator>,
    stabilizer: Stabilizer,
    fetcher: SegmentFetcher,
    assembler: Assembler,
}

impl Orchestrator {
    pub fn new(
        config: TesseraConfig,
        client: Client,
        locator: Arc<dyn PageLocator>,
        source: Arc<dyn ManifestSource>,
        encoder: Arc<dyn Encoder>,
    ) -> Self {
        Self {
            stabilizer: Stabilizer::new(source, config.empty_poll_backoff),
            fetcher: SegmentFetcher::new(client, &config),
            assembler: Assembler::new(encoder),
            locator,
            config,
        }
    }

    /// Production wiring: HTTP manifest source, ffmpeg encoder, and either a
    /// page-scanning locator or, with `direct`, the page URL as manifest.
    pub fn from_config(config: TesseraConfig, direct: bool) -> Result<Self> {
        let client = config.create_client()?;
        let source = Arc::new(HttpManifestSource::new(
            client.clone(),
            config.manifest_timeout,
            config.fallback_segment_duration,
        ));
        let locator: Arc<dyn PageLocator> = if direct {
            Arc::new(DirectLocator::new(config.locator_pattern.clone()))
        } else {
            Arc::new(HttpPageLocator::new(
                client.clone(),
                config.locator_pattern.clone(),
            ))
        };
        let encoder = Arc::new(FfmpegEncoder::from_config(&config));
        Ok(Self::new(config, client, locator, source, encoder))
    }

    pub fn with_progress(mut self, on_progress: ProgressCallback) -> Self {
        self.fetcher = self.fetcher.with_progress(on_progress);
        self
    }

    #[instrument(skip(self, page))]
    pub async fn run(&self, page: Option<&str>, run_id: &str) -> Result<RunReport> {
        let page = page
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .ok_or_else(|| TesseraError::usage("please provide a page URL"))?;

        let manifest_url =
            locate_manifest(self.locator.as_ref(), page, self.config.locator_timeout).await?;

        let segments = self
            .stabilizer
            .stabilize(
                &manifest_url,
                self.config.repeat_threshold,
                self.config.max_attempts,
            )
            .await;
        segments.log_summary(self.config.repeat_threshold);

        if segments.is_empty() {
            return Err(TesseraError::NoSegmentsStabilized {
                attempts: segments.attempts,
            });
        }
        if !segments.stabilized {
            warn!(
                groups = segments.len(),
                "Continuing with a partially observed segment set"
            );
        }

        let output_name = output_file_name(segments.segments.first().map(|s| s.url.as_str()));
        let output = self.config.output_dir.join(&output_name);
        info!(output = %output.display(), "Output file");

        let arena = RunArena::create(&self.config.work_dir, run_id).await?;
        let downloads = self.fetcher.download_all(&segments.urls(), &arena).await;

        let outcome = match self.assembler.assemble(&downloads, &arena, &output).await {
            Ok(outcome) => outcome,
            Err(e) => {
                if matches!(e, TesseraError::NothingToAssemble { .. })
                    && let Err(cleanup) = arena.remove_if_empty().await
                {
                    // Failed downloads leave nothing behind, so the arena should be empty.
                    warn!(
                        path = %arena.root().display(),
                        error = %cleanup,
                        "Failed to remove run directory"
                    );
                }
                return Err(e);
            }
        };

        let report = RunReport {
            run_id: run_id.to_string(),
            manifest_url,
            segments,
            downloads,
            outcome,
        };
        for failed in report.failed_downloads() {
            warn!(
                segment = failed.index + 1,
                reason = failed.error.as_deref().unwrap_or("unknown"),
                "Output is missing a segment"
            );
        }
        Ok(report)
    }
}
