// Concurrent segment fetcher: downloads every representative URL to the run
// arena behind a bounded worker pool. Failures stay local to their segment.

use std::path::{Path, PathBuf};

use futures::{StreamExt, stream};
use reqwest::Client;
use tokio::fs::File;
use tokio::io::{AsyncWriteExt, BufWriter};
use tracing::{debug, info, instrument, warn};

use crate::arena::RunArena;
use crate::config::TesseraConfig;
use crate::error::{Result, TesseraError};
use crate::progress::{ProgressCallback, ProgressTracker, SegmentProgress};
use crate::query::is_fetchable;
use crate::retry::{RetryPolicy, retry_with_backoff};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DownloadStatus {
    Complete,
    Failed,
}

/// Outcome of one segment download.
#[derive(Debug, Clone)]
pub struct DownloadResult {
    pub index: usize,
    pub url: String,
    /// Local artifact, present only when complete.
    pub path: Option<PathBuf>,
    pub bytes: u64,
    pub status: DownloadStatus,
    /// Failure reason, present only when failed.
    pub error: Option<String>,
}

impl DownloadResult {
    pub fn is_complete(&self) -> bool {
        self.status == DownloadStatus::Complete
    }

    fn failed(index: usize, url: &str, error: &TesseraError) -> Self {
        Self {
            index,
            url: url.to_string(),
            path: None,
            bytes: 0,
            status: DownloadStatus::Failed,
            error: Some(error.to_string()),
        }
    }
}

pub fn count_complete(results: &[DownloadResult]) -> usize {
    results.iter().filter(|r| r.is_complete()).count()
}

pub struct SegmentFetcher {
    client: Client,
    concurrency: usize,
    retry: RetryPolicy,
    progress_step: u8,
    on_progress: Option<ProgressCallback>,
}

impl SegmentFetcher {
    pub fn new(client: Client, config: &TesseraConfig) -> Self {
        Self {
            client,
            concurrency: config.max_concurrent_downloads.max(1),
            retry: config.segment_retry.clone(),
            progress_step: config.progress_step,
            on_progress: None,
        }
    }

    pub fn with_progress(mut self, on_progress: ProgressCallback) -> Self {
        self.on_progress = Some(on_progress);
        self
    }

    /// Download every URL into `arena`, returning one result per input in
    /// input order. Returns only once every download has settled.
    pub async fn download_all(&self, urls: &[String], arena: &RunArena) -> Vec<DownloadResult> {
        let total = urls.len();
        let results: Vec<DownloadResult> = stream::iter(urls.iter().enumerate())
            .map(|(index, url)| self.download_one(index, url, arena.segment_path(index)))
            .buffered(self.concurrency)
            .collect()
            .await;

        let complete = count_complete(&results);
        info!(complete, total, "All segments downloaded ({complete}/{total})");
        for failed in results.iter().filter(|r| !r.is_complete()) {
            warn!(
                segment = failed.index + 1,
                url = %failed.url,
                error = failed.error.as_deref().unwrap_or("unknown"),
                "Segment failed"
            );
        }

        results
    }

    #[instrument(skip(self, url, path), fields(segment = index + 1))]
    async fn download_one(&self, index: usize, url: &str, path: PathBuf) -> DownloadResult {
        if !is_fetchable(url) {
            let err = TesseraError::invalid_url(url, "URL normalization failed");
            self.emit(ProgressTracker::new(index, self.progress_step, None).fail());
            return DownloadResult::failed(index, url, &err);
        }

        let outcome = retry_with_backoff(&self.retry, |attempt| {
            self.fetch_to_file(index, url, &path, attempt)
        })
        .await;

        match outcome {
            Ok(bytes) => {
                debug!(bytes, path = %path.display(), "Segment saved");
                DownloadResult {
                    index,
                    url: url.to_string(),
                    path: Some(path),
                    bytes,
                    status: DownloadStatus::Complete,
                    error: None,
                }
            }
            Err(err) => {
                if let Err(e) = tokio::fs::remove_file(&path).await
                    && e.kind() != std::io::ErrorKind::NotFound
                {
                    warn!(path = %path.display(), error = %e, "Failed to remove partial segment");
                }
                self.emit(ProgressTracker::new(index, self.progress_step, None).fail());
                let err = TesseraError::SegmentDownload {
                    index,
                    reason: err.to_string(),
                    retryable: err.is_retryable(),
                };
                DownloadResult::failed(index, url, &err)
            }
        }
    }

    async fn fetch_to_file(&self, index: usize, url: &str, path: &Path, attempt: u32) -> Result<u64> {
        if attempt > 0 {
            debug!(attempt, "Retrying segment download");
        }

        let response = self.client.get(url).send().await?;
        if !response.status().is_success() {
            return Err(TesseraError::http_status(response.status(), url));
        }

        let mut tracker = ProgressTracker::new(index, self.progress_step, response.content_length());
        let mut file = BufWriter::new(File::create(path).await?);
        let mut body = response.bytes_stream();

        while let Some(chunk) = body.next().await {
            let chunk = chunk?;
            file.write_all(&chunk).await?;
            if let Some(event) = tracker.advance(chunk.len() as u64) {
                self.emit(event);
            }
        }
        file.flush().await?;

        self.emit(tracker.complete());
        Ok(tracker.downloaded())
    }

    fn emit(&self, event: SegmentProgress) {
        if let Some(on_progress) = &self.on_progress {
            on_progress(event);
        }
    }
}
