//! Assembly coordinator: turns the completed downloads into one output file.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::arena::RunArena;
use crate::encoder::{ConcatJob, Encoder, MediaMetadata};
use crate::error::{Result, TesseraError};
use crate::fetcher::DownloadResult;

#[derive(Debug, Clone)]
pub struct AssemblyOutcome {
    pub output: PathBuf,
    /// Segments that went into the output, in playback order.
    pub segments_used: usize,
    /// Probe result; `None` when probing failed.
    pub metadata: Option<MediaMetadata>,
    pub probe_error: Option<String>,
}

pub struct Assembler {
    encoder: Arc<dyn Encoder>,
}

impl Assembler {
    pub fn new(encoder: Arc<dyn Encoder>) -> Self {
        Self { encoder }
    }

    /// Concatenate every complete download, in the order given, into `output`.
    ///
    /// Local artifacts are deleted after a successful encode whether or not
    /// probing succeeds. They are left in place when the encoder fails.
    pub async fn assemble(
        &self,
        results: &[DownloadResult],
        arena: &RunArena,
        output: &Path,
    ) -> Result<AssemblyOutcome> {
        let inputs: Vec<PathBuf> = results
            .iter()
            .filter(|r| r.is_complete())
            .filter_map(|r| r.path.clone())
            .collect();

        if inputs.is_empty() {
            return Err(TesseraError::NothingToAssemble {
                total: results.len(),
            });
        }

        if let Some(parent) = output.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent).await?;
        }

        let list_file = arena.concat_list_path();
        info!(
            segments = inputs.len(),
            output = %output.display(),
            "Merging segments"
        );
        self.encoder
            .concat(ConcatJob {
                inputs: &inputs,
                list_file: &list_file,
                output,
            })
            .await
            .map_err(|e| match e {
                TesseraError::EncoderFailed { .. } => e,
                other => TesseraError::encoder_failed(other.to_string()),
            })?;
        info!(output = %output.display(), "Merged successfully");

        let (metadata, probe_error) = match self.encoder.probe(output).await {
            Ok(metadata) => (Some(metadata), None),
            Err(e) => {
                warn!(error = %e, "Failed to read output metadata");
                (None, Some(e.to_string()))
            }
        };

        cleanup(&inputs, &list_file, arena).await;

        Ok(AssemblyOutcome {
            output: output.to_path_buf(),
            segments_used: inputs.len(),
            metadata,
            probe_error,
        })
    }
}

async fn cleanup(inputs: &[PathBuf], list_file: &Path, arena: &RunArena) {
    for path in inputs.iter().map(PathBuf::as_path).chain([list_file]) {
        match tokio::fs::remove_file(path).await {
            Ok(()) => debug!(path = %path.display(), "Deleted"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!(path = %path.display(), error = %e, "Failed to delete artifact"),
        }
    }
    match arena.remove_if_empty().await {
        Ok(true) => debug!(path = %arena.root().display(), "Removed run directory"),
        Ok(false) => {}
        Err(e) => warn!(path = %arena.root().display(), error = %e, "Failed to remove run directory"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetcher::DownloadStatus;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct FakeEncoder {
        concat_calls: AtomicUsize,
        inputs: Mutex<Vec<PathBuf>>,
        fail_concat: bool,
        fail_probe: bool,
    }

    #[async_trait]
    impl Encoder for FakeEncoder {
        async fn concat(&self, job: ConcatJob<'_>) -> Result<()> {
            self.concat_calls.fetch_add(1, Ordering::SeqCst);
            *self.inputs.lock().unwrap() = job.inputs.to_vec();
            tokio::fs::write(job.list_file, b"list").await?;
            if self.fail_concat {
                return Err(TesseraError::encoder_failed("exit status 1"));
            }
            tokio::fs::write(job.output, b"merged").await?;
            Ok(())
        }

        async fn probe(&self, _path: &Path) -> Result<MediaMetadata> {
            if self.fail_probe {
                return Err(TesseraError::probe("ffprobe missing"));
            }
            Ok(MediaMetadata {
                format_name: Some("mp4".to_string()),
                ..Default::default()
            })
        }
    }

    async fn downloaded(arena: &RunArena, statuses: &[DownloadStatus]) -> Vec<DownloadResult> {
        let mut results = Vec::new();
        for (index, status) in statuses.iter().enumerate() {
            let path = arena.segment_path(index);
            let complete = *status == DownloadStatus::Complete;
            if complete {
                tokio::fs::write(&path, [index as u8; 4]).await.unwrap();
            }
            results.push(DownloadResult {
                index,
                url: format!("http://origin/{index}.ts"),
                path: complete.then_some(path),
                bytes: if complete { 4 } else { 0 },
                status: *status,
                error: (!complete).then(|| "HTTP 404".to_string()),
            });
        }
        results
    }

    #[tokio::test]
    async fn nothing_to_assemble_skips_encoder() {
        let dir = tempfile::tempdir().unwrap();
        let arena = RunArena::create(dir.path(), "run").await.unwrap();
        let results = downloaded(&arena, &[DownloadStatus::Failed, DownloadStatus::Failed]).await;
        let encoder = Arc::new(FakeEncoder::default());

        let err = Assembler::new(encoder.clone())
            .assemble(&results, &arena, &dir.path().join("out.mp4"))
            .await
            .unwrap_err();

        assert!(matches!(err, TesseraError::NothingToAssemble { total: 2 }));
        assert_eq!(encoder.concat_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn passes_complete_segments_in_order_and_cleans_up() {
        let dir = tempfile::tempdir().unwrap();
        let arena = RunArena::create(dir.path(), "run").await.unwrap();
        let results = downloaded(
            &arena,
            &[
                DownloadStatus::Complete,
                DownloadStatus::Failed,
                DownloadStatus::Complete,
            ],
        )
        .await;
        let encoder = Arc::new(FakeEncoder::default());
        let output = dir.path().join("out").join("video.mp4");

        let outcome = Assembler::new(encoder.clone())
            .assemble(&results, &arena, &output)
            .await
            .unwrap();

        assert_eq!(
            *encoder.inputs.lock().unwrap(),
            vec![arena.segment_path(0), arena.segment_path(2)]
        );
        assert_eq!(outcome.segments_used, 2);
        assert_eq!(
            outcome.metadata.unwrap().format_name.as_deref(),
            Some("mp4")
        );
        assert!(output.exists());
        assert!(!arena.root().exists());
    }

    #[tokio::test]
    async fn cleanup_runs_even_when_probe_fails() {
        let dir = tempfile::tempdir().unwrap();
        let arena = RunArena::create(dir.path(), "run").await.unwrap();
        let results = downloaded(&arena, &[DownloadStatus::Complete]).await;
        let encoder = Arc::new(FakeEncoder {
            fail_probe: true,
            ..Default::default()
        });

        let outcome = Assembler::new(encoder)
            .assemble(&results, &arena, &dir.path().join("out.mp4"))
            .await
            .unwrap();

        assert!(outcome.metadata.is_none());
        assert!(outcome.probe_error.is_some());
        assert!(!arena.segment_path(0).exists());
        assert!(!arena.concat_list_path().exists());
    }

    #[tokio::test]
    async fn encoder_failure_keeps_artifacts() {
        let dir = tempfile::tempdir().unwrap();
        let arena = RunArena::create(dir.path(), "run").await.unwrap();
        let results = downloaded(&arena, &[DownloadStatus::Complete]).await;
        let encoder = Arc::new(FakeEncoder {
            fail_concat: true,
            ..Default::default()
        });

        let err = Assembler::new(encoder)
            .assemble(&results, &arena, &dir.path().join("out.mp4"))
            .await
            .unwrap_err();

        assert!(matches!(err, TesseraError::EncoderFailed { .. }));
        assert_eq!(err.exit_code(), 6);
        assert!(arena.segment_path(0).exists());
    }
}
