//! Encoder collaborator.
//!
//! Concatenates local segment files into one output without re-encoding and
//! probes the result. [`FfmpegEncoder`] drives the `ffmpeg` concat demuxer and
//! `ffprobe`; anything implementing [`Encoder`] can stand in for it.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::process::Command;
use tracing::debug;

use crate::config::TesseraConfig;
use crate::error::{Result, TesseraError};

/// One concatenation request.
#[derive(Debug, Clone, Copy)]
pub struct ConcatJob<'a> {
    /// Inputs in playback order.
    pub inputs: &'a [PathBuf],
    /// Where the encoder may write its input list. Removed by the caller.
    pub list_file: &'a Path,
    pub output: &'a Path,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VideoStreamInfo {
    pub codec: Option<String>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub frame_rate: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct MediaMetadata {
    pub format_name: Option<String>,
    pub format_long_name: Option<String>,
    pub duration_secs: Option<f64>,
    pub size_bytes: Option<u64>,
    pub bit_rate: Option<u64>,
    /// First video stream, if any.
    pub video: Option<VideoStreamInfo>,
    /// Full probe document.
    pub raw: serde_json::Value,
}

#[async_trait]
pub trait Encoder: Send + Sync {
    async fn concat(&self, job: ConcatJob<'_>) -> Result<()>;
    async fn probe(&self, path: &Path) -> Result<MediaMetadata>;
}

pub struct FfmpegEncoder {
    ffmpeg_path: String,
    ffprobe_path: String,
}

impl FfmpegEncoder {
    pub fn new(ffmpeg_path: impl Into<String>, ffprobe_path: impl Into<String>) -> Self {
        Self {
            ffmpeg_path: ffmpeg_path.into(),
            ffprobe_path: ffprobe_path.into(),
        }
    }

    pub fn from_config(config: &TesseraConfig) -> Self {
        Self::new(config.ffmpeg_path.clone(), config.ffprobe_path.clone())
    }

    /// Contents of a concat demuxer list, one `file '<path>'` line per input.
    pub fn concat_list(inputs: &[PathBuf]) -> String {
        inputs
            .iter()
            .map(|p| {
                let path = std::path::absolute(p).unwrap_or_else(|_| p.clone());
                let escaped = path.to_string_lossy().replace('\'', r"'\''");
                format!("file '{escaped}'\n")
            })
            .collect()
    }

    pub fn build_concat_args(list_file: &Path, output: &Path) -> Vec<String> {
        let mut args = Vec::new();
        args.extend(["-y".to_string(), "-hide_banner".to_string()]);
        args.push("-nostats".to_string());
        args.extend(["-loglevel".to_string(), "error".to_string()]);
        args.extend(["-f".to_string(), "concat".to_string()]);
        args.extend(["-safe".to_string(), "0".to_string()]);
        args.extend(["-i".to_string(), list_file.to_string_lossy().to_string()]);
        // Stream copy only; segments are never re-encoded.
        args.extend(["-c".to_string(), "copy".to_string()]);
        args.push(output.to_string_lossy().to_string());
        args
    }
}

#[async_trait]
impl Encoder for FfmpegEncoder {
    async fn concat(&self, job: ConcatJob<'_>) -> Result<()> {
        tokio::fs::write(job.list_file, Self::concat_list(job.inputs)).await?;

        let args = Self::build_concat_args(job.list_file, job.output);
        debug!(ffmpeg = %self.ffmpeg_path, ?args, "Running ffmpeg concat");

        let output = Command::new(&self.ffmpeg_path)
            .args(&args)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| {
                TesseraError::encoder_failed(format!("failed to run {}: {e}", self.ffmpeg_path))
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(TesseraError::encoder_failed(format!(
                "ffmpeg exited with {}: {}",
                output.status,
                stderr.trim()
            )));
        }
        Ok(())
    }

    async fn probe(&self, path: &Path) -> Result<MediaMetadata> {
        let output = Command::new(&self.ffprobe_path)
            .args([
                "-v",
                "error",
                "-print_format",
                "json",
                "-show_format",
                "-show_streams",
            ])
            .arg(path)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| TesseraError::probe(format!("failed to run {}: {e}", self.ffprobe_path)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(TesseraError::probe(format!(
                "ffprobe exited with {}: {}",
                output.status,
                stderr.trim()
            )));
        }

        parse_probe_output(&output.stdout)
    }
}

#[derive(Debug, Default, Deserialize)]
struct ProbeDocument {
    #[serde(default)]
    format: Option<ProbeFormat>,
    #[serde(default)]
    streams: Vec<ProbeStream>,
}

#[derive(Debug, Default, Deserialize)]
struct ProbeFormat {
    format_name: Option<String>,
    format_long_name: Option<String>,
    duration: Option<String>,
    size: Option<String>,
    bit_rate: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ProbeStream {
    codec_type: Option<String>,
    codec_name: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    avg_frame_rate: Option<String>,
}

/// Decode `ffprobe -print_format json` output.
pub fn parse_probe_output(stdout: &[u8]) -> Result<MediaMetadata> {
    let raw: serde_json::Value = serde_json::from_slice(stdout)
        .map_err(|e| TesseraError::probe(format!("invalid ffprobe output: {e}")))?;
    let doc: ProbeDocument = serde_json::from_value(raw.clone())
        .map_err(|e| TesseraError::probe(format!("unexpected ffprobe output: {e}")))?;

    let format = doc.format.unwrap_or_default();
    let video = doc
        .streams
        .into_iter()
        .find(|s| s.codec_type.as_deref() == Some("video"))
        .map(|s| VideoStreamInfo {
            codec: s.codec_name,
            width: s.width,
            height: s.height,
            frame_rate: s.avg_frame_rate.as_deref().and_then(parse_frame_rate),
        });

    Ok(MediaMetadata {
        format_name: format.format_name,
        format_long_name: format.format_long_name,
        duration_secs: format.duration.and_then(|d| d.parse().ok()),
        size_bytes: format.size.and_then(|s| s.parse().ok()),
        bit_rate: format.bit_rate.and_then(|b| b.parse().ok()),
        video,
        raw,
    })
}

/// Parse an ffprobe rational such as `30000/1001`. Zero denominators yield
/// `None`.
pub fn parse_frame_rate(rate: &str) -> Option<f64> {
    match rate.split_once('/') {
        Some((num, den)) => {
            let num: f64 = num.trim().parse().ok()?;
            let den: f64 = den.trim().parse().ok()?;
            (den != 0.0).then(|| num / den)
        }
        None => rate.trim().parse().ok(),
    }
}
