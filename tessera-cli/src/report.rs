use tessera_engine::{MediaMetadata, RunReport};
use tracing::{debug, info, warn};

pub fn log_run_summary(report: &RunReport) {
    info!(
        "Merged {}/{} segments into {}",
        report.outcome.segments_used,
        report.downloads.len(),
        report.output().display()
    );
    for failed in report.failed_downloads() {
        warn!(
            "Segment {} was left out: {}",
            failed.index + 1,
            failed.error.as_deref().unwrap_or("unknown error")
        );
    }
    match &report.outcome.metadata {
        Some(metadata) => log_metadata(metadata),
        None => warn!(
            "Failed to get video metadata: {}",
            report.outcome.probe_error.as_deref().unwrap_or("unknown error")
        ),
    }
}

fn log_metadata(metadata: &MediaMetadata) {
    info!("Video metadata:");
    if let Some(name) = metadata
        .format_long_name
        .as_deref()
        .or(metadata.format_name.as_deref())
    {
        info!("- Format: {name}");
    }
    if let Some(duration) = metadata.duration_secs {
        info!("- Duration: {duration} seconds");
    }
    if let Some(size) = metadata.size_bytes {
        info!("- Size: {} MB", format_megabytes(size));
    }
    if let Some(bit_rate) = metadata.bit_rate {
        info!("- Bitrate: {bit_rate} bps");
    }
    if let Some(video) = &metadata.video {
        info!(
            "- Video: {} {}x{} @ {} fps",
            video.codec.as_deref().unwrap_or("unknown"),
            video.width.map_or_else(|| "?".to_string(), |w| w.to_string()),
            video.height.map_or_else(|| "?".to_string(), |h| h.to_string()),
            video
                .frame_rate
                .map_or_else(|| "?".to_string(), |fps| format!("{fps:.2}"))
        );
    }
    match serde_json::to_string_pretty(&metadata.raw) {
        Ok(raw) => debug!("Full metadata: {raw}"),
        Err(e) => debug!("Full metadata unavailable: {e}"),
    }
}

fn format_megabytes(bytes: u64) -> String {
    format!("{:.2}", bytes as f64 / (1024.0 * 1024.0))
}
