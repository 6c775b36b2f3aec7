//! Tessera: reconstructs a finite media asset that an origin serves as a
//! rotating segmented stream.
//!
//! The origin's manifest only ever lists a sliding window of segments, so a
//! single fetch cannot be trusted to be complete. Tessera polls the manifest
//! until every distinct segment group has been seen enough times, downloads
//! one representative per group, and concatenates them in group order.
//!
//! ## Component Overview
//!
//! - `query`: range normalization and output-name derivation
//! - `manifest`: manifest fetching and decoding into segment descriptors
//! - `stabilizer`: polls the manifest until the segment set stops changing
//! - `fetcher`: bounded concurrent segment downloads with progress events
//! - `assembler`: concatenation of completed downloads plus cleanup
//! - `locator`: resolves a page identifier to its manifest URL
//! - `orchestrator`: runs the whole pipeline for one page

pub mod arena;
pub mod assembler;
pub mod config;
pub mod encoder;
pub mod error;
pub mod fetcher;
pub mod locator;
pub mod manifest;
pub mod orchestrator;
pub mod progress;
pub mod query;
pub mod retry;
pub mod stabilizer;

#[cfg(test)]
mod test_support;

pub use arena::RunArena;
pub use assembler::{Assembler, AssemblyOutcome};
pub use config::{LocatorPattern, TesseraConfig, TesseraConfigBuilder};
pub use encoder::{ConcatJob, Encoder, FfmpegEncoder, MediaMetadata, VideoStreamInfo};
pub use error::{Result, TesseraError};
pub use fetcher::{DownloadResult, DownloadStatus, SegmentFetcher};
pub use locator::{DirectLocator, HttpPageLocator, PageLocator, locate_manifest};
pub use manifest::{HttpManifestSource, ManifestSource, SegmentDescriptor};
pub use orchestrator::{Orchestrator, RunReport};
pub use progress::{ProgressCallback, SegmentProgress, SegmentState};
pub use query::{normalize_range, output_file_name};
pub use retry::RetryPolicy;
pub use stabilizer::{StabilizedSegment, StabilizedSegmentSet, Stabilizer};
