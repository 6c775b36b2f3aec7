//! Per-segment download progress.
//!
//! Downloads report through a [`ProgressCallback`]. To keep event volume
//! bounded, a [`ProgressTracker`] only lets through updates that cross a
//! multiple of the configured step, plus one terminal event per segment.

use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SegmentState {
    Downloading,
    Complete,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SegmentProgress {
    /// Input index of the segment.
    pub index: usize,
    /// 0..=100
    pub percent: u8,
    pub state: SegmentState,
    pub bytes: u64,
}

pub type ProgressCallback = Arc<dyn Fn(SegmentProgress) + Send + Sync + 'static>;

#[derive(Debug, Clone)]
pub struct ProgressTracker {
    index: usize,
    step: u8,
    total: Option<u64>,
    downloaded: u64,
    last_reported: u8,
}

impl ProgressTracker {
    /// `total` is the declared content length, if any. Without it no
    /// intermediate events are produced.
    pub fn new(index: usize, step: u8, total: Option<u64>) -> Self {
        Self {
            index,
            step: step.clamp(1, 100),
            total: total.filter(|t| *t > 0),
            downloaded: 0,
            last_reported: 0,
        }
    }

    pub fn downloaded(&self) -> u64 {
        self.downloaded
    }

    /// Account for `len` more bytes. Returns an event when a step boundary was
    /// crossed.
    pub fn advance(&mut self, len: u64) -> Option<SegmentProgress> {
        self.downloaded += len;
        let total = self.total?;
        let percent = (self.downloaded.saturating_mul(100) / total).min(100) as u8;
        if percent >= 100 || percent / self.step <= self.last_reported / self.step {
            // 100% is left to `complete`, which always fires.
            return None;
        }
        self.last_reported = percent;
        Some(self.event(percent, SegmentState::Downloading))
    }

    pub fn complete(&mut self) -> SegmentProgress {
        self.last_reported = 100;
        self.event(100, SegmentState::Complete)
    }

    pub fn fail(&self) -> SegmentProgress {
        self.event(0, SegmentState::Failed)
    }

    fn event(&self, percent: u8, state: SegmentState) -> SegmentProgress {
        SegmentProgress {
            index: self.index,
            percent,
            state,
            bytes: self.downloaded,
        }
    }
}
