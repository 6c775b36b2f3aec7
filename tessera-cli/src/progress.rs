//! Terminal progress bars fed by the engine's per-segment progress events.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use tessera_engine::{ProgressCallback, SegmentProgress, SegmentState};

pub struct SegmentBars {
    multi: MultiProgress,
    style: ProgressStyle,
    bars: Mutex<HashMap<usize, ProgressBar>>,
}

impl SegmentBars {
    pub fn new() -> Self {
        let style = ProgressStyle::with_template("{prefix:>12} [{bar:30.cyan/blue}] {pos:>3}% {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=> ");
        Self {
            multi: MultiProgress::new(),
            style,
            bars: Mutex::new(HashMap::new()),
        }
    }

    pub fn into_callback(self) -> ProgressCallback {
        let bars = Arc::new(self);
        Arc::new(move |event| bars.update(event))
    }

    fn update(&self, event: SegmentProgress) {
        let Ok(mut bars) = self.bars.lock() else {
            return;
        };
        let bar = bars.entry(event.index).or_insert_with(|| {
            let bar = self.multi.add(ProgressBar::new(100));
            bar.set_style(self.style.clone());
            bar.set_prefix(format!("Segment {}", event.index + 1));
            bar
        });

        bar.set_position(u64::from(event.percent));
        match event.state {
            SegmentState::Downloading => {}
            SegmentState::Complete => bar.finish_with_message("done"),
            SegmentState::Failed => bar.abandon_with_message("failed"),
        }
    }
}
