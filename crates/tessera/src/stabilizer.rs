// Stabilization poller: polls the manifest until every distinct segment group
// has been observed often enough to trust its identity.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::manifest::{ManifestSource, SegmentDescriptor, group_number};
use crate::query::normalize_range;

/// Aggregated sightings of one group across polls.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupObservation {
    pub group_id: String,
    /// Manifest entries seen for this group; only ever grows.
    pub count: u32,
    /// URL of the first sighting. Later sightings never replace it.
    pub representative_url: String,
}

/// Observation map owned by a single `stabilize` call.
///
/// Groups keep first-seen order, which is the tie-break when sorting.
#[derive(Debug, Default)]
struct GroupTally {
    groups: Vec<GroupObservation>,
    by_id: HashMap<String, usize>,
}

impl GroupTally {
    fn fold(&mut self, segments: &[SegmentDescriptor]) {
        for segment in segments {
            match self.by_id.get(&segment.group_id) {
                Some(&slot) => self.groups[slot].count += 1,
                None => {
                    self.by_id
                        .insert(segment.group_id.clone(), self.groups.len());
                    self.groups.push(GroupObservation {
                        group_id: segment.group_id.clone(),
                        count: 1,
                        representative_url: segment.url.clone(),
                    });
                }
            }
        }
    }

    fn is_stable(&self, repeat_threshold: u32) -> bool {
        !self.groups.is_empty() && self.groups.iter().all(|g| g.count >= repeat_threshold)
    }

    fn into_sorted(mut self) -> Vec<GroupObservation> {
        self.groups.sort_by_key(|g| group_number(&g.group_id));
        self.groups
    }
}

/// One entry of the stabilized set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StabilizedSegment {
    pub group_id: String,
    pub count: u32,
    /// Representative URL as first observed.
    pub original_url: String,
    /// Representative URL after range normalization.
    pub url: String,
}

/// Terminal output of the poller, in playback order.
#[derive(Debug, Clone, Default)]
pub struct StabilizedSegmentSet {
    pub segments: Vec<StabilizedSegment>,
    /// Manifest polls used, empty ones included.
    pub attempts: u32,
    /// False when the attempt budget ran out first; `segments` is then a
    /// best-effort partial set.
    pub stabilized: bool,
}

impl StabilizedSegmentSet {
    pub fn urls(&self) -> Vec<String> {
        self.segments.iter().map(|s| s.url.clone()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    /// Log the group repeat summary, one line per group.
    pub fn log_summary(&self, repeat_threshold: u32) {
        info!(
            repeat_threshold,
            attempts = self.attempts,
            stabilized = self.stabilized,
            groups = self.segments.len(),
            "Group repeat summary"
        );
        for (idx, segment) in self.segments.iter().enumerate() {
            info!(
                "[{}] {} - seen {} times",
                idx + 1,
                segment.group_id,
                segment.count
            );
            debug!(original = %segment.original_url, normalized = %segment.url, "Representative URL");
        }
    }
}

pub struct Stabilizer {
    source: Arc<dyn ManifestSource>,
    empty_poll_backoff: Duration,
}

impl Stabilizer {
    pub fn new(source: Arc<dyn ManifestSource>, empty_poll_backoff: Duration) -> Self {
        Self {
            source,
            empty_poll_backoff,
        }
    }

    /// Poll `manifest_url` until every group seen so far has at least
    /// `repeat_threshold` sightings, or `max_attempts` polls have been made.
    ///
    /// Polls back to back while snapshots keep arriving; an empty snapshot is
    /// followed by the configured backoff and still uses up an attempt.
    /// Exhausting the budget is not an error: whatever was observed is
    /// returned with `stabilized == false`.
    pub async fn stabilize(
        &self,
        manifest_url: &str,
        repeat_threshold: u32,
        max_attempts: u32,
    ) -> StabilizedSegmentSet {
        let mut tally = GroupTally::default();
        let mut attempts = 0;
        let mut stabilized = false;

        while attempts < max_attempts {
            attempts += 1;
            debug!(attempt = attempts, "Fetching segments");
            let segments = self.source.fetch(manifest_url).await;

            if segments.is_empty() {
                warn!(attempt = attempts, "No segments found in playlist");
                if attempts < max_attempts {
                    tokio::time::sleep(self.empty_poll_backoff).await;
                }
                continue;
            }

            tally.fold(&segments);
            if tally.is_stable(repeat_threshold) {
                stabilized = true;
                break;
            }
        }

        if !stabilized {
            warn!(
                attempts,
                groups = tally.groups.len(),
                "Attempt budget exhausted before every group reached the repeat threshold"
            );
        }

        let segments = tally
            .into_sorted()
            .into_iter()
            .map(|group| StabilizedSegment {
                url: normalize_range(&group.representative_url),
                original_url: group.representative_url,
                group_id: group.group_id,
                count: group.count,
            })
            .collect();

        StabilizedSegmentSet {
            segments,
            attempts,
            stabilized,
        }
    }
}
