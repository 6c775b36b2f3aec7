// Manifest fetcher: one poll of the origin playlist, decoded into segment descriptors.

use std::sync::LazyLock;
use std::time::Duration;

use async_trait::async_trait;
use m3u8_rs::{Playlist, parse_playlist_res};
use regex::Regex;
use reqwest::Client;
use tracing::{debug, error, trace};
use url::Url;

use crate::error::{Result, TesseraError};

static GROUP_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"_1138_(\d+)_ts").expect("group pattern is valid"));

/// One entry of a manifest snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct SegmentDescriptor {
    /// Absolute segment location.
    pub url: String,
    /// Identity shared by every entry carrying the same content across polls.
    pub group_id: String,
    /// Seconds.
    pub declared_duration: f64,
    /// Advisory `size` query parameter, 0 when absent.
    pub size: u64,
    /// Advisory `range` query parameter, `0-0` when absent.
    pub range: String,
}

/// Group identity for the segment at `index` of a snapshot.
///
/// URLs carrying the `_1138_<digits>_ts` token share the token as identity.
/// Anything else gets `unknown_<index>`.
pub fn group_id_for(url: &str, index: usize) -> String {
    match GROUP_PATTERN.captures(url) {
        Some(caps) => format!("_1138_{}_ts", &caps[1]),
        None => format!("unknown_{index}"),
    }
}

/// Numeric component of a group id, used for playback ordering.
///
/// Ids without the token, or whose digits overflow, order as 0.
pub fn group_number(group_id: &str) -> u64 {
    GROUP_PATTERN
        .captures(group_id)
        .and_then(|caps| caps[1].parse().ok())
        .unwrap_or(0)
}

/// Decode a playlist body fetched from `manifest_url`.
pub fn parse_manifest(
    body: &[u8],
    manifest_url: &Url,
    fallback_duration: f64,
) -> Result<Vec<SegmentDescriptor>> {
    let playlist = match parse_playlist_res(body) {
        Ok(Playlist::MediaPlaylist(playlist)) => playlist,
        Ok(Playlist::MasterPlaylist(_)) => {
            return Err(TesseraError::ManifestDecode {
                url: manifest_url.to_string(),
                reason: "expected a media playlist, got a master playlist".to_string(),
            });
        }
        Err(e) => {
            return Err(TesseraError::ManifestDecode {
                url: manifest_url.to_string(),
                reason: e.to_string(),
            });
        }
    };

    let mut segments = Vec::with_capacity(playlist.segments.len());
    for (index, segment) in playlist.segments.iter().enumerate() {
        if segment.uri.is_empty() {
            continue;
        }
        let resolved = if segment.uri.starts_with("http://") || segment.uri.starts_with("https://")
        {
            Url::parse(&segment.uri)
        } else {
            manifest_url.join(&segment.uri)
        }
        .map_err(|e| TesseraError::ManifestDecode {
            url: manifest_url.to_string(),
            reason: format!("unresolvable segment URI {}: {e}", segment.uri),
        })?;

        let mut size = 0;
        let mut range = "0-0".to_string();
        for (key, value) in resolved.query_pairs() {
            match key.as_ref() {
                "size" => size = value.parse().unwrap_or(0),
                "range" => range = value.into_owned(),
                _ => {}
            }
        }

        let declared_duration = if segment.duration > 0.0 {
            f64::from(segment.duration)
        } else {
            fallback_duration
        };

        let url = resolved.to_string();
        trace!(index, url = %url, "Decoded manifest entry");
        segments.push(SegmentDescriptor {
            group_id: group_id_for(&url, index),
            url,
            declared_duration,
            size,
            range,
        });
    }

    if segments.is_empty() {
        return Err(TesseraError::ManifestEmpty {
            url: manifest_url.to_string(),
        });
    }

    Ok(segments)
}

/// A source of manifest snapshots.
///
/// Never fails: transport, decode and empty-list failures all come back as an
/// empty snapshot, which the caller treats as "retry".
#[async_trait]
pub trait ManifestSource: Send + Sync {
    async fn fetch(&self, manifest_url: &str) -> Vec<SegmentDescriptor>;
}

pub struct HttpManifestSource {
    client: Client,
    timeout: Duration,
    fallback_duration: f64,
}

impl HttpManifestSource {
    pub fn new(client: Client, timeout: Duration, fallback_duration: f64) -> Self {
        Self {
            client,
            timeout,
            fallback_duration,
        }
    }

    pub async fn try_fetch(&self, manifest_url: &str) -> Result<Vec<SegmentDescriptor>> {
        let url = Url::parse(manifest_url)
            .map_err(|e| TesseraError::invalid_url(manifest_url, e.to_string()))?;

        let unreachable = |reason: String| TesseraError::ManifestUnreachable {
            url: manifest_url.to_string(),
            reason,
        };

        let response = self
            .client
            .get(url.clone())
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| unreachable(e.to_string()))?;

        if !response.status().is_success() {
            return Err(unreachable(format!("HTTP {}", response.status())));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| unreachable(e.to_string()))?;

        let segments = parse_manifest(&body, &url, self.fallback_duration)?;
        debug!(url = %manifest_url, segments = segments.len(), "Fetched manifest snapshot");
        Ok(segments)
    }
}

#[async_trait]
impl ManifestSource for HttpManifestSource {
    async fn fetch(&self, manifest_url: &str) -> Vec<SegmentDescriptor> {
        match self.try_fetch(manifest_url).await {
            Ok(segments) => segments,
            Err(e) => {
                error!(url = %manifest_url, error = %e, "Failed to read manifest");
                Vec::new()
            }
        }
    }
}
