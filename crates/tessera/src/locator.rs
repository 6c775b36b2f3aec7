//! Page locator: resolves a page identifier to the manifest URL that drives
//! the rest of the run.

use std::sync::LazyLock;
use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use reqwest::Client;
use tracing::{debug, error, info};

use crate::config::LocatorPattern;
use crate::error::{Result, TesseraError};

/// Absolute URLs embedded in markup or script, including JSON-escaped ones.
static EMBEDDED_URL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"https?:(?:\\?/){2}[^\s"'<>`]+"#).unwrap());

impl LocatorPattern {
    pub fn matches(&self, url: &str) -> bool {
        self.required_fragments.iter().all(|f| url.contains(f.as_str()))
    }

    /// Swap the first occurrence of the subtitle variant for the video variant.
    pub fn rewrite(&self, url: &str) -> String {
        url.replacen(&self.rewrite_from, &self.rewrite_to, 1)
    }
}

#[async_trait]
pub trait PageLocator: Send + Sync {
    /// Manifest URL for `page`, or `None` when the page exposes none.
    async fn locate(&self, page: &str) -> Result<Option<String>>;
}

/// Treats the page identifier as the manifest URL itself.
#[derive(Debug, Clone, Default)]
pub struct DirectLocator {
    pattern: LocatorPattern,
}

impl DirectLocator {
    pub fn new(pattern: LocatorPattern) -> Self {
        Self { pattern }
    }
}

#[async_trait]
impl PageLocator for DirectLocator {
    async fn locate(&self, page: &str) -> Result<Option<String>> {
        Ok(Some(self.pattern.rewrite(page)))
    }
}

/// Fetches the page and takes the first embedded URL that matches the
/// configured pattern.
pub struct HttpPageLocator {
    client: Client,
    pattern: LocatorPattern,
}

impl HttpPageLocator {
    pub fn new(client: Client, pattern: LocatorPattern) -> Self {
        Self { client, pattern }
    }

    /// First pattern match in `body`, already rewritten.
    pub fn find_in_body(&self, body: &str) -> Option<String> {
        EMBEDDED_URL
            .find_iter(body)
            .map(|m| m.as_str().replace(r"\/", "/").replace("&amp;", "&"))
            .find(|candidate| self.pattern.matches(candidate))
            .map(|candidate| self.pattern.rewrite(&candidate))
    }
}

#[async_trait]
impl PageLocator for HttpPageLocator {
    async fn locate(&self, page: &str) -> Result<Option<String>> {
        if self.pattern.matches(page) {
            return Ok(Some(self.pattern.rewrite(page)));
        }

        debug!(page, "Fetching page to find stream URL");
        let response = self.client.get(page).send().await?;
        if !response.status().is_success() {
            return Err(TesseraError::http_status(response.status(), page));
        }
        let body = response.text().await?;
        Ok(self.find_in_body(&body))
    }
}

/// Run `locator` once for `page`, bounded by `timeout`.
pub async fn locate_manifest(
    locator: &dyn PageLocator,
    page: &str,
    timeout: Duration,
) -> Result<String> {
    info!(page, "Looking up stream URL");
    match tokio::time::timeout(timeout, locator.locate(page)).await {
        Ok(Ok(Some(url))) => {
            info!(url = %url, "Found stream URL");
            Ok(url)
        }
        Ok(Ok(None)) => Err(TesseraError::LocatorNotFound {
            page: page.to_string(),
        }),
        Ok(Err(e)) => {
            error!(page, error = %e, "Failed to load page");
            Err(TesseraError::LocatorNotFound {
                page: page.to_string(),
            })
        }
        Err(_) => Err(TesseraError::LocatorTimeout {
            page: page.to_string(),
            timeout,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::TestServer;
    use axum::http::StatusCode;

    const SUBTITLE_URL: &str =
        "https://cdn.example.com/share/streaming/abc/M3U8_SUBTITLE_SRT/index.m3u8?x=1&y=2";

    fn locator() -> HttpPageLocator {
        HttpPageLocator::new(Client::new(), LocatorPattern::default())
    }

    #[test]
    fn finds_escaped_url_and_rewrites_variant() {
        let body = format!(
            r#"<script>var cfg = {{"other":"https:\/\/cdn.example.com\/img.png","src":"{}"}};</script>"#,
            SUBTITLE_URL.replace('/', r"\/").replace('&', "&amp;")
        );
        assert_eq!(
            locator().find_in_body(&body).as_deref(),
            Some("https://cdn.example.com/share/streaming/abc/M3U8_FLV_264_480/index.m3u8?x=1&y=2")
        );
    }

    #[test]
    fn ignores_urls_missing_a_fragment() {
        let body = r#"<a href="https://cdn.example.com/share/streaming/abc/M3U8_FLV_264_480/index.m3u8">"#;
        assert_eq!(locator().find_in_body(body), None);
    }

    #[tokio::test]
    async fn http_locator_scans_page() {
        let server = TestServer::start()
            .with_text(
                "/watch",
                StatusCode::OK,
                format!("<html><video src=\"{SUBTITLE_URL}\"></video></html>"),
            )
            .serve()
            .await;

        let url = locate_manifest(&locator(), &server.url("/watch"), Duration::from_secs(5))
            .await
            .unwrap();
        assert!(url.contains("M3U8_FLV_264_480"));
    }

    #[tokio::test]
    async fn page_without_match_is_not_found() {
        let server = TestServer::start()
            .with_text("/empty", StatusCode::OK, "<html></html>".to_string())
            .with_text("/gone", StatusCode::NOT_FOUND, String::new())
            .serve()
            .await;

        for path in ["/empty", "/gone"] {
            let err = locate_manifest(&locator(), &server.url(path), Duration::from_secs(5))
                .await
                .unwrap_err();
            assert!(matches!(err, TesseraError::LocatorNotFound { .. }), "{path}");
            assert_eq!(err.exit_code(), 3);
        }
    }

    struct NeverLocator;

    #[async_trait]
    impl PageLocator for NeverLocator {
        async fn locate(&self, _page: &str) -> Result<Option<String>> {
            std::future::pending().await
        }
    }

    #[tokio::test]
    async fn slow_locator_times_out() {
        let err = locate_manifest(&NeverLocator, "https://page", Duration::from_millis(20))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            TesseraError::LocatorTimeout { timeout, .. } if timeout == Duration::from_millis(20)
        ));
        assert!(err.to_string().contains("20ms"), "{err}");
        assert_eq!(err.exit_code(), 4);
    }

    #[tokio::test]
    async fn direct_locator_passes_manifest_through() {
        let url = locate_manifest(
            &DirectLocator::default(),
            "https://cdn.example.com/live.m3u8",
            Duration::from_secs(1),
        )
        .await
        .unwrap();
        assert_eq!(url, "https://cdn.example.com/live.m3u8");
    }
}
