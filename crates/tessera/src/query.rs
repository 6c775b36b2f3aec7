//! Query-string helpers applied to representative segment URLs.
//!
//! The origin serves each segment with a `range` parameter describing the byte
//! window of the current rotation. Rewriting it to a maximal window makes every
//! representative URL fetch the whole object.

use std::path::Path;

use url::Url;

/// Returned by [`normalize_range`] for inputs it cannot treat as a URL.
/// Never eligible for fetching.
pub const INVALID_URL: &str = "[Invalid URL]";

/// Byte window that covers any real segment.
pub const WHOLE_OBJECT_RANGE: &str = "1-9999999999";

/// Output name used when the first segment carries no usable `fn` parameter.
pub const DEFAULT_OUTPUT_NAME: &str = "output.mp4";

/// Rewrite every `range` query parameter to [`WHOLE_OBJECT_RANGE`].
///
/// Parameter order and every other parameter are preserved byte for byte.
/// URLs without a query string come back unchanged. Empty input or input
/// containing whitespace or control characters yields [`INVALID_URL`].
pub fn normalize_range(raw: &str) -> String {
    if raw.is_empty() || raw.chars().any(|c| c.is_whitespace() || c.is_control()) {
        return INVALID_URL.to_string();
    }

    let Some((base, query)) = raw.split_once('?') else {
        return raw.to_string();
    };
    if query.is_empty() {
        return raw.to_string();
    }

    let rewritten = query
        .split('&')
        .map(|param| {
            if param.starts_with("range=") {
                format!("range={WHOLE_OBJECT_RANGE}")
            } else {
                param.to_string()
            }
        })
        .collect::<Vec<_>>()
        .join("&");

    format!("{base}?{rewritten}")
}

/// True when `url` may be handed to the segment fetcher.
pub fn is_fetchable(url: &str) -> bool {
    url != INVALID_URL
}

/// Derive the output file name from the `fn` query parameter of `url`.
///
/// Only the final path component of the parameter is kept, so a hostile value
/// cannot escape the output directory.
pub fn output_file_name(url: Option<&str>) -> String {
    url.and_then(|u| Url::parse(u).ok())
        .and_then(|parsed| {
            parsed
                .query_pairs()
                .find(|(key, _)| key == "fn")
                .map(|(_, value)| value.into_owned())
        })
        .and_then(|name| {
            Path::new(&name)
                .file_name()
                .and_then(|n| n.to_str())
                .map(str::trim)
                .filter(|n| !n.is_empty() && *n != "." && *n != "..")
                .map(str::to_string)
        })
        .unwrap_or_else(|| DEFAULT_OUTPUT_NAME.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rewrites_only_the_range_parameter() {
        assert_eq!(
            normalize_range("seg.ts?fn=a&range=100-200&size=5"),
            "seg.ts?fn=a&range=1-9999999999&size=5"
        );
    }

    #[test]
    fn similarly_named_parameters_are_untouched() {
        let url = "https://cdn.example.com/v_1138_4_ts?xrange=1-2&ranges=3-4&range=5-6";
        assert_eq!(
            normalize_range(url),
            "https://cdn.example.com/v_1138_4_ts?xrange=1-2&ranges=3-4&range=1-9999999999"
        );
    }

    #[test]
    fn url_without_query_is_unchanged() {
        let url = "https://cdn.example.com/segments/v_1138_1_ts";
        assert_eq!(normalize_range(url), url);
        assert_eq!(normalize_range("seg.ts?"), "seg.ts?");
    }

    #[test]
    fn normalization_is_idempotent() {
        let inputs = [
            "seg.ts?fn=a&range=100-200&size=5",
            "https://cdn.example.com/x?range=0-0&range=7-9",
            "https://cdn.example.com/x",
            "https://cdn.example.com/x?a=1&b=2",
            "bad url with spaces?range=1-2",
        ];
        for input in inputs {
            let once = normalize_range(input);
            assert_eq!(normalize_range(&once), once, "input: {input}");
        }
    }

    #[test]
    fn unusable_input_yields_sentinel() {
        assert_eq!(normalize_range(""), INVALID_URL);
        assert_eq!(normalize_range("http://x/a b?range=1-2"), INVALID_URL);
        assert!(!is_fetchable(&normalize_range("")));
        assert!(is_fetchable("http://x/a"));
    }

    #[test]
    fn output_name_comes_from_fn_parameter() {
        assert_eq!(
            output_file_name(Some("https://cdn.example.com/s?fn=My%20Video.mp4&range=1-2")),
            "My Video.mp4"
        );
    }

    #[test]
    fn output_name_falls_back_to_default() {
        assert_eq!(output_file_name(None), DEFAULT_OUTPUT_NAME);
        assert_eq!(output_file_name(Some("not a url")), DEFAULT_OUTPUT_NAME);
        assert_eq!(
            output_file_name(Some("https://cdn.example.com/s?range=1-2")),
            DEFAULT_OUTPUT_NAME
        );
        assert_eq!(
            output_file_name(Some("https://cdn.example.com/s?fn=")),
            DEFAULT_OUTPUT_NAME
        );
    }

    #[test]
    fn output_name_drops_directory_components() {
        assert_eq!(
            output_file_name(Some("https://cdn.example.com/s?fn=..%2F..%2Fetc%2Fclip.mp4")),
            "clip.mp4"
        );
        assert_eq!(
            output_file_name(Some("https://cdn.example.com/s?fn=..")),
            DEFAULT_OUTPUT_NAME
        );
    }
}
