use std::time::Duration;

use reqwest::StatusCode;

#[derive(Debug, thiserror::Error)]
pub enum TesseraError {
    #[error("usage error: {reason}")]
    Usage { reason: String },

    #[error("page locator timed out after {timeout:?} for {page}")]
    LocatorTimeout { page: String, timeout: Duration },

    #[error("no manifest URL found on page {page}")]
    LocatorNotFound { page: String },

    #[error("manifest unreachable at {url}: {reason}")]
    ManifestUnreachable { url: String, reason: String },

    #[error("manifest at {url} lists no segments")]
    ManifestEmpty { url: String },

    #[error("failed to decode manifest at {url}: {reason}")]
    ManifestDecode { url: String, reason: String },

    #[error("segment {index} download failed: {reason}")]
    SegmentDownload {
        index: usize,
        reason: String,
        retryable: bool,
    },

    #[error("no segment groups observed after {attempts} attempts")]
    NoSegmentsStabilized { attempts: u32 },

    #[error("nothing to assemble: 0 of {total} segments downloaded")]
    NothingToAssemble { total: usize },

    #[error("encoder failed: {reason}")]
    EncoderFailed { reason: String },

    #[error("metadata probe failed: {reason}")]
    Probe { reason: String },

    #[error("invalid URL `{input}`: {reason}")]
    InvalidUrl { input: String, reason: String },

    #[error("request failed with HTTP {status} for {url}")]
    HttpStatus { status: StatusCode, url: String },

    #[error("HTTP request failed: {source}")]
    Network {
        #[from]
        source: reqwest::Error,
    },

    #[error("I/O error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },

    #[error("internal error: {reason}")]
    Internal { reason: String },
}

pub type Result<T, E = TesseraError> = std::result::Result<T, E>;

impl TesseraError {
    pub fn usage(reason: impl Into<String>) -> Self {
        Self::Usage {
            reason: reason.into(),
        }
    }

    pub fn invalid_url(input: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidUrl {
            input: input.into(),
            reason: reason.into(),
        }
    }

    pub fn http_status(status: StatusCode, url: impl Into<String>) -> Self {
        Self::HttpStatus {
            status,
            url: url.into(),
        }
    }

    pub fn encoder_failed(reason: impl Into<String>) -> Self {
        Self::EncoderFailed {
            reason: reason.into(),
        }
    }

    pub fn probe(reason: impl Into<String>) -> Self {
        Self::Probe {
            reason: reason.into(),
        }
    }

    pub fn is_retryable(&self) -> bool {
        match self {
            Self::HttpStatus { status, .. } => {
                status.is_server_error() || *status == StatusCode::TOO_MANY_REQUESTS
            }
            Self::Network { source } => {
                source.is_connect()
                    || source.is_timeout()
                    || source.is_request()
                    || source.is_body()
                    || source.is_decode()
            }
            Self::SegmentDownload { retryable, .. } => *retryable,
            Self::Io { .. } | Self::ManifestUnreachable { .. } => true,
            Self::Usage { .. }
            | Self::LocatorTimeout { .. }
            | Self::LocatorNotFound { .. }
            | Self::ManifestEmpty { .. }
            | Self::ManifestDecode { .. }
            | Self::NoSegmentsStabilized { .. }
            | Self::NothingToAssemble { .. }
            | Self::EncoderFailed { .. }
            | Self::Probe { .. }
            | Self::InvalidUrl { .. }
            | Self::Internal { .. } => false,
        }
    }

    /// Process exit status for a run that ended with this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Usage { .. } => 2,
            Self::LocatorNotFound { .. } => 3,
            Self::LocatorTimeout { .. } => 4,
            Self::NothingToAssemble { .. } | Self::NoSegmentsStabilized { .. } => 5,
            Self::EncoderFailed { .. } => 6,
            _ => 1,
        }
    }
}
