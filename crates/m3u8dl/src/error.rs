use reqwest::StatusCode;
use std::sync::Arc;

/// Coarse classification of a [`DownloadError`], used by the job to decide
/// whether a failure is per-segment or fatal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Network,
    Parse,
    Crypto,
    Io,
    Cancelled,
}

// Custom error type for download operations
#[derive(Debug, thiserror::Error, Clone)]
pub enum DownloadError {
    #[error("Network error: {source}")]
    Network {
        #[from]
        source: Arc<reqwest::Error>,
    },

    #[error("Server returned status code {status} for {url}")]
    HttpStatus { status: StatusCode, url: String },

    #[error("Empty response body from {0}")]
    EmptyBody(String),

    #[error("Playlist error: {0}")]
    Playlist(String),

    #[error("Decryption error: {0}")]
    Decryption(String),

    #[error("Unsupported encryption method: {0}")]
    UnsupportedEncryption(String),

    #[error("I/O error: {source}")]
    Io {
        #[from]
        source: Arc<std::io::Error>,
    },

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("No segments downloaded ({failed} failed)")]
    NoSegmentsDownloaded { failed: usize },

    #[error("Operation cancelled")]
    Cancelled,
}

// Manual implementation of From<reqwest::Error> for DownloadError
// because of the Arc wrapping.
impl From<reqwest::Error> for DownloadError {
    fn from(err: reqwest::Error) -> Self {
        DownloadError::Network {
            source: Arc::new(err),
        }
    }
}

// Manual implementation of From<std::io::Error> for DownloadError
impl From<std::io::Error> for DownloadError {
    fn from(err: std::io::Error) -> Self {
        DownloadError::Io {
            source: Arc::new(err),
        }
    }
}

impl From<url::ParseError> for DownloadError {
    fn from(err: url::ParseError) -> Self {
        DownloadError::InvalidUrl(err.to_string())
    }
}

impl DownloadError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            DownloadError::Network { .. }
            | DownloadError::HttpStatus { .. }
            | DownloadError::EmptyBody(_)
            | DownloadError::NoSegmentsDownloaded { .. } => ErrorCategory::Network,
            DownloadError::Playlist(_)
            | DownloadError::InvalidUrl(_)
            | DownloadError::Config(_) => ErrorCategory::Parse,
            DownloadError::Decryption(_) | DownloadError::UnsupportedEncryption(_) => {
                ErrorCategory::Crypto
            }
            DownloadError::Io { .. } => ErrorCategory::Io,
            DownloadError::Cancelled => ErrorCategory::Cancelled,
        }
    }

    /// Whether another attempt at the same request could succeed.
    pub fn is_retryable(&self) -> bool {
        !matches!(
            self,
            DownloadError::UnsupportedEncryption(_)
                | DownloadError::Cancelled
                | DownloadError::InvalidUrl(_)
                | DownloadError::Config(_)
                | DownloadError::NoSegmentsDownloaded { .. }
        )
    }
}
