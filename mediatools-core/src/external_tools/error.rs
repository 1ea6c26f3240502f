//! Error types for tool provisioning.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

use super::types::{Os, ToolId};

/// Top-level error for single-tool provisioning operations.
#[derive(Debug, Error)]
pub enum ProvisionError {
    #[error("{tool} is not supported on {os}")]
    UnsupportedPlatform { tool: ToolId, os: String },
    #[error("Download failed: {0}")]
    Download(#[from] DownloadError),
    #[error("Extraction failed: {0}")]
    Extraction(#[from] ExtractionError),
    #[error("Failed to set permissions on {}: {source}", path.display())]
    Permission {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl ProvisionError {
    pub(crate) fn unsupported(tool: ToolId, os: Option<Os>) -> Self {
        Self::UnsupportedPlatform {
            tool,
            os: os
                .map(|os| os.to_string())
                .unwrap_or_else(|| std::env::consts::OS.to_string()),
        }
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Failure of a single mirror download, or of the whole mirror list.
#[derive(Debug, Error)]
pub enum DownloadError {
    #[error("HTTP {status} from {url}")]
    Http { url: String, status: u16 },
    #[error("Network error fetching {url}: {source}")]
    Network {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("Timed out fetching {url}")]
    Timeout { url: String },
    #[error("Failed to write {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("No mirror URLs configured")]
    NoMirrors,
}

impl DownloadError {
    /// Classifies a reqwest failure for `url`.
    pub(crate) fn from_reqwest(url: &str, source: reqwest::Error) -> Self {
        if source.is_timeout() {
            Self::Timeout {
                url: url.to_string(),
            }
        } else if let Some(status) = source.status() {
            Self::Http {
                url: url.to_string(),
                status: status.as_u16(),
            }
        } else {
            Self::Network {
                url: url.to_string(),
                source,
            }
        }
    }

    /// HTTP status code, when the failure was a non-2xx response.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::Http { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Failure opening an archive or locating the tool inside it.
#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("Failed to open archive {}: {source}", path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Unreadable archive: {0}")]
    Read(String),
    #[error("No entry matching {tool} found in archive")]
    NoMatchingEntry { tool: String },
    #[error("Failed to write {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl From<zip::result::ZipError> for ExtractionError {
    fn from(err: zip::result::ZipError) -> Self {
        Self::Read(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unsupported_message_names_tool_and_os() {
        let err = ProvisionError::unsupported(ToolId::Ffmpeg, Some(Os::Macos));
        assert_eq!(err.to_string(), "ffmpeg is not supported on macos");
    }

    #[test]
    fn test_http_error_status_code() {
        let err = DownloadError::Http {
            url: "https://example.com/yt-dlp".to_string(),
            status: 500,
        };
        assert_eq!(err.status_code(), Some(500));
        assert_eq!(err.to_string(), "HTTP 500 from https://example.com/yt-dlp");
        assert_eq!(DownloadError::NoMirrors.status_code(), None);
    }

    #[test]
    fn test_download_error_wraps_into_provision_error() {
        let err: ProvisionError = DownloadError::Timeout {
            url: "https://example.com".to_string(),
        }
        .into();
        assert!(matches!(err, ProvisionError::Download(DownloadError::Timeout { .. })));
    }
}
