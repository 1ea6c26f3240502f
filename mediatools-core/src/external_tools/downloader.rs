//! Async file downloader with progress reporting and mirror fallback.
//!
//! This module provides streaming download functionality using reqwest,
//! with progress callbacks for UI integration and retry across an ordered
//! list of mirror URLs.

use futures::StreamExt;
use std::path::Path;
use std::time::Duration;
use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

use super::error::{DownloadError, ProvisionError};
use crate::config::ProvisionerConfig;

// ============================================================================
// HTTP Client
// ============================================================================

/// Builds the HTTP client used for all tool downloads.
///
/// Redirects are followed up to `max_redirects` hops; every request is
/// bounded by the configured request and connect timeouts.
pub fn build_client(config: &ProvisionerConfig) -> Result<reqwest::Client, ProvisionError> {
    reqwest::Client::builder()
        .redirect(reqwest::redirect::Policy::limited(config.max_redirects))
        .timeout(Duration::from_secs(config.request_timeout_secs))
        .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
        .user_agent(config.user_agent.clone())
        .build()
        .map_err(|e| ProvisionError::Config(format!("Failed to build HTTP client: {}", e)))
}

// ============================================================================
// Download Progress
// ============================================================================

/// Progress information during a download.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DownloadProgress {
    /// Bytes downloaded so far.
    pub bytes_downloaded: u64,
    /// Total bytes expected (if known from Content-Length header).
    pub total_bytes: Option<u64>,
    /// Progress percentage (0.0 to 100.0), or None if total is unknown.
    pub percent: Option<f32>,
}

impl DownloadProgress {
    pub fn new(bytes_downloaded: u64, total_bytes: Option<u64>) -> Self {
        let percent = total_bytes.map(|total| {
            if total > 0 {
                (bytes_downloaded as f32 / total as f32) * 100.0
            } else {
                0.0
            }
        });

        Self {
            bytes_downloaded,
            total_bytes,
            percent,
        }
    }
}

// ============================================================================
// Single-URL Download
// ============================================================================

/// Downloads `url` to `dest`, streaming the body and reporting progress.
///
/// The destination is truncated before writing. Progress is reported once
/// when the response arrives and after every chunk; `percent` and
/// `total_bytes` are `None` when the server sends no Content-Length.
///
/// # Returns
///
/// The total number of bytes downloaded.
///
/// # Errors
///
/// - `Http` if the final (post-redirect) status is not 2xx.
/// - `Timeout` if the request exceeded the client's time limit.
/// - `Network` for connection-level failures.
/// - `Io` if the file cannot be created or written.
pub async fn download_file<F>(
    client: &reqwest::Client,
    url: &str,
    dest: &Path,
    progress_cb: &F,
) -> Result<u64, DownloadError>
where
    F: Fn(DownloadProgress) + ?Sized,
{
    info!("Downloading {} to {}", url, dest.display());

    let io_err = |source: std::io::Error| DownloadError::Io {
        path: dest.to_path_buf(),
        source,
    };

    if let Some(parent) = dest.parent() {
        tokio::fs::create_dir_all(parent).await.map_err(io_err)?;
    }

    let response = client
        .get(url)
        .send()
        .await
        .map_err(|e| DownloadError::from_reqwest(url, e))?;

    let status = response.status();
    if !status.is_success() {
        return Err(DownloadError::Http {
            url: url.to_string(),
            status: status.as_u16(),
        });
    }

    if response.url().as_str() != url {
        debug!("Redirected to {}", response.url());
    }

    let total_bytes = response.content_length();
    debug!("Content-Length: {:?}", total_bytes);

    let mut file = File::create(dest).await.map_err(io_err)?;

    let mut stream = response.bytes_stream();
    let mut bytes_downloaded: u64 = 0;

    progress_cb(DownloadProgress::new(0, total_bytes));

    while let Some(chunk_result) = stream.next().await {
        let chunk = chunk_result.map_err(|e| DownloadError::from_reqwest(url, e))?;

        file.write_all(&chunk).await.map_err(io_err)?;

        bytes_downloaded += chunk.len() as u64;
        progress_cb(DownloadProgress::new(bytes_downloaded, total_bytes));
    }

    file.flush().await.map_err(io_err)?;

    info!(
        "Download complete: {} bytes written to {}",
        bytes_downloaded,
        dest.display()
    );

    Ok(bytes_downloaded)
}

// ============================================================================
// Mirror Fallback
// ============================================================================

/// Downloads from the first mirror in `urls` that succeeds.
///
/// Each failure is logged and the next mirror is tried. Only the last
/// mirror's error is returned if all of them fail.
///
/// # Returns
///
/// The URL that served the file.
pub async fn download_with_retry<F>(
    client: &reqwest::Client,
    urls: &[String],
    dest: &Path,
    progress_cb: &F,
) -> Result<String, DownloadError>
where
    F: Fn(DownloadProgress) + ?Sized,
{
    let mut last_error = DownloadError::NoMirrors;

    for (index, url) in urls.iter().enumerate() {
        debug!(mirror = index + 1, of = urls.len(), url = %url, "Trying mirror");
        match download_file(client, url, dest, progress_cb).await {
            Ok(_) => return Ok(url.clone()),
            Err(e) => {
                warn!(url = %url, error = %e, "Mirror failed");
                if index + 1 < urls.len() {
                    info!("Trying next mirror...");
                }
                last_error = e;
            }
        }
    }

    Err(last_error)
}
