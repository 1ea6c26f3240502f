//! Tool registry with mirror definitions.
//!
//! Holds, per tool and per OS, the ordered mirror list, the target filename
//! and the archive format (if the download is not a bare executable). The
//! registry is immutable once built and is passed explicitly to the
//! components that need it, so tests can substitute fake mirrors.

use serde::Serialize;
use std::collections::HashMap;
use url::Url;

use super::error::ProvisionError;
use super::types::{ArchiveFormat, Os, ToolId};

// ============================================================================
// Tool Spec
// ============================================================================

/// Download configuration for one tool on one OS.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ToolSpec {
    /// Mirror URLs, tried in order. Never empty.
    pub mirror_urls: Vec<String>,
    /// Filename of the executable inside the bin directories.
    pub filename: String,
    /// Archive container, or `None` for a direct binary download.
    pub archive: Option<ArchiveFormat>,
}

impl ToolSpec {
    pub fn binary(filename: &str, mirror_urls: &[&str]) -> Self {
        Self {
            mirror_urls: mirror_urls.iter().map(|u| u.to_string()).collect(),
            filename: filename.to_string(),
            archive: None,
        }
    }

    pub fn archive(filename: &str, format: ArchiveFormat, mirror_urls: &[&str]) -> Self {
        Self {
            mirror_urls: mirror_urls.iter().map(|u| u.to_string()).collect(),
            filename: filename.to_string(),
            archive: Some(format),
        }
    }

    pub fn is_archive(&self) -> bool {
        self.archive.is_some()
    }

    fn validate(&self, tool: ToolId, os: Os) -> Result<(), ProvisionError> {
        if self.mirror_urls.is_empty() {
            return Err(ProvisionError::Config(format!(
                "{} on {} has no mirror URLs",
                tool, os
            )));
        }
        if self.filename.is_empty() {
            return Err(ProvisionError::Config(format!(
                "{} on {} has an empty filename",
                tool, os
            )));
        }
        for mirror in &self.mirror_urls {
            let url = Url::parse(mirror).map_err(|e| {
                ProvisionError::Config(format!("Invalid mirror URL {}: {}", mirror, e))
            })?;
            if url.scheme() != "https" && url.scheme() != "http" {
                return Err(ProvisionError::Config(format!(
                    "Mirror URL must use HTTP(S): {}",
                    mirror
                )));
            }
        }
        Ok(())
    }
}

// ============================================================================
// Registry
// ============================================================================

/// Immutable map of `(tool, os)` to [`ToolSpec`].
#[derive(Debug, Clone, Default)]
pub struct ToolRegistry {
    specs: HashMap<(ToolId, Os), ToolSpec>,
}

impl ToolRegistry {
    /// An empty registry; every lookup returns `None`.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Adds (or replaces) the spec for `tool` on `os`.
    ///
    /// # Errors
    ///
    /// Returns `ProvisionError::Config` if the mirror list is empty or any
    /// mirror is not an HTTP(S) URL.
    pub fn with_spec(
        mut self,
        tool: ToolId,
        os: Os,
        spec: ToolSpec,
    ) -> Result<Self, ProvisionError> {
        spec.validate(tool, os)?;
        self.specs.insert((tool, os), spec);
        Ok(self)
    }

    /// Looks up the spec for `tool` on `os`.
    pub fn get(&self, tool: ToolId, os: Os) -> Option<&ToolSpec> {
        self.specs.get(&(tool, os))
    }

    /// Tools that have a spec for `os`, in setup order.
    pub fn tools_for(&self, os: Os) -> Vec<ToolId> {
        ToolId::all()
            .iter()
            .copied()
            .filter(|tool| self.specs.contains_key(&(*tool, os)))
            .collect()
    }

    /// The built-in mirror table.
    pub fn builtin() -> Self {
        let mut specs = HashMap::new();

        specs.insert(
            (ToolId::YtDlp, Os::Windows),
            ToolSpec::binary(
                "yt-dlp.exe",
                &[
                    "https://github.com/yt-dlp/yt-dlp/releases/latest/download/yt-dlp.exe",
                    "https://ghproxy.com/https://github.com/yt-dlp/yt-dlp/releases/latest/download/yt-dlp.exe",
                    "https://github.com.cnpmjs.org/yt-dlp/yt-dlp/releases/latest/download/yt-dlp.exe",
                ],
            ),
        );
        specs.insert(
            (ToolId::YtDlp, Os::Linux),
            ToolSpec::binary(
                "yt-dlp",
                &[
                    "https://github.com/yt-dlp/yt-dlp/releases/latest/download/yt-dlp",
                    "https://ghproxy.com/https://github.com/yt-dlp/yt-dlp/releases/latest/download/yt-dlp",
                ],
            ),
        );
        specs.insert(
            (ToolId::YtDlp, Os::Macos),
            ToolSpec::binary(
                "yt-dlp",
                &[
                    "https://github.com/yt-dlp/yt-dlp/releases/latest/download/yt-dlp_macos",
                    "https://ghproxy.com/https://github.com/yt-dlp/yt-dlp/releases/latest/download/yt-dlp_macos",
                ],
            ),
        );

        specs.insert(
            (ToolId::Ffmpeg, Os::Windows),
            ToolSpec::archive(
                "ffmpeg.exe",
                ArchiveFormat::Zip,
                &[
                    "https://www.gyan.dev/ffmpeg/builds/ffmpeg-release-essentials.zip",
                    "https://ghproxy.com/https://github.com/BtbN/FFmpeg-Builds/releases/download/latest/ffmpeg-master-latest-win64-gpl.zip",
                ],
            ),
        );
        specs.insert(
            (ToolId::Ffmpeg, Os::Linux),
            ToolSpec::archive(
                "ffmpeg",
                ArchiveFormat::TarXz,
                &["https://johnvansickle.com/ffmpeg/builds/ffmpeg-git-amd64-static.tar.xz"],
            ),
        );
        specs.insert(
            (ToolId::Ffmpeg, Os::Macos),
            ToolSpec::archive(
                "ffmpeg",
                ArchiveFormat::Zip,
                &["https://evermeet.cx/ffmpeg/ffmpeg-5.1.2.zip"],
            ),
        );

        Self { specs }
    }
}
