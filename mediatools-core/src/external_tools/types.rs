//! Core types for external tool provisioning.
//!
//! This module defines the foundational types shared by the registry, the
//! resolver, the setup orchestrator and the diagnostics reporter: tool
//! identifiers, platform detection, tiers, and setup outcomes.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

// ============================================================================
// External Tool Identifiers
// ============================================================================

/// Unique identifier for each managed external tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ToolId {
    /// yt-dlp - media downloader.
    YtDlp,
    /// FFmpeg - media transcoder.
    Ffmpeg,
}

impl ToolId {
    /// Returns all managed tool IDs, in setup order.
    pub fn all() -> &'static [ToolId] {
        &[Self::YtDlp, Self::Ffmpeg]
    }

    /// Returns the command name for this tool.
    ///
    /// This is also the name looked up on the system `PATH` and the
    /// substring used to locate the executable inside an archive.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::YtDlp => "yt-dlp",
            Self::Ffmpeg => "ffmpeg",
        }
    }

    /// Human-readable display name.
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::YtDlp => "yt-dlp",
            Self::Ffmpeg => "FFmpeg",
        }
    }
}

impl fmt::Display for ToolId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for ToolId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "yt-dlp" | "ytdlp" => Ok(Self::YtDlp),
            "ffmpeg" => Ok(Self::Ffmpeg),
            _ => Err(format!("Unknown tool: {}", s)),
        }
    }
}

// ============================================================================
// Platform Detection
// ============================================================================

/// Operating system family. Registry entries are keyed by this.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Os {
    Windows,
    Macos,
    Linux,
}

impl Os {
    /// Returns all supported operating systems.
    pub fn all() -> &'static [Os] {
        &[Self::Windows, Self::Macos, Self::Linux]
    }

    /// Detects the OS this process is running on.
    ///
    /// Returns `None` on operating systems outside the supported set.
    pub fn current() -> Option<Self> {
        match std::env::consts::OS {
            "windows" => Some(Self::Windows),
            "macos" => Some(Self::Macos),
            "linux" => Some(Self::Linux),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Windows => "windows",
            Self::Macos => "macos",
            Self::Linux => "linux",
        }
    }

    /// Whether downloaded files need their execute bits set.
    pub fn needs_exec_bit(&self) -> bool {
        !matches!(self, Self::Windows)
    }
}

impl fmt::Display for Os {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Represents the running platform (OS + architecture).
///
/// The architecture is recorded for logging and diagnostics only; mirror
/// selection depends on the OS alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct Platform {
    pub os: Os,
    pub arch: &'static str,
}

impl Platform {
    /// Detects the current platform at runtime.
    ///
    /// Returns `None` if the OS is unsupported.
    pub fn detect() -> Option<Self> {
        Os::current().map(|os| Self {
            os,
            arch: std::env::consts::ARCH,
        })
    }

    /// Builds a platform for an explicit OS (useful for tests and tooling).
    pub fn new(os: Os, arch: &'static str) -> Self {
        Self { os, arch }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.os, self.arch)
    }
}

// ============================================================================
// Tiers and Resolution
// ============================================================================

/// One of the three places a tool may be found, in priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    /// Shipped with the application (read-only).
    Bundled,
    /// Downloaded into the user data directory.
    User,
    /// Found on the system command search path.
    System,
}

impl Tier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Bundled => "bundled",
            Self::User => "user",
            Self::System => "system",
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The outcome of resolving a tool to something the host can spawn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedPath {
    pub tier: Tier,
    /// Filesystem path for `Bundled`/`User`; the bare command name for
    /// `System`, which is looked up by the OS when spawned.
    pub path: PathBuf,
}

/// Candidate install locations for a tool on the current platform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ToolLocations {
    pub bundled_path: PathBuf,
    pub user_path: PathBuf,
    pub filename: String,
}

// ============================================================================
// Tool Status
// ============================================================================

/// Result of a setup attempt for one tool.
///
/// Computed fresh on every setup run and never persisted; the filesystem is
/// the source of truth.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolStatus {
    Bundled,
    User,
    System,
    Downloaded,
    Failed,
}

impl ToolStatus {
    /// Returns true if the tool can be used after this outcome.
    pub fn is_ready(&self) -> bool {
        !matches!(self, Self::Failed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Bundled => "bundled",
            Self::User => "user",
            Self::System => "system",
            Self::Downloaded => "downloaded",
            Self::Failed => "failed",
        }
    }
}

impl From<Tier> for ToolStatus {
    fn from(tier: Tier) -> Self {
        match tier {
            Tier::Bundled => Self::Bundled,
            Tier::User => Self::User,
            Tier::System => Self::System,
        }
    }
}

impl fmt::Display for ToolStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ============================================================================
// Archive Formats
// ============================================================================

/// Archive format for downloaded tool packages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ArchiveFormat {
    /// ZIP archive
    Zip,
    /// Gzip-compressed tar archive
    TarGz,
    /// XZ-compressed tar archive
    TarXz,
}

impl ArchiveFormat {
    /// Identifies the format from the leading bytes of a file.
    pub fn sniff(header: &[u8]) -> Option<Self> {
        if header.starts_with(b"PK\x03\x04") || header.starts_with(b"PK\x05\x06") {
            Some(Self::Zip)
        } else if header.starts_with(&[0x1f, 0x8b]) {
            Some(Self::TarGz)
        } else if header.starts_with(&[0xfd, b'7', b'z', b'X', b'Z', 0x00]) {
            Some(Self::TarXz)
        } else {
            None
        }
    }
}
