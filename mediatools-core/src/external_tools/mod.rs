//! External tool provisioning for yt-dlp and FFmpeg.
//!
//! Each tool is looked up in three tiers, highest priority first: the
//! bundled directory shipped with the application, the user bin directory
//! populated by downloads, and the system `PATH`. When no tier has a usable
//! copy the tool is downloaded from the first working mirror, extracted if
//! it ships as an archive, and marked executable.
//!
//! # Architecture
//!
//! - `types`: Core types (ToolId, Platform, Tier, ToolStatus, ArchiveFormat)
//! - `catalog`: Mirror registry keyed by tool and OS
//! - `paths`: Bundled/user bin directory resolution
//! - `availability`: File usability checks and system `PATH` lookup
//! - `downloader`: Async file download with progress and mirror fallback
//! - `extractor`: Archive extraction (zip, tar.gz, tar.xz)
//! - `manager`: Setup orchestration and forced re-downloads
//! - `diagnostics`: Read-only install diagnosis
//!
//! # Example
//!
//! ```ignore
//! use mediatools_core::config::ProvisionerConfig;
//! use mediatools_core::external_tools::{ToolId, ToolManager};
//!
//! let manager = ToolManager::new(ProvisionerConfig::default())?;
//!
//! let results = manager.setup_all(ToolId::all(), |tool, progress| {
//!     if let Some(percent) = progress.percent {
//!         println!("{}: {:.1}%", tool, percent);
//!     }
//! }).await;
//!
//! if let Some(ffmpeg) = manager.resolve_executable(ToolId::Ffmpeg).await {
//!     println!("FFmpeg ({}) at: {}", ffmpeg.tier, ffmpeg.path.display());
//! }
//! ```

pub mod availability;
pub mod catalog;
pub mod diagnostics;
pub mod downloader;
pub mod error;
pub mod extractor;
pub mod manager;
pub mod paths;
pub mod types;

// Re-export commonly used types
pub use availability::{
    check_usability, is_usable, NoSystemLookup, PathLookup, SystemLookup, Usability,
    MAX_TOOL_SIZE_BYTES,
};
pub use catalog::{ToolRegistry, ToolSpec};
pub use diagnostics::{DiagnosisReport, TierReport};
pub use downloader::{download_file, download_with_retry, DownloadProgress};
pub use error::{DownloadError, ExtractionError, ProvisionError};
pub use extractor::{extract_tool, make_executable};
pub use manager::{ToolManager, ToolManagerBuilder};
pub use paths::ToolPaths;
pub use types::{
    ArchiveFormat, Os, Platform, ResolvedPath, Tier, ToolId, ToolLocations, ToolStatus,
};
