//! Bin-directory path management for external tools.
//!
//! Tools live in one of two directories:
//!
//! - the bundled directory, shipped with the application and never written
//! - the user bin directory, `<userData>/bin/`, populated by downloads
//!
//! Resolution against these directories is pure; only
//! [`ToolPaths::ensure_user_bin_dir`] touches the filesystem.

use std::path::{Path, PathBuf};

use super::catalog::ToolRegistry;
use super::error::ProvisionError;
use super::types::{Platform, ToolId, ToolLocations};
use crate::config::ProvisionerConfig;

/// The two directory roots a tool can be installed under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolPaths {
    bundled_dir: PathBuf,
    user_bin_dir: PathBuf,
}

impl ToolPaths {
    pub fn new(bundled_dir: impl Into<PathBuf>, user_bin_dir: impl Into<PathBuf>) -> Self {
        Self {
            bundled_dir: bundled_dir.into(),
            user_bin_dir: user_bin_dir.into(),
        }
    }

    pub fn from_config(config: &ProvisionerConfig) -> Self {
        Self::new(config.bundled_dir.clone(), config.user_bin_dir())
    }

    pub fn bundled_dir(&self) -> &Path {
        &self.bundled_dir
    }

    pub fn user_bin_dir(&self) -> &Path {
        &self.user_bin_dir
    }

    /// Computes the bundled and user candidate paths for `tool`.
    ///
    /// Returns `None` when the registry has no entry for the tool on this
    /// platform; callers treat that as "cannot manage this tool here".
    pub fn resolve(
        &self,
        registry: &ToolRegistry,
        platform: Option<Platform>,
        tool: ToolId,
    ) -> Option<ToolLocations> {
        let spec = registry.get(tool, platform?.os)?;
        Some(ToolLocations {
            bundled_path: self.bundled_dir.join(&spec.filename),
            user_path: self.user_bin_dir.join(&spec.filename),
            filename: spec.filename.clone(),
        })
    }

    /// Temporary archive path used while downloading `tool`.
    pub fn archive_temp_path(&self, tool: ToolId) -> PathBuf {
        self.user_bin_dir
            .join(format!("{}_download.tmp", tool.as_str()))
    }

    /// Creates the user bin directory if needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created (e.g., permission issues).
    pub async fn ensure_user_bin_dir(&self) -> Result<(), ProvisionError> {
        tokio::fs::create_dir_all(&self.user_bin_dir)
            .await
            .map_err(|e| ProvisionError::io(&self.user_bin_dir, e))
    }
}
