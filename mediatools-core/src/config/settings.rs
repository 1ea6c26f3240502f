//! Provisioner settings.
//!
//! Settings are read from an optional JSON file; every field has a default so
//! a partial file (or none at all) is valid.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::external_tools::ProvisionError;

/// Application directory name under the OS data directory.
pub const APP_DIR_NAME: &str = "mediatools";

/// Name of the bin directory under both the bundle root and user data.
pub const BIN_DIR_NAME: &str = "bin";

// =============================================================================
// Provisioner Settings
// =============================================================================

/// Settings for tool resolution and downloads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProvisionerConfig {
    /// Read-only directory holding tools shipped with the application.
    #[serde(default = "default_bundled_dir")]
    pub bundled_dir: PathBuf,

    /// Writable per-user data directory; downloads go to `<this>/bin`.
    #[serde(default = "default_user_data_dir")]
    pub user_data_dir: PathBuf,

    /// Wall-clock limit for a single mirror request, in seconds.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Connection establishment limit, in seconds.
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,

    /// Maximum redirect hops followed per mirror.
    #[serde(default = "default_max_redirects")]
    pub max_redirects: usize,

    /// User-Agent sent with download requests.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

fn default_bundled_dir() -> PathBuf {
    std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(Path::to_path_buf))
        .unwrap_or_else(|| PathBuf::from("."))
        .join(BIN_DIR_NAME)
}

fn default_user_data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join(APP_DIR_NAME)
}

fn default_request_timeout_secs() -> u64 {
    300
}

fn default_connect_timeout_secs() -> u64 {
    30
}

fn default_max_redirects() -> usize {
    10
}

fn default_user_agent() -> String {
    format!("{}/{}", APP_DIR_NAME, env!("CARGO_PKG_VERSION"))
}

impl Default for ProvisionerConfig {
    fn default() -> Self {
        Self {
            bundled_dir: default_bundled_dir(),
            user_data_dir: default_user_data_dir(),
            request_timeout_secs: default_request_timeout_secs(),
            connect_timeout_secs: default_connect_timeout_secs(),
            max_redirects: default_max_redirects(),
            user_agent: default_user_agent(),
        }
    }
}

impl ProvisionerConfig {
    /// Builds a config rooted at explicit directories, other fields defaulted.
    pub fn with_dirs(bundled_dir: impl Into<PathBuf>, user_data_dir: impl Into<PathBuf>) -> Self {
        Self {
            bundled_dir: bundled_dir.into(),
            user_data_dir: user_data_dir.into(),
            ..Self::default()
        }
    }

    /// Loads settings from a JSON file.
    ///
    /// A missing file yields defaults. A file that exists but cannot be
    /// parsed is an error, since silently ignoring it would hide typos in
    /// directory overrides.
    pub fn load_from(path: &Path) -> Result<Self, ProvisionError> {
        let json = match std::fs::read_to_string(path) {
            Ok(json) => json,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "No config file, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ProvisionError::io(path, e)),
        };

        let mut config: Self = serde_json::from_str(&json).map_err(|e| {
            ProvisionError::Config(format!("Failed to parse {}: {}", path.display(), e))
        })?;
        config.validate();
        Ok(config)
    }

    /// Clamp numeric settings to usable ranges.
    pub fn validate(&mut self) {
        self.request_timeout_secs = self.request_timeout_secs.clamp(5, 3600);
        self.connect_timeout_secs = self.connect_timeout_secs.clamp(1, 300);
        self.max_redirects = self.max_redirects.clamp(1, 30);

        if self.user_agent.is_empty() {
            self.user_agent = default_user_agent();
        }
    }

    /// Directory downloaded tools are written to.
    pub fn user_bin_dir(&self) -> PathBuf {
        self.user_data_dir.join(BIN_DIR_NAME)
    }
}

// =============================================================================
// Tests
// =============================================================================
