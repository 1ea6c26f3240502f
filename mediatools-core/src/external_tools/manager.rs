//! External tool manager for resolving, downloading and installing tools.
//!
//! The `ToolManager` is the main entry point for tool provisioning. It
//! coordinates between the registry, path resolver, availability checker,
//! downloader, and extractor.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use super::availability::{is_usable, PathLookup, SystemLookup};
use super::catalog::{ToolRegistry, ToolSpec};
use super::downloader::{build_client, download_with_retry, DownloadProgress};
use super::error::{ExtractionError, ProvisionError};
use super::extractor::{extract_tool, make_executable};
use super::paths::ToolPaths;
use super::types::{Platform, ResolvedPath, Tier, ToolId, ToolLocations, ToolStatus};
use crate::config::ProvisionerConfig;

// ============================================================================
// Per-Tool Locks
// ============================================================================

/// One lock per tool so setup and forced re-downloads of the same tool never
/// interleave their delete-then-write steps.
#[derive(Default)]
struct ToolLocks {
    yt_dlp: Mutex<()>,
    ffmpeg: Mutex<()>,
}

impl ToolLocks {
    fn get(&self, tool: ToolId) -> &Mutex<()> {
        match tool {
            ToolId::YtDlp => &self.yt_dlp,
            ToolId::Ffmpeg => &self.ffmpeg,
        }
    }
}

// ============================================================================
// Builder
// ============================================================================

/// Builder for [`ToolManager`], allowing the registry, platform and system
/// lookup to be substituted.
pub struct ToolManagerBuilder {
    config: ProvisionerConfig,
    registry: Option<Arc<ToolRegistry>>,
    platform: Option<Option<Platform>>,
    lookup: Option<Arc<dyn SystemLookup>>,
}

impl ToolManagerBuilder {
    pub fn registry(mut self, registry: impl Into<Arc<ToolRegistry>>) -> Self {
        self.registry = Some(registry.into());
        self
    }

    /// Overrides platform detection. `None` simulates an unsupported OS.
    pub fn platform(mut self, platform: Option<Platform>) -> Self {
        self.platform = Some(platform);
        self
    }

    pub fn system_lookup(mut self, lookup: impl SystemLookup + 'static) -> Self {
        self.lookup = Some(Arc::new(lookup));
        self
    }

    pub fn build(self) -> Result<ToolManager, ProvisionError> {
        let paths = ToolPaths::from_config(&self.config);
        let platform = self.platform.unwrap_or_else(Platform::detect);
        let client = build_client(&self.config)?;

        // Missing user bin dir is reported by diagnostics, not fatal here.
        if let Err(e) = std::fs::create_dir_all(paths.user_bin_dir()) {
            warn!(
                "Failed to create user bin directory {}: {}",
                paths.user_bin_dir().display(),
                e
            );
        }

        info!(
            "ToolManager initialized. Bundled dir: {}, user bin dir: {}, platform: {:?}",
            paths.bundled_dir().display(),
            paths.user_bin_dir().display(),
            platform
        );

        Ok(ToolManager {
            registry: self
                .registry
                .unwrap_or_else(|| Arc::new(ToolRegistry::builtin())),
            paths,
            platform,
            client,
            lookup: self.lookup.unwrap_or_else(|| Arc::new(PathLookup)),
            locks: ToolLocks::default(),
        })
    }
}

// ============================================================================
// Tool Manager
// ============================================================================

/// Resolves, installs and repairs the external tools.
///
/// Operations are intended to be awaited one at a time; concurrent calls for
/// the same tool are serialized internally.
pub struct ToolManager {
    registry: Arc<ToolRegistry>,
    paths: ToolPaths,
    platform: Option<Platform>,
    client: reqwest::Client,
    lookup: Arc<dyn SystemLookup>,
    locks: ToolLocks,
}

impl ToolManager {
    /// Creates a manager with the built-in registry and detected platform.
    pub fn new(config: ProvisionerConfig) -> Result<Self, ProvisionError> {
        Self::builder(config).build()
    }

    pub fn builder(config: ProvisionerConfig) -> ToolManagerBuilder {
        ToolManagerBuilder {
            config,
            registry: None,
            platform: None,
            lookup: None,
        }
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    pub fn paths(&self) -> &ToolPaths {
        &self.paths
    }

    pub fn platform(&self) -> Option<Platform> {
        self.platform
    }

    pub(crate) fn system_lookup(&self) -> &dyn SystemLookup {
        self.lookup.as_ref()
    }

    // ========================================================================
    // Resolution
    // ========================================================================

    /// Candidate bundled/user paths for `tool`, or `None` if the tool cannot
    /// be managed on this platform. Pure; performs no I/O.
    pub fn resolve(&self, tool: ToolId) -> Option<ToolLocations> {
        self.paths.resolve(&self.registry, self.platform, tool)
    }

    /// Registry entry for `tool` on this platform.
    pub fn spec(&self, tool: ToolId) -> Result<&ToolSpec, ProvisionError> {
        let platform = self
            .platform
            .ok_or_else(|| ProvisionError::unsupported(tool, None))?;
        self.registry
            .get(tool, platform.os)
            .ok_or_else(|| ProvisionError::unsupported(tool, Some(platform.os)))
    }

    /// Whether `tool` is on the system command search path.
    pub fn is_system_available(&self, tool: ToolId) -> bool {
        self.lookup.find(tool.as_str()).is_some()
    }

    /// Finds the highest-priority usable copy of `tool`.
    ///
    /// Bundled always wins over user, which wins over system. For the
    /// system tier the returned path is the bare command name.
    pub async fn resolve_executable(&self, tool: ToolId) -> Option<ResolvedPath> {
        if let Some(locations) = self.resolve(tool) {
            if is_usable(&locations.bundled_path).await {
                debug!("Found {} (bundled): {}", tool, locations.bundled_path.display());
                return Some(ResolvedPath {
                    tier: Tier::Bundled,
                    path: locations.bundled_path,
                });
            }

            if is_usable(&locations.user_path).await {
                debug!("Found {} (user): {}", tool, locations.user_path.display());
                return Some(ResolvedPath {
                    tier: Tier::User,
                    path: locations.user_path,
                });
            }
        }

        if self.is_system_available(tool) {
            debug!("Found {} on system PATH", tool);
            return Some(ResolvedPath {
                tier: Tier::System,
                path: PathBuf::from(tool.as_str()),
            });
        }

        None
    }

    // ========================================================================
    // Setup
    // ========================================================================

    /// Ensures each tool in `tools` is usable, downloading only when no tier
    /// already has a usable copy.
    ///
    /// Tools are processed strictly in order. A failure for one tool is
    /// recorded as [`ToolStatus::Failed`] and does not stop the others.
    /// Re-running after success performs only local checks.
    pub async fn setup_all<F>(
        &self,
        tools: &[ToolId],
        on_progress: F,
    ) -> BTreeMap<ToolId, ToolStatus>
    where
        F: Fn(ToolId, DownloadProgress),
    {
        let mut results = BTreeMap::new();

        for &tool in tools {
            info!("Checking tool: {}", tool);
            let progress = |p: DownloadProgress| on_progress(tool, p);

            let status = match self.setup_tool(tool, &progress).await {
                Ok(status) => status,
                Err(e) => {
                    error!(tool = %tool, error = %e, "Tool setup failed");
                    ToolStatus::Failed
                }
            };

            info!(tool = %tool, status = %status, "Tool setup finished");
            results.insert(tool, status);
        }

        results
    }

    async fn setup_tool(
        &self,
        tool: ToolId,
        on_progress: &(dyn Fn(DownloadProgress) + '_),
    ) -> Result<ToolStatus, ProvisionError> {
        let _guard = self.locks.get(tool).lock().await;

        if let Some(resolved) = self.resolve_executable(tool).await {
            return Ok(resolved.tier.into());
        }

        info!("Downloading {}...", tool);
        self.download_locked(tool, on_progress).await?;
        Ok(ToolStatus::Downloaded)
    }

    // ========================================================================
    // Download
    // ========================================================================

    /// Downloads `tool` into the user bin directory, replacing any existing
    /// copy there.
    ///
    /// Unlike [`setup_all`](Self::setup_all) this always downloads; it is the
    /// repair path for a corrupted install.
    pub async fn download_tool<F>(
        &self,
        tool: ToolId,
        on_progress: F,
    ) -> Result<PathBuf, ProvisionError>
    where
        F: Fn(DownloadProgress),
    {
        let _guard = self.locks.get(tool).lock().await;
        self.download_locked(tool, &on_progress).await
    }

    async fn download_locked(
        &self,
        tool: ToolId,
        on_progress: &(dyn Fn(DownloadProgress) + '_),
    ) -> Result<PathBuf, ProvisionError> {
        let spec = self.spec(tool)?;
        let needs_exec_bit = self.platform.map_or(false, |p| p.os.needs_exec_bit());

        self.paths.ensure_user_bin_dir().await?;
        let dest = self.paths.user_bin_dir().join(&spec.filename);

        if remove_if_exists(&dest).await? {
            info!("Removed previous {} at {}", tool, dest.display());
        }

        if spec.is_archive() {
            let archive = self.paths.archive_temp_path(tool);
            remove_if_exists(&archive).await?;

            download_with_retry(&self.client, &spec.mirror_urls, &archive, on_progress).await?;

            let archive_path = archive.clone();
            let dest_path = dest.clone();
            let declared = spec.archive;
            tokio::task::spawn_blocking(move || {
                extract_tool(&archive_path, &dest_path, tool.as_str(), declared)
            })
            .await
            .map_err(|e| ExtractionError::Read(format!("Extraction task failed: {}", e)))??;

            if let Err(e) = tokio::fs::remove_file(&archive).await {
                warn!("Failed to clean up archive {}: {}", archive.display(), e);
            }
        } else {
            download_with_retry(&self.client, &spec.mirror_urls, &dest, on_progress).await?;
        }

        if needs_exec_bit {
            make_executable(&dest)?;
        }

        info!("{} downloaded to {}", tool, dest.display());
        Ok(dest)
    }
}

/// Deletes `path`, treating "does not exist" as success.
///
/// Returns whether a file was removed.
async fn remove_if_exists(path: &Path) -> Result<bool, ProvisionError> {
    match tokio::fs::remove_file(path).await {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(ProvisionError::io(path, e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::external_tools::availability::NoSystemLookup;
    use crate::external_tools::types::Os;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    struct FakeLookup(&'static str);

    impl SystemLookup for FakeLookup {
        fn find(&self, command: &str) -> Option<PathBuf> {
            (command == self.0).then(|| PathBuf::from("/usr/bin").join(command))
        }
    }

    fn linux() -> Option<Platform> {
        Some(Platform::new(Os::Linux, "x86_64"))
    }

    fn registry_for(server_url: &str) -> ToolRegistry {
        let url = format!("{}/yt-dlp", server_url);
        ToolRegistry::empty()
            .with_spec(
                ToolId::YtDlp,
                Os::Linux,
                ToolSpec::binary("yt-dlp", &[url.as_str()]),
            )
            .unwrap()
    }

    fn manager(
        temp: &TempDir,
        registry: ToolRegistry,
        lookup: impl SystemLookup + 'static,
    ) -> ToolManager {
        let config =
            ProvisionerConfig::with_dirs(temp.path().join("bundled"), temp.path().join("data"));
        ToolManager::builder(config)
            .registry(registry)
            .platform(linux())
            .system_lookup(lookup)
            .build()
            .unwrap()
    }

    #[cfg(unix)]
    fn write_executable(path: &Path, contents: &[u8]) {
        use std::os::unix::fs::PermissionsExt;
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, contents).unwrap();
        std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o755)).unwrap();
    }

    #[test]
    fn test_build_creates_user_bin_dir() {
        let temp = TempDir::new().unwrap();
        let manager = manager(&temp, ToolRegistry::builtin(), NoSystemLookup);
        assert!(manager.paths().user_bin_dir().is_dir());
        assert!(!manager.paths().bundled_dir().exists());
    }

    #[test]
    fn test_resolve_unsupported_tool_is_none() {
        let temp = TempDir::new().unwrap();
        let manager = manager(&temp, registry_for("http://127.0.0.1:1"), NoSystemLookup);
        assert!(manager.resolve(ToolId::YtDlp).is_some());
        assert!(manager.resolve(ToolId::Ffmpeg).is_none());
        assert!(matches!(
            manager.spec(ToolId::Ffmpeg),
            Err(ProvisionError::UnsupportedPlatform { .. })
        ));
    }

    #[tokio::test]
    async fn test_download_tool_unsupported_platform() {
        let temp = TempDir::new().unwrap();
        let config =
            ProvisionerConfig::with_dirs(temp.path().join("bundled"), temp.path().join("data"));
        let manager = ToolManager::builder(config)
            .platform(None)
            .system_lookup(NoSystemLookup)
            .build()
            .unwrap();

        let err = manager.download_tool(ToolId::YtDlp, |_| {}).await.unwrap_err();
        assert!(matches!(err, ProvisionError::UnsupportedPlatform { .. }));
        assert!(manager.resolve(ToolId::YtDlp).is_none());
    }

    #[tokio::test]
    async fn test_resolve_executable_falls_back_to_system_command_name() {
        let temp = TempDir::new().unwrap();
        let manager = manager(&temp, ToolRegistry::builtin(), FakeLookup("ffmpeg"));

        let resolved = manager.resolve_executable(ToolId::Ffmpeg).await.unwrap();
        assert_eq!(resolved.tier, Tier::System);
        assert_eq!(resolved.path, PathBuf::from("ffmpeg"));

        assert!(manager.resolve_executable(ToolId::YtDlp).await.is_none());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_user_tier_used_when_bundled_missing() {
        let temp = TempDir::new().unwrap();
        let manager = manager(&temp, ToolRegistry::builtin(), FakeLookup("yt-dlp"));
        let user_path = manager.resolve(ToolId::YtDlp).unwrap().user_path;
        write_executable(&user_path, b"#!/bin/sh\n");

        let resolved = manager.resolve_executable(ToolId::YtDlp).await.unwrap();
        assert_eq!(resolved.tier, Tier::User);
        assert_eq!(resolved.path, user_path);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_setup_reports_system_without_downloading() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/yt-dlp")
            .with_status(200)
            .with_body("binary")
            .expect(0)
            .create_async()
            .await;

        let temp = TempDir::new().unwrap();
        let manager = manager(&temp, registry_for(&server.url()), FakeLookup("yt-dlp"));

        let results = manager.setup_all(&[ToolId::YtDlp], |_, _| {}).await;
        assert_eq!(results[&ToolId::YtDlp], ToolStatus::System);
        mock.assert_async().await;
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_download_tool_always_redownloads() {
        use std::os::unix::fs::PermissionsExt;

        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/yt-dlp")
            .with_status(200)
            .with_body("fresh binary")
            .expect(1)
            .create_async()
            .await;

        let temp = TempDir::new().unwrap();
        let manager = manager(&temp, registry_for(&server.url()), NoSystemLookup);
        let user_path = manager.resolve(ToolId::YtDlp).unwrap().user_path;
        write_executable(&user_path, b"old but usable binary content");

        let calls = AtomicUsize::new(0);
        let path = manager
            .download_tool(ToolId::YtDlp, |_| {
                calls.fetch_add(1, Ordering::SeqCst);
            })
            .await
            .unwrap();

        assert_eq!(path, user_path);
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "fresh binary");
        let mode = std::fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o755, 0o755);
        assert!(calls.load(Ordering::SeqCst) > 0);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_setup_and_forced_download_do_not_interleave() {
        let body = vec![b'x'; 200_000];
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/yt-dlp")
            .with_status(200)
            .with_body(body.clone())
            .expect(2)
            .create_async()
            .await;

        let temp = TempDir::new().unwrap();
        let manager = manager(&temp, registry_for(&server.url()), NoSystemLookup);

        let (results, downloaded) = tokio::join!(
            manager.setup_all(&[ToolId::YtDlp], |_, _| {}),
            manager.download_tool(ToolId::YtDlp, |_| {}),
        );

        assert_eq!(results[&ToolId::YtDlp], ToolStatus::Downloaded);
        let path = downloaded.unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), body);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_setup_unsupported_tool_without_system_copy_fails() {
        let temp = TempDir::new().unwrap();
        let manager = manager(&temp, registry_for("http://127.0.0.1:1"), NoSystemLookup);

        let results = manager.setup_all(&[ToolId::Ffmpeg], |_, _| {}).await;
        assert_eq!(results[&ToolId::Ffmpeg], ToolStatus::Failed);
    }

    #[tokio::test]
    async fn test_setup_unsupported_tool_with_system_copy() {
        let temp = TempDir::new().unwrap();
        let manager = manager(&temp, registry_for("http://127.0.0.1:1"), FakeLookup("ffmpeg"));

        let results = manager.setup_all(&[ToolId::Ffmpeg], |_, _| {}).await;
        assert_eq!(results[&ToolId::Ffmpeg], ToolStatus::System);
    }

    #[tokio::test]
    async fn test_remove_if_exists() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("file");
        assert!(!remove_if_exists(&path).await.unwrap());
        std::fs::write(&path, "x").unwrap();
        assert!(remove_if_exists(&path).await.unwrap());
        assert!(!path.exists());
    }
}
