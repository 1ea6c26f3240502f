//! Availability checks for tool executables.
//!
//! A tool file is usable iff it exists, is a regular file, is readable and
//! executable by this process, and its size is in `(0, 200 MiB]`. The size
//! bound is a crude corruption heuristic: these are small CLI tools, so an
//! empty or huge file is almost certainly a broken download.

use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Upper bound on a plausible tool executable size.
pub const MAX_TOOL_SIZE_BYTES: u64 = 200 * 1024 * 1024;

// ============================================================================
// Usability Verdict
// ============================================================================

/// Detailed result of checking a candidate tool path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "size", rename_all = "snake_case")]
pub enum Usability {
    Usable,
    Missing,
    NotAFile,
    /// Zero-byte file, usually an interrupted download.
    Empty,
    /// Larger than [`MAX_TOOL_SIZE_BYTES`].
    Oversized(u64),
    Unreadable,
    NotExecutable,
}

impl Usability {
    pub fn is_usable(&self) -> bool {
        matches!(self, Self::Usable)
    }

    /// Size-based corruption verdicts.
    pub fn is_corrupt(&self) -> bool {
        matches!(self, Self::Empty | Self::Oversized(_))
    }

    /// Whether the file failed on permissions rather than size or existence.
    pub fn is_permission_problem(&self) -> bool {
        matches!(self, Self::Unreadable | Self::NotExecutable)
    }
}

impl fmt::Display for Usability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Usable => write!(f, "usable"),
            Self::Missing => write!(f, "missing"),
            Self::NotAFile => write!(f, "not a regular file"),
            Self::Empty => write!(f, "file size is 0 bytes"),
            Self::Oversized(size) => write!(
                f,
                "file size {} bytes exceeds the {} byte limit",
                size, MAX_TOOL_SIZE_BYTES
            ),
            Self::Unreadable => write!(f, "file is not readable"),
            Self::NotExecutable => write!(f, "file lacks execute permission"),
        }
    }
}

// ============================================================================
// File Checks
// ============================================================================

/// Checks whether `path` is a usable tool executable.
///
/// Never fails: any I/O error is folded into the verdict.
pub async fn check_usability(path: &Path) -> Usability {
    let metadata = match tokio::fs::metadata(path).await {
        Ok(m) => m,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Usability::Missing,
        Err(e) => {
            debug!(path = %path.display(), error = %e, "Cannot stat tool");
            return Usability::Unreadable;
        }
    };

    if !metadata.is_file() {
        return Usability::NotAFile;
    }

    let size = metadata.len();
    if size == 0 {
        warn!(path = %path.display(), "Tool file size is 0");
        return Usability::Empty;
    }
    if size > MAX_TOOL_SIZE_BYTES {
        warn!(path = %path.display(), size, "Tool file is implausibly large");
        return Usability::Oversized(size);
    }

    if tokio::fs::File::open(path).await.is_err() {
        return Usability::Unreadable;
    }

    if !has_execute_permission(path, &metadata) {
        return Usability::NotExecutable;
    }

    Usability::Usable
}

/// Convenience wrapper around [`check_usability`].
pub async fn is_usable(path: &Path) -> bool {
    check_usability(path).await.is_usable()
}

/// Any of the owner, group or other execute bits counts. The process's
/// own uid/gid are not compared against the file's owner.
#[cfg(unix)]
fn has_execute_permission(_path: &Path, metadata: &std::fs::Metadata) -> bool {
    use std::os::unix::fs::PermissionsExt;
    metadata.permissions().mode() & 0o111 != 0
}

#[cfg(not(unix))]
fn has_execute_permission(path: &Path, _metadata: &std::fs::Metadata) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            matches!(
                ext.to_ascii_lowercase().as_str(),
                "exe" | "com" | "bat" | "cmd"
            )
        })
        .unwrap_or(false)
}

// ============================================================================
// System PATH Lookup
// ============================================================================

/// Looks up commands on the OS command search path.
pub trait SystemLookup: Send + Sync {
    /// Returns the resolved location of `command`, or `None` if absent.
    /// Implementations must not panic on lookup failure.
    fn find(&self, command: &str) -> Option<PathBuf>;
}

/// Default lookup using the process `PATH` (and `PATHEXT` on Windows).
#[derive(Debug, Clone, Copy, Default)]
pub struct PathLookup;

impl SystemLookup for PathLookup {
    fn find(&self, command: &str) -> Option<PathBuf> {
        match which::which(command) {
            Ok(path) => Some(path),
            Err(e) => {
                debug!(command, error = %e, "Command not found on PATH");
                None
            }
        }
    }
}

/// Lookup that never finds anything. Used when system tools must be ignored.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoSystemLookup;

impl SystemLookup for NoSystemLookup {
    fn find(&self, _command: &str) -> Option<PathBuf> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use std::io::Write;
    use tempfile::TempDir;

    fn write_file(dir: &Path, name: &str, contents: &[u8]) -> PathBuf {
        let path = dir.join(name);
        let mut file = File::create(&path).unwrap();
        file.write_all(contents).unwrap();
        path
    }

    #[cfg(unix)]
    fn set_mode(path: &Path, mode: u32) {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(path, std::fs::Permissions::from_mode(mode)).unwrap();
    }

    #[tokio::test]
    async fn test_missing_file() {
        let temp = TempDir::new().unwrap();
        let verdict = check_usability(&temp.path().join("ffmpeg")).await;
        assert_eq!(verdict, Usability::Missing);
        assert!(!verdict.is_usable());
    }

    #[tokio::test]
    async fn test_directory_is_not_usable() {
        let temp = TempDir::new().unwrap();
        assert_eq!(check_usability(temp.path()).await, Usability::NotAFile);
    }

    #[tokio::test]
    async fn test_zero_byte_file_is_never_usable() {
        let temp = TempDir::new().unwrap();
        let path = write_file(temp.path(), "yt-dlp.exe", b"");
        #[cfg(unix)]
        set_mode(&path, 0o755);

        let verdict = check_usability(&path).await;
        assert_eq!(verdict, Usability::Empty);
        assert!(verdict.is_corrupt());
        assert!(!is_usable(&path).await);
    }

    #[tokio::test]
    async fn test_oversized_file_is_never_usable() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("ffmpeg.exe");
        let file = File::create(&path).unwrap();
        // Sparse file: no real disk usage.
        file.set_len(MAX_TOOL_SIZE_BYTES + 1).unwrap();
        drop(file);
        #[cfg(unix)]
        set_mode(&path, 0o755);

        let verdict = check_usability(&path).await;
        assert_eq!(verdict, Usability::Oversized(MAX_TOOL_SIZE_BYTES + 1));
        assert!(verdict.is_corrupt());
    }

    #[tokio::test]
    async fn test_file_at_size_limit_is_usable() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("ffmpeg.exe");
        let file = File::create(&path).unwrap();
        file.set_len(MAX_TOOL_SIZE_BYTES).unwrap();
        drop(file);
        #[cfg(unix)]
        set_mode(&path, 0o755);

        assert_eq!(check_usability(&path).await, Usability::Usable);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_missing_execute_bit() {
        let temp = TempDir::new().unwrap();
        let path = write_file(temp.path(), "yt-dlp", b"#!/bin/sh\necho hi\n");
        set_mode(&path, 0o644);

        let verdict = check_usability(&path).await;
        assert_eq!(verdict, Usability::NotExecutable);
        assert!(verdict.is_permission_problem());

        set_mode(&path, 0o755);
        assert!(is_usable(&path).await);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_any_execute_bit_counts() {
        let temp = TempDir::new().unwrap();
        let path = write_file(temp.path(), "ffmpeg", b"#!/bin/sh\n");
        set_mode(&path, 0o641);

        assert_eq!(check_usability(&path).await, Usability::Usable);
    }

    #[test]
    fn test_usability_messages() {
        assert_eq!(Usability::Empty.to_string(), "file size is 0 bytes");
        assert!(Usability::Oversized(1).to_string().contains("exceeds"));
        assert!(Usability::NotExecutable.to_string().contains("execute"));
    }

    #[test]
    fn test_no_system_lookup_finds_nothing() {
        assert!(NoSystemLookup.find("sh").is_none());
    }

    #[test]
    fn test_path_lookup_missing_command() {
        assert!(PathLookup
            .find("definitely-not-a-real-command-4f1c2a")
            .is_none());
    }

    #[cfg(unix)]
    #[test]
    fn test_path_lookup_finds_sh() {
        assert!(PathLookup.find("sh").is_some());
    }
}
