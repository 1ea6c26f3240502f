//! Archive extraction for downloaded tool packages.
//!
//! Vendor archives place the executable at different internal paths across
//! releases, so rather than unpacking everything we pick the single entry
//! that best matches the tool and write it straight to its final path.

use std::fs::{self, File};
use std::io::{self, BufReader, Read};
use std::path::Path;
use tracing::{debug, info};

use super::error::{ExtractionError, ProvisionError};
use super::types::ArchiveFormat;

// ============================================================================
// Entry Matching
// ============================================================================

/// Ranks an archive entry as a candidate for `tool_name`. Lower is better;
/// `None` means the entry does not match at all.
///
/// 0. base name equals the target filename (`ffmpeg.exe`)
/// 1. base name without extension equals the tool name
/// 2. base name contains the tool name
/// 3. full entry path contains the tool name
fn match_rank(entry_name: &str, tool_name: &str, filename: &str) -> Option<u8> {
    let base = entry_name
        .rsplit(&['/', '\\'][..])
        .next()
        .unwrap_or(entry_name);
    if base.is_empty() {
        return None;
    }

    let stem = base.split('.').next().unwrap_or(base);

    if base.eq_ignore_ascii_case(filename) {
        Some(0)
    } else if stem.eq_ignore_ascii_case(tool_name) {
        Some(1)
    } else if base.contains(tool_name) {
        Some(2)
    } else if entry_name.contains(tool_name) {
        Some(3)
    } else {
        None
    }
}

// ============================================================================
// Extraction
// ============================================================================

/// Extracts the entry matching `tool_name` from `archive_path` to `dest_path`.
///
/// The container type is detected from the file's magic bytes (zip, gzip
/// tar or xz tar). When the bytes are not recognized, `declared` (the
/// registry's format for this download) is used, and zip after that.
/// Directory entries and links are never selected. The archive itself is
/// left in place.
///
/// # Errors
///
/// `NoMatchingEntry` if nothing in the archive names the tool; `Open`/`Read`
/// if the archive cannot be read.
pub fn extract_tool(
    archive_path: &Path,
    dest_path: &Path,
    tool_name: &str,
    declared: Option<ArchiveFormat>,
) -> Result<(), ExtractionError> {
    let filename = dest_path
        .file_name()
        .and_then(|s| s.to_str())
        .unwrap_or(tool_name)
        .to_string();

    let format = detect_format(archive_path, declared)?;
    info!(
        "Extracting {} from {:?} archive {} to {}",
        tool_name,
        format,
        archive_path.display(),
        dest_path.display()
    );

    if let Some(parent) = dest_path.parent() {
        fs::create_dir_all(parent).map_err(|source| ExtractionError::Write {
            path: parent.to_path_buf(),
            source,
        })?;
    }

    match format {
        ArchiveFormat::Zip => extract_from_zip(archive_path, dest_path, tool_name, &filename),
        ArchiveFormat::TarGz => {
            let decoder = flate2::read::GzDecoder::new(open_buffered(archive_path)?);
            extract_from_tar(decoder, dest_path, tool_name, &filename)
        }
        ArchiveFormat::TarXz => {
            let decoder = xz2::read::XzDecoder::new(open_buffered(archive_path)?);
            extract_from_tar(decoder, dest_path, tool_name, &filename)
        }
    }
}

fn open_buffered(path: &Path) -> Result<BufReader<File>, ExtractionError> {
    File::open(path)
        .map(BufReader::new)
        .map_err(|source| ExtractionError::Open {
            path: path.to_path_buf(),
            source,
        })
}

fn detect_format(
    archive_path: &Path,
    declared: Option<ArchiveFormat>,
) -> Result<ArchiveFormat, ExtractionError> {
    let mut header = [0u8; 6];
    let mut file = File::open(archive_path).map_err(|source| ExtractionError::Open {
        path: archive_path.to_path_buf(),
        source,
    })?;
    let read = file.read(&mut header).map_err(|source| ExtractionError::Open {
        path: archive_path.to_path_buf(),
        source,
    })?;

    match ArchiveFormat::sniff(&header[..read]) {
        Some(sniffed) => {
            if declared.is_some_and(|d| d != sniffed) {
                debug!(?declared, ?sniffed, "Archive content differs from declared format");
            }
            Ok(sniffed)
        }
        None => Ok(declared.unwrap_or(ArchiveFormat::Zip)),
    }
}

fn write_entry<R: Read>(reader: &mut R, dest_path: &Path) -> Result<u64, ExtractionError> {
    let write_err = |source: io::Error| ExtractionError::Write {
        path: dest_path.to_path_buf(),
        source,
    };
    let mut outfile = File::create(dest_path).map_err(write_err)?;
    io::copy(reader, &mut outfile).map_err(write_err)
}

// ============================================================================
// ZIP Extraction
// ============================================================================

fn extract_from_zip(
    archive_path: &Path,
    dest_path: &Path,
    tool_name: &str,
    filename: &str,
) -> Result<(), ExtractionError> {
    let mut archive = zip::ZipArchive::new(open_buffered(archive_path)?)?;

    let mut best: Option<(u8, usize)> = None;
    for i in 0..archive.len() {
        let entry = archive.by_index(i)?;
        if entry.is_dir() {
            continue;
        }
        if let Some(rank) = match_rank(entry.name(), tool_name, filename) {
            if best.map_or(true, |(best_rank, _)| rank < best_rank) {
                best = Some((rank, i));
            }
            if rank == 0 {
                break;
            }
        }
    }

    let (rank, index) = best.ok_or_else(|| ExtractionError::NoMatchingEntry {
        tool: tool_name.to_string(),
    })?;

    let mut entry = archive.by_index(index)?;
    debug!(entry = entry.name(), rank, "Selected zip entry");
    let bytes = write_entry(&mut entry, dest_path)?;

    info!("Extracted {} ({} bytes) to {}", tool_name, bytes, dest_path.display());
    Ok(())
}

// ============================================================================
// TAR Extraction
// ============================================================================

/// Tar streams can only be read once, so each strictly better candidate is
/// written to `dest_path` as it is found, stopping at an exact filename match.
fn extract_from_tar<R: Read>(
    reader: R,
    dest_path: &Path,
    tool_name: &str,
    filename: &str,
) -> Result<(), ExtractionError> {
    let read_err = |e: io::Error| ExtractionError::Read(e.to_string());
    let mut archive = tar::Archive::new(reader);
    let mut best_rank: Option<u8> = None;

    for entry_result in archive.entries().map_err(read_err)? {
        let mut entry = entry_result.map_err(read_err)?;

        if !entry.header().entry_type().is_file() {
            continue;
        }

        let name = entry.path().map_err(read_err)?.to_string_lossy().into_owned();
        let Some(rank) = match_rank(&name, tool_name, filename) else {
            continue;
        };

        if best_rank.map_or(true, |best| rank < best) {
            debug!(entry = %name, rank, "Selected tar entry");
            write_entry(&mut entry, dest_path)?;
            best_rank = Some(rank);
            if rank == 0 {
                break;
            }
        }
    }

    if best_rank.is_none() {
        return Err(ExtractionError::NoMatchingEntry {
            tool: tool_name.to_string(),
        });
    }

    info!("Extracted {} to {}", tool_name, dest_path.display());
    Ok(())
}

// ============================================================================
// Unix Permissions
// ============================================================================

/// Sets executable permission on a file (`rwxr-xr-x` or wider).
///
/// On Windows, this is a no-op.
#[allow(unused_variables)]
pub fn make_executable(path: &Path) -> Result<(), ProvisionError> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;

        let permission_err = |source: io::Error| ProvisionError::Permission {
            path: path.to_path_buf(),
            source,
        };

        let metadata = fs::metadata(path).map_err(permission_err)?;

        let mut permissions = metadata.permissions();
        let current_mode = permissions.mode();
        permissions.set_mode(current_mode | 0o755);

        fs::set_permissions(path, permissions).map_err(permission_err)?;

        debug!("Set executable permission on {}", path.display());
    }

    Ok(())
}
