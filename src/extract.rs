// src/extract.rs

//! Archive extraction capability
//!
//! [`ArchiveExtractor`] unpacks zip archives and plain or compressed tar
//! archives on the blocking thread pool. The format is picked from the
//! leading bytes, not from the file name: release archives are always
//! saved as `download.zip`.

use async_trait::async_trait;
use std::fs::{self, File};
use std::io::{self, BufRead, BufReader, Read, Seek};
use std::path::{Path, PathBuf};
use tar::Archive;
use tracing::{debug, info};
use zip::ZipArchive;

use crate::compression::{CompressionFormat, create_decoder};
use crate::error::{Error, Result};

/// Local file header signature of a zip archive
const ZIP_MAGIC: &[u8] = b"PK\x03\x04";

/// Expands an archive into a directory
#[async_trait]
pub trait Extractor: Send + Sync {
    /// Unpack `archive` into `dest`, which already exists
    async fn extract(&self, archive: &Path, dest: &Path) -> Result<()>;

    /// Human-readable name for logging
    fn name(&self) -> &str;
}

/// Zip and tar (gzip/xz/zstd) extractor
#[derive(Debug, Default, Clone)]
pub struct ArchiveExtractor;

impl ArchiveExtractor {
    pub fn new() -> Self {
        Self
    }
}

/// Unpack an archive synchronously, returning the number of entries
pub fn extract_archive(archive: &Path, dest: &Path) -> Result<usize> {
    let file = File::open(archive).map_err(|e| {
        Error::ExtractError(format!("Failed to open {}: {e}", archive.display()))
    })?;
    let mut reader = BufReader::new(file);

    let magic = reader
        .fill_buf()
        .map_err(|e| Error::ExtractError(format!("Failed to read {}: {e}", archive.display())))?;
    let count = if magic.starts_with(ZIP_MAGIC) {
        debug!("Extracting {} (zip)", archive.display());
        extract_zip(reader, dest)?
    } else {
        let format = CompressionFormat::from_magic_bytes(magic);
        debug!("Extracting {} ({} tar)", archive.display(), format);
        extract_tarball(reader, format, dest)?
    };

    if count == 0 {
        return Err(Error::ExtractError(format!(
            "{} contains no entries",
            archive.display()
        )));
    }
    Ok(count)
}

fn extract_zip<R: Read + Seek>(reader: R, dest: &Path) -> Result<usize> {
    let mut zip =
        ZipArchive::new(reader).map_err(|e| Error::ExtractError(format!("Invalid zip archive: {e}")))?;

    for index in 0..zip.len() {
        let mut entry = zip
            .by_index(index)
            .map_err(|e| Error::ExtractError(format!("Invalid zip entry {index}: {e}")))?;
        let entry_name = entry.name().to_string();
        let target = match entry.enclosed_name() {
            Some(relative) => dest.join(relative),
            None => {
                return Err(Error::ExtractError(format!(
                    "Entry '{entry_name}' escapes the destination directory"
                )));
            }
        };

        if entry.is_dir() {
            fs::create_dir_all(&target).map_err(|e| {
                Error::ExtractError(format!("Failed to create '{entry_name}': {e}"))
            })?;
            continue;
        }
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                Error::ExtractError(format!("Failed to create parent of '{entry_name}': {e}"))
            })?;
        }
        let mut out = File::create(&target).map_err(|e| {
            Error::ExtractError(format!("Failed to create '{entry_name}': {e}"))
        })?;
        io::copy(&mut entry, &mut out).map_err(|e| {
            Error::ExtractError(format!("Failed to unpack '{entry_name}': {e}"))
        })?;
    }
    Ok(zip.len())
}

fn extract_tarball<R: BufRead>(reader: R, format: CompressionFormat, dest: &Path) -> Result<usize> {
    let decoder = create_decoder(reader, format).map_err(|e| Error::ExtractError(e.to_string()))?;
    let mut tar = Archive::new(decoder);

    let mut count = 0;
    let entries = tar
        .entries()
        .map_err(|e| Error::ExtractError(format!("Invalid archive: {e}")))?;
    for entry in entries {
        let mut entry = entry.map_err(|e| Error::ExtractError(format!("Invalid entry: {e}")))?;
        let entry_path = entry
            .path()
            .map(|p| p.to_string_lossy().into_owned())
            .unwrap_or_default();

        let unpacked = entry.unpack_in(dest).map_err(|e| {
            Error::ExtractError(format!("Failed to unpack '{entry_path}': {e}"))
        })?;
        if !unpacked {
            return Err(Error::ExtractError(format!(
                "Entry '{entry_path}' escapes the destination directory"
            )));
        }
        count += 1;
    }

    Ok(count)
}

#[async_trait]
impl Extractor for ArchiveExtractor {
    async fn extract(&self, archive: &Path, dest: &Path) -> Result<()> {
        let archive: PathBuf = archive.to_path_buf();
        let dest: PathBuf = dest.to_path_buf();

        let archive_name = archive.display().to_string();
        let count = tokio::task::spawn_blocking(move || extract_archive(&archive, &dest))
            .await
            .map_err(|e| Error::ExtractError(format!("Extraction task failed: {e}")))??;

        info!("Extracted {} entries from {}", count, archive_name);
        Ok(())
    }

    fn name(&self) -> &str {
        "archive"
    }
}
