// src/compression.rs
//! Compression detection and decoding for release archives
//!
//! Tar release archives may be gzip, xz or zstd compressed, or not compressed at
//! all. The format is detected from magic bytes rather than trusted from the
//! file name, since the acquisition pipeline always stores the archive under
//! the same fixed name.

use std::io::{self, Read};
use thiserror::Error;

/// Compression-related errors
#[derive(Error, Debug)]
pub enum CompressionError {
    #[error("Failed to create {format} decoder: {source}")]
    DecoderCreation {
        format: &'static str,
        source: io::Error,
    },
}

/// Supported compression formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompressionFormat {
    /// No compression (raw data)
    None,
    /// Gzip compression (.gz)
    Gzip,
    /// XZ/LZMA compression (.xz)
    Xz,
    /// Zstandard compression (.zst)
    Zstd,
}

impl CompressionFormat {
    /// Detect compression format from magic bytes
    ///
    /// Magic bytes:
    /// - Gzip: `1f 8b`
    /// - XZ: `fd 37 7a 58 5a 00` (FD + "7zXZ" + NUL)
    /// - Zstd: `28 b5 2f fd`
    pub fn from_magic_bytes(data: &[u8]) -> Self {
        if data.starts_with(&[0x1f, 0x8b]) {
            Self::Gzip
        } else if data.starts_with(&[0xfd, 0x37, 0x7a, 0x58, 0x5a, 0x00]) {
            Self::Xz
        } else if data.starts_with(&[0x28, 0xb5, 0x2f, 0xfd]) {
            Self::Zstd
        } else {
            Self::None
        }
    }

    /// Get a human-readable name for this format
    pub fn name(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Gzip => "gzip",
            Self::Xz => "xz",
            Self::Zstd => "zstd",
        }
    }
}

impl std::fmt::Display for CompressionFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Create a decompressing reader for the given format
///
/// For `CompressionFormat::None`, returns the reader unchanged.
pub fn create_decoder<'a, R: Read + 'a>(
    reader: R,
    format: CompressionFormat,
) -> Result<Box<dyn Read + 'a>, CompressionError> {
    match format {
        CompressionFormat::None => Ok(Box::new(reader)),
        CompressionFormat::Gzip => Ok(Box::new(flate2::read::GzDecoder::new(reader))),
        CompressionFormat::Xz => Ok(Box::new(xz2::read::XzDecoder::new(reader))),
        CompressionFormat::Zstd => {
            let decoder = zstd::Decoder::new(reader).map_err(|e| CompressionError::DecoderCreation {
                format: "zstd",
                source: e,
            })?;
            Ok(Box::new(decoder))
        }
    }
}
