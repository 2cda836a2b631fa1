//! Shared types passed between the pipeline stages.
//!
//! The scanner produces [`SourceFile`]s, the process stage turns each one into
//! a [`SourceImage`] plus a [`VariantSet`], and the manifest writer reads both.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::time::SystemTime;

/// Output encoding of a derivative.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Format {
    Avif,
    Webp,
}

impl Format {
    /// Every output format, in the order derivatives are produced.
    pub const ALL: [Format; 2] = [Format::Avif, Format::Webp];

    /// File extension without the leading dot.
    pub fn extension(self) -> &'static str {
        match self {
            Format::Avif => "avif",
            Format::Webp => "webp",
        }
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

/// A raster file found by the scanner, before it has been decoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    pub path: PathBuf,
    /// Path relative to the asset root, always `/`-separated. This is the
    /// image's identity across runs.
    pub relative: String,
}

/// A decoded source image.
#[derive(Debug, Clone)]
pub struct SourceImage {
    pub path: PathBuf,
    pub relative: String,
    /// Root-relative public URL (`/img/banner.png`).
    pub url: String,
    pub width: u32,
    pub height: u32,
    pub modified: SystemTime,
}

/// How a derivative came to exist on disk during this run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VariantStatus {
    /// Encoded from the source in this run.
    Generated,
    /// An existing output file was fresh and left untouched.
    Reused,
    /// Content-hash cache hit under another path, copied into place.
    Copied,
}

/// One generated, resized, re-encoded copy of a source image.
#[derive(Debug, Clone)]
pub struct Derivative {
    pub format: Format,
    pub width: u32,
    pub height: u32,
    pub path: PathBuf,
    pub url: String,
    pub status: VariantStatus,
}

/// All derivatives of one source image, partitioned by format and sorted
/// ascending by width within each partition.
#[derive(Debug, Clone, Default)]
pub struct VariantSet {
    avif: Vec<Derivative>,
    webp: Vec<Derivative>,
}

impl VariantSet {
    /// Add a derivative, keeping its partition ordered by width.
    ///
    /// A derivative whose width is already present in the partition replaces
    /// the existing one, so widths stay unique.
    pub fn insert(&mut self, derivative: Derivative) {
        let partition = match derivative.format {
            Format::Avif => &mut self.avif,
            Format::Webp => &mut self.webp,
        };
        match partition.binary_search_by_key(&derivative.width, |d| d.width) {
            Ok(pos) => partition[pos] = derivative,
            Err(pos) => partition.insert(pos, derivative),
        }
    }

    pub fn for_format(&self, format: Format) -> &[Derivative] {
        match format {
            Format::Avif => &self.avif,
            Format::Webp => &self.webp,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &Derivative> {
        self.avif.iter().chain(self.webp.iter())
    }

    pub fn len(&self) -> usize {
        self.avif.len() + self.webp.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
