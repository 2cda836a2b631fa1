//! Responsive image manifest.
//!
//! Stage 3 of the pipeline. Maps every successfully processed source image,
//! keyed by its public URL, to its original dimensions and one `srcset`
//! string per format:
//!
//! ```json
//! {
//!   "/img/banner.png": {
//!     "original": { "url": "/img/banner.png", "width": 1000, "height": 500 },
//!     "avifSrcSet": "/img/generated/banner-320.avif 320w, /img/generated/banner-1000.avif 1000w",
//!     "webpSrcSet": "/img/generated/banner-320.webp 320w, /img/generated/banner-1000.webp 1000w",
//!     "width": 1000,
//!     "height": 500
//!   }
//! }
//! ```
//!
//! The manifest is rebuilt from scratch on every run and replaces the previous
//! file atomically. Keys are sorted, so unchanged inputs give identical bytes.

use crate::process::ProcessedImage;
use crate::types::{Derivative, Format};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ManifestError {
    #[error("Failed to write manifest {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to read manifest {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Location and size of the untouched source image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OriginalImage {
    pub url: String,
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManifestEntry {
    pub original: OriginalImage,
    pub avif_src_set: String,
    pub webp_src_set: String,
    pub width: u32,
    pub height: u32,
}

/// Source URL → entry. Sorted so serialization is deterministic.
pub type ImageManifest = BTreeMap<String, ManifestEntry>;

/// `"<url> <width>w"` entries joined by `", "`, in the order given.
pub fn build_src_set(derivatives: &[Derivative]) -> String {
    derivatives
        .iter()
        .map(|d| format!("{} {}w", d.url, d.width))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Build the manifest for a run's processed images.
pub fn build(images: &[ProcessedImage]) -> ImageManifest {
    images
        .iter()
        .map(|image| {
            let source = &image.source;
            let entry = ManifestEntry {
                original: OriginalImage {
                    url: source.url.clone(),
                    width: source.width,
                    height: source.height,
                },
                avif_src_set: build_src_set(image.variants.for_format(Format::Avif)),
                webp_src_set: build_src_set(image.variants.for_format(Format::Webp)),
                width: source.width,
                height: source.height,
            };
            (source.url.clone(), entry)
        })
        .collect()
}

/// Write the manifest as pretty-printed JSON, creating the parent directory.
///
/// The content goes to a sibling temporary file first and is renamed over the
/// target, so readers never see a half-written manifest.
pub fn write(manifest: &ImageManifest, path: &Path) -> Result<(), ManifestError> {
    let io_err = |source: std::io::Error| ManifestError::Write {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(io_err)?;
    }

    let mut json = serde_json::to_string_pretty(manifest)?;
    json.push('\n');

    let mut tmp_name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    tmp_name.push(".tmp");
    let tmp = path.with_file_name(tmp_name);

    let written = std::fs::File::create(&tmp).and_then(|mut f| {
        f.write_all(json.as_bytes())?;
        f.sync_all()
    });
    if let Err(e) = written {
        let _ = std::fs::remove_file(&tmp);
        return Err(io_err(e));
    }
    std::fs::rename(&tmp, path).map_err(io_err)
}

/// Read a manifest written by [`write`].
pub fn load(path: &Path) -> Result<ImageManifest, ManifestError> {
    let content = std::fs::read_to_string(path).map_err(|source| ManifestError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(serde_json::from_str(&content)?)
}
