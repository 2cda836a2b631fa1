//! Asset discovery.
//!
//! Stage 1 of the pipeline. Walks the asset root and returns every raster
//! image beneath it, at any depth:
//!
//! ```text
//! static/img/                  # Asset root
//! ├── banner.png               # ✓ raster
//! ├── logo.svg                 # ✗ vector, never processed
//! ├── docs/
//! │   ├── setup.JPG            # ✓ extensions are case-insensitive
//! │   └── notes.txt            # ✗ not an image
//! ├── .drafts/                 # ✗ hidden entries are skipped
//! └── generated/               # ✗ pruned: derivatives are outputs, not inputs
//! ```
//!
//! A missing asset root is not an error: it simply contains no images. Any
//! other filesystem error aborts the run.
//!
//! Results are sorted by relative path so logs and manifests come out in the
//! same order on every machine.

use crate::types::SourceFile;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use walkdir::{DirEntry, WalkDir};

#[derive(Error, Debug)]
pub enum ScanError {
    #[error("IO error reading {path}: {source}")]
    Io { path: PathBuf, source: io::Error },
    #[error("Walk error: {0}")]
    Walk(#[from] walkdir::Error),
    #[error("Asset root is not a directory: {0}")]
    NotADirectory(PathBuf),
}

/// Raster extensions the pipeline transcodes (compared lowercase).
pub const RASTER_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg"];

/// Whether `path` has a raster image extension, case-insensitively.
pub fn is_raster(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|ext| {
            RASTER_EXTENSIONS
                .iter()
                .any(|candidate| ext.eq_ignore_ascii_case(candidate))
        })
}

fn is_hidden(entry: &DirEntry) -> bool {
    entry.depth() > 0 && entry.file_name().to_string_lossy().starts_with('.')
}

/// `/`-joined path of `path` relative to `root`.
fn relative_key(path: &Path, root: &Path) -> String {
    let rel = path.strip_prefix(root).unwrap_or(path);
    rel.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

/// Find every raster image under `root`.
///
/// `exclude` names a directory to prune from the walk (the generated output
/// directory when it lives inside the asset root).
pub fn scan(root: &Path, exclude: Option<&Path>) -> Result<Vec<SourceFile>, ScanError> {
    match std::fs::metadata(root) {
        Ok(meta) if meta.is_dir() => {}
        Ok(_) => return Err(ScanError::NotADirectory(root.to_path_buf())),
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(source) => {
            return Err(ScanError::Io {
                path: root.to_path_buf(),
                source,
            });
        }
    }

    let walker = WalkDir::new(root)
        .follow_links(true)
        .into_iter()
        .filter_entry(|e| !is_hidden(e) && exclude.is_none_or(|ex| e.path() != ex));

    let mut files = Vec::new();
    for entry in walker {
        let entry = entry?;
        if entry.file_type().is_file() && is_raster(entry.path()) {
            files.push(SourceFile {
                relative: relative_key(entry.path(), root),
                path: entry.into_path(),
            });
        }
    }

    files.sort_by(|a, b| a.relative.cmp(&b.relative));
    Ok(files)
}
